// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! User-authored skills.
//!
//! A skill is a `SKILL.md` file: YAML-style front-matter (name, description,
//! command template, optional parameters) followed by a Markdown body.  Each
//! skill is exposed to the model as a function-call tool; invoking it renders
//! the command template and injects the body into the system prompt as
//! active knowledge for the rest of the goal.

mod loader;
mod manifest;
mod registry;

pub use loader::{scan_dir, SkillWatcher};
pub use manifest::{parse_skill_md, to_snake_case, ParamType, ParsedSkill, SkillError, SkillParameter};
pub use registry::SkillRegistry;
