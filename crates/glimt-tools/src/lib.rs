// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod builtin;
pub mod events;
pub mod registry;
pub mod skill_tool;
pub mod tool;

pub use events::ToolEvent;
pub use registry::{ToolRegistry, ToolSchema};
pub use skill_tool::SkillTool;
pub use tool::{Tool, ToolCall, ToolOutput};

pub use builtin::complete_milestone::CompleteMilestoneTool;
pub use builtin::run_command::RunCommandTool;
