// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::ParsedSkill;

/// Copy-on-write skill registry.
///
/// Publishers replace the whole list atomically; consumers clone the `Arc`
/// snapshot and never observe a partial update.  The generation counter lets
/// consumers notice that the set changed without diffing.
pub struct SkillRegistry {
    skills: RwLock<Arc<[ParsedSkill]>>,
    generation: AtomicU64,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self {
            skills: RwLock::new(Arc::from(Vec::new().into_boxed_slice())),
            generation: AtomicU64::new(0),
        }
    }

    /// Atomically replace the published skill list.
    pub fn publish(&self, skills: Vec<ParsedSkill>) {
        *self.skills.write().unwrap() = Arc::from(skills.into_boxed_slice());
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// The current immutable snapshot.
    pub fn snapshot(&self) -> Arc<[ParsedSkill]> {
        self.skills.read().unwrap().clone()
    }

    /// Monotonic counter bumped on every publish.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Find a skill by its snake_case tool name in the current snapshot.
    pub fn find(&self, tool_name: &str) -> Option<ParsedSkill> {
        self.snapshot()
            .iter()
            .find(|s| s.tool_name() == tool_name)
            .cloned()
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
