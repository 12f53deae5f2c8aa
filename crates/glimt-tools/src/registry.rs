// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use glimt_skills::SkillRegistry;

use crate::skill_tool::SkillTool;
use crate::{Tool, ToolCall, ToolOutput, ToolEvent};

/// A tool schema – the function declaration handed to the model.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Central dispatch surface for every tool the model can call.
///
/// Built-ins are registered once at startup and never change.  Skill tools
/// come from the copy-on-write skill registry: every schema listing and every
/// dispatch reads the current snapshot, so a republished skill set is visible
/// on the next model request without locking.
pub struct ToolRegistry {
    builtin: HashMap<String, Arc<dyn Tool>>,
    skills: Arc<SkillRegistry>,
    skill_timeout_secs: u64,
    tool_events: mpsc::UnboundedSender<ToolEvent>,
}

impl ToolRegistry {
    /// `tool_events` is drained by the decision loop; stateful tools
    /// (milestone bridge, skill invocations) signal through it.
    pub fn new(
        skills: Arc<SkillRegistry>,
        skill_timeout_secs: u64,
        tool_events: mpsc::UnboundedSender<ToolEvent>,
    ) -> Self {
        Self {
            builtin: HashMap::new(),
            skills,
            skill_timeout_secs,
            tool_events,
        }
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.builtin.insert(tool.name().to_string(), Arc::new(tool));
    }

    /// Produce schemas for all dispatchable tools: built-ins plus the
    /// current skill snapshot, sorted by name.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .builtin
            .values()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect();
        for skill in self.skills.snapshot().iter() {
            let tool = SkillTool::new(
                skill.clone(),
                self.skill_timeout_secs,
                self.tool_events.clone(),
            );
            schemas.push(ToolSchema {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            });
        }
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Dispatch a call: built-ins first, then the skill snapshot.
    pub async fn execute(&self, call: &ToolCall) -> ToolOutput {
        if let Some(tool) = self.builtin.get(&call.name) {
            return tool.execute(call).await;
        }
        if let Some(skill) = self.skills.find(&call.name) {
            let tool = SkillTool::new(skill, self.skill_timeout_secs, self.tool_events.clone());
            return tool.execute(call).await;
        }
        ToolOutput::err(&call.id, format!("unknown tool: {}", call.name))
    }

    pub fn names(&self) -> Vec<String> {
        self.schemas().into_iter().map(|s| s.name).collect()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
