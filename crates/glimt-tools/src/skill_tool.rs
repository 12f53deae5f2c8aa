// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use glimt_skills::ParsedSkill;

use crate::builtin::run_command::run_shell;
use crate::events::ToolEvent;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Adapter exposing one parsed skill as a function-call tool.
///
/// Executing it substitutes the call arguments into the skill's command
/// template, runs the rendered command, and emits a [`ToolEvent::SkillInvoked`]
/// so the decision loop injects the skill's Markdown body into the system
/// prompt as active knowledge.
pub struct SkillTool {
    skill: ParsedSkill,
    timeout_secs: u64,
    tx: mpsc::UnboundedSender<ToolEvent>,
    tool_name: String,
    description: String,
}

impl SkillTool {
    pub fn new(
        skill: ParsedSkill,
        timeout_secs: u64,
        tx: mpsc::UnboundedSender<ToolEvent>,
    ) -> Self {
        let tool_name = skill.tool_name();
        let description = match &skill.category {
            Some(cat) => format!("[skill:{cat}] {}", skill.description),
            None => format!("[skill] {}", skill.description),
        };
        Self {
            skill,
            timeout_secs,
            tx,
            tool_name,
            description,
        }
    }

    pub fn skill(&self) -> &ParsedSkill {
        &self.skill
    }
}

#[async_trait]
impl Tool for SkillTool {
    fn name(&self) -> &str {
        &self.tool_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.skill.parameters_schema()
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let command = match self.skill.render_command(&call.args) {
            Ok(c) => c,
            Err(e) => return ToolOutput::err(&call.id, e.to_string()),
        };
        debug!(skill = %self.tool_name, command = %command, "invoking skill");

        let _ = self.tx.send(ToolEvent::SkillInvoked {
            tool_name: self.tool_name.clone(),
            command: command.clone(),
        });

        let output = run_shell(&call.id, &command, self.timeout_secs).await;
        if output.is_error {
            output
        } else {
            ToolOutput::ok(
                &call.id,
                format!("[skill {}] ran `{command}`\n{}", self.tool_name, output.content),
            )
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use glimt_skills::parse_skill_md;

    use super::*;

    fn echo_skill() -> ParsedSkill {
        parse_skill_md(
            "---\n\
             name: Echo Greeting\n\
             description: Echoes a greeting.\n\
             command: echo {{word}}\n\
             parameters:\n  \
               - name: word\n    \
                 default: hello\n\
             ---\n\
             Always greet politely.",
        )
        .unwrap()
    }

    fn call(args: Value) -> ToolCall {
        ToolCall {
            id: "s1".into(),
            name: "echo_greeting".into(),
            args,
        }
    }

    #[tokio::test]
    async fn renders_and_runs_command() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tool = SkillTool::new(echo_skill(), 10, tx);
        assert_eq!(tool.name(), "echo_greeting");

        let out = tool.execute(&call(json!({"word": "salut"}))).await;
        assert!(!out.is_error, "{}", out.content);
        assert!(out.content.contains("salut"));

        match rx.try_recv().unwrap() {
            ToolEvent::SkillInvoked { tool_name, command } => {
                assert_eq!(tool_name, "echo_greeting");
                assert_eq!(command, "echo salut");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn default_applies_when_argument_missing() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let tool = SkillTool::new(echo_skill(), 10, tx);
        let out = tool.execute(&call(json!({}))).await;
        assert!(out.content.contains("hello"));
    }

    #[tokio::test]
    async fn missing_required_parameter_is_error() {
        let skill = parse_skill_md(
            "---\nname: Strict\ndescription: d\ncommand: echo {{x}}\n\
             parameters:\n  - name: x\n    required: true\n---\nb",
        )
        .unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let tool = SkillTool::new(skill, 10, tx);
        let out = tool.execute(&call(json!({}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("missing required parameter"));
    }

    #[test]
    fn description_carries_skill_marker() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let tool = SkillTool::new(echo_skill(), 10, tx);
        assert!(tool.description().starts_with("[skill]"));
    }
}
