// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::events::ToolEvent;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Bridge for the legacy completion path.
///
/// The decision contract carries goal completion in the JSON bundle
/// (`is_goal_complete` + `completion_summary`).  Some models call this tool
/// instead; the loop drains the resulting [`ToolEvent::GoalComplete`] and
/// treats it exactly like a completed bundle.
pub struct CompleteMilestoneTool {
    tx: mpsc::UnboundedSender<ToolEvent>,
}

impl CompleteMilestoneTool {
    /// `tx` must be the sender half of the channel the decision loop drains.
    pub fn new(tx: mpsc::UnboundedSender<ToolEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Tool for CompleteMilestoneTool {
    fn name(&self) -> &str {
        "complete_milestone"
    }

    fn description(&self) -> &str {
        "Mark the current goal as complete. Prefer setting is_goal_complete \
         in your decision instead; this tool exists for compatibility and has \
         the same effect."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "summary": {
                    "type": "string",
                    "description": "What was accomplished."
                }
            },
            "required": ["summary"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let summary = call
            .args
            .get("summary")
            .and_then(|v| v.as_str())
            .unwrap_or("goal complete")
            .to_string();
        let _ = self.tx.send(ToolEvent::GoalComplete {
            summary: summary.clone(),
        });
        ToolOutput::ok(&call.id, format!("goal marked complete: {summary}"))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
