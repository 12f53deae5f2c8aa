// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
/// Events emitted by tools to communicate state changes back to the decision
/// loop.  The loop drains these after every batch of tool executions.
#[derive(Debug, Clone)]
pub enum ToolEvent {
    /// The legacy completion tool was invoked.  The loop treats this exactly
    /// like a decision with `is_goal_complete = true` and this summary.
    GoalComplete { summary: String },
    /// A skill tool ran; its knowledge body should be injected into the
    /// system prompt for the rest of the goal.
    SkillInvoked {
        tool_name: String,
        command: String,
    },
}
