// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Prompt assembly for the decision loop.

use crate::context::TaskContext;

/// A skill whose knowledge is active for the rest of the goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSkill {
    pub name: String,
    pub body: String,
}

const BASE_PROMPT: &str = "\
You are a desktop automation agent. Each turn you receive a screenshot of \
the screen; a red cross marks the mouse pointer (annotated with its \
normalized coordinate) and a green ring marks your previous click.

Respond with EXACTLY ONE JSON object, no prose around it:

{
  \"thought\": \"your analysis, starting with verification of the previous round\",
  \"last_action_result\": \"success\" | \"failed\" | \"partial\" | \"none\",
  \"execute_now\": { \"intent\": \"what this round achieves\", \"actions\": [ ... ] } | null,
  \"is_goal_complete\": true | false,
  \"completion_summary\": \"what was accomplished\" | null
}

Actions (1-5 per round, executed in order):
- {\"type\": \"click\" | \"double_click\" | \"right_click\", \"coords\": [x, y]}
- {\"type\": \"type\", \"text\": \"...\"}
- {\"type\": \"key\", \"key\": \"enter\" | \"tab\" | \"escape\" | \"backspace\" | \"space\" | \"delete\" | \"home\" | \"end\" | \"page_up\" | \"page_down\" | \"arrow_up\" | \"arrow_down\" | \"arrow_left\" | \"arrow_right\"}
- {\"type\": \"scroll\", \"amount\": n}   (negative scrolls up)
- {\"type\": \"drag\", \"coords\": [x, y], \"to_coords\": [x, y]}
- {\"type\": \"wait\", \"duration\": ms}

All coordinates are integers in [0, 1000] on both axes, independent of the \
physical resolution.

Clicks, scrolls and the enter key change the screen unpredictably: anything \
you queue after one of them is discarded, and you will plan again from a \
fresh screenshot. Put deterministic sequences (type, tab, type) in one \
round; put an uncertain action last.

Set is_goal_complete to true (with a completion_summary, execute_now null) \
only when the screenshot proves the goal is done.";

/// Compose the full system prompt: the static contract, the task-state
/// injection, and any active skill knowledge.
pub fn system_prompt(context_injection: &str, active_skills: &[ActiveSkill]) -> String {
    let mut out = String::from(BASE_PROMPT);
    if !context_injection.is_empty() {
        out.push_str("\n\n");
        out.push_str(context_injection);
    }
    for skill in active_skills {
        out.push_str(&format!(
            "\n\n## Active skill knowledge: {}\n{}",
            skill.name, skill.body
        ));
    }
    out
}

/// The user-message text for this round (the screenshot rides alongside it).
pub fn round_prompt(ctx: &TaskContext, recovery_threshold: u32) -> String {
    if ctx.in_recovery_mode(recovery_threshold) {
        let last_error = ctx.last_error.as_deref().unwrap_or("unknown");
        return format!(
            "Previous attempts keep failing (last error: {last_error}). \
             Study the screenshot again and take a DIFFERENT approach to: {}",
            ctx.global_goal
        );
    }
    match &ctx.last_round_summary {
        None => format!(
            "Here is the current screen. Analyze it and decide the first \
             round of actions toward the goal: {}",
            ctx.global_goal
        ),
        Some(summary) => format!(
            "The previous round executed:\n{summary}\n\n\
             Here is the screen after those actions. Verify the outcome in \
             your thought, then continue or correct course."
        ),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_prompt_names_wire_fields() {
        for field in [
            "thought",
            "last_action_result",
            "execute_now",
            "is_goal_complete",
            "completion_summary",
            "to_coords",
        ] {
            assert!(BASE_PROMPT.contains(field), "missing {field}");
        }
    }

    #[test]
    fn system_prompt_appends_injection_and_skills() {
        let s = system_prompt(
            "## Task state\nGoal: x",
            &[ActiveSkill {
                name: "open_browser_tab".into(),
                body: "Wait for the page to render.".into(),
            }],
        );
        assert!(s.contains("## Task state"));
        assert!(s.contains("Active skill knowledge: open_browser_tab"));
        assert!(s.contains("Wait for the page to render."));
    }

    #[test]
    fn first_round_prompt_asks_for_analysis() {
        let ctx = TaskContext::new("open settings", None);
        let p = round_prompt(&ctx, 5);
        assert!(p.contains("first"));
        assert!(p.contains("open settings"));
    }

    #[test]
    fn followup_prompt_quotes_last_round() {
        let mut ctx = TaskContext::new("g", None);
        ctx.record_round_actions("Fill login", &[("type \"admin\"".into(), true, String::new())]);
        let p = round_prompt(&ctx, 5);
        assert!(p.contains("Fill login"));
        assert!(p.contains("Verify the outcome"));
    }

    #[test]
    fn recovery_prompt_demands_new_strategy() {
        let mut ctx = TaskContext::new("g", None);
        for _ in 0..5 {
            ctx.record_loop_error("click had no effect");
        }
        let p = round_prompt(&ctx, 5);
        assert!(p.contains("DIFFERENT approach"));
        assert!(p.contains("click had no effect"));
    }
}
