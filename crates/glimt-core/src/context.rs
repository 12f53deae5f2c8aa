// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

/// Recent-action ring capacity.
const RECENT_ACTIONS_CAP: usize = 10;

/// Consecutive failures after which recovery mode is raised.  Distinct from
/// the loop's termination cap, which is configurable; recovery must engage
/// before an (optionally raised) cap aborts the goal.
pub const RECOVERY_THRESHOLD: u32 = 5;

/// How many completed intents the context injection quotes.
const INJECTED_INTENTS: usize = 5;

/// One finished round intent with its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedIntent {
    pub intent: String,
    pub success: bool,
    pub result: String,
}

/// One executed action with its outcome, kept in the bounded ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentAction {
    pub description: String,
    pub success: bool,
    pub result: String,
}

/// Mutable per-goal memory, owned by exactly one decision-loop invocation.
///
/// Everything the next prompt needs to know about the loop so far lives
/// here: the goal, what each round intended and achieved, the last rounds'
/// actions, counters, and the error state that drives recovery mode.
#[derive(Debug)]
pub struct TaskContext {
    pub global_goal: String,
    pub current_intent: Option<String>,
    /// Append-only; lifetime = one goal.
    pub completed_intents: Vec<CompletedIntent>,
    /// Bounded ring of the last executed actions.
    pub recent_actions: VecDeque<RecentAction>,
    /// Textual digest of the previous round, injected into the next prompt.
    pub last_round_summary: Option<String>,
    pub last_error: Option<String>,
    pub total_iterations: u32,
    pub total_actions: u32,
    pub successful_actions: u32,
    pub failed_actions: u32,
    pub consecutive_failures: u32,
    pub start_time: Instant,
    pub deadline: Option<Instant>,
}

impl TaskContext {
    pub fn new(goal: impl Into<String>, budget: Option<Duration>) -> Self {
        let start_time = Instant::now();
        Self {
            global_goal: goal.into(),
            current_intent: None,
            completed_intents: Vec::new(),
            recent_actions: VecDeque::with_capacity(RECENT_ACTIONS_CAP),
            last_round_summary: None,
            last_error: None,
            total_iterations: 0,
            total_actions: 0,
            successful_actions: 0,
            failed_actions: 0,
            consecutive_failures: 0,
            start_time,
            deadline: budget.map(|d| start_time + d),
        }
    }

    pub fn increment_iteration(&mut self) {
        self.total_iterations += 1;
    }

    pub fn start_intent(&mut self, intent: impl Into<String>) {
        self.current_intent = Some(intent.into());
    }

    /// Close the in-flight intent.  Success clears the consecutive-failure
    /// streak; failure extends it and records the error.
    pub fn complete_intent(&mut self, success: bool, result: impl Into<String>) {
        let result = result.into();
        let intent = self
            .current_intent
            .take()
            .unwrap_or_else(|| "(unnamed)".to_string());
        if success {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
            self.last_error = Some(result.clone());
        }
        self.completed_intents.push(CompletedIntent {
            intent,
            success,
            result,
        });
    }

    /// Record a failure that happened outside any action batch (capture,
    /// model parse, validation).  Extends the failure streak like a failed
    /// intent, without consuming an intent slot.
    pub fn record_loop_error(&mut self, error: impl Into<String>) {
        let error = error.into();
        self.consecutive_failures += 1;
        self.last_error = Some(error);
    }

    /// Append one executed action to the bounded ring and the counters.
    pub fn record_action(&mut self, description: impl Into<String>, success: bool, result: impl Into<String>) {
        if self.recent_actions.len() == RECENT_ACTIONS_CAP {
            self.recent_actions.pop_front();
        }
        self.recent_actions.push_back(RecentAction {
            description: description.into(),
            success,
            result: result.into(),
        });
        self.total_actions += 1;
        if success {
            self.successful_actions += 1;
        } else {
            self.failed_actions += 1;
        }
    }

    /// Build the last-round digest from one finished batch.
    pub fn record_round_actions(
        &mut self,
        intent: &str,
        outcomes: &[(String, bool, String)],
    ) {
        let mut summary = format!("Intent: {intent}\n");
        for (description, success, result) in outcomes {
            let marker = if *success { "ok" } else { "FAILED" };
            let _ = writeln!(summary, "- {description} [{marker}] {result}");
        }
        self.last_round_summary = Some(summary.trim_end().to_string());
    }

    /// Recovery mode: sustained failure means the current strategy is not
    /// working and the prompt must demand a different one.
    pub fn in_recovery_mode(&self, threshold: u32) -> bool {
        self.consecutive_failures >= threshold
    }

    pub fn deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// The Markdown block injected into the system prompt each iteration.
    pub fn injection(&self, recovery_threshold: u32) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "## Task state");
        let _ = writeln!(out, "Goal: {}", self.global_goal);
        let _ = writeln!(out, "Iteration: {}", self.total_iterations);

        if !self.completed_intents.is_empty() {
            let _ = writeln!(out, "\nCompleted rounds (most recent last):");
            let start = self.completed_intents.len().saturating_sub(INJECTED_INTENTS);
            for ci in &self.completed_intents[start..] {
                let marker = if ci.success { "ok" } else { "FAILED" };
                let _ = writeln!(out, "- {} [{marker}] {}", ci.intent, ci.result);
            }
        }

        if let Some(summary) = &self.last_round_summary {
            let _ = writeln!(out, "\nPrevious round:\n{summary}");
        }

        if self.in_recovery_mode(recovery_threshold) {
            let last_error = self.last_error.as_deref().unwrap_or("unknown");
            let _ = writeln!(
                out,
                "\nWARNING: {} consecutive failures. The current approach is \
                 not working — try a DIFFERENT strategy. Last error: {last_error}",
                self.consecutive_failures
            );
        }

        out.trim_end().to_string()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
