// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use glimt_config::Config;
use glimt_decision::{decision_bundle_schema, parse_bundle};
use glimt_input::InputDriver;
use glimt_memory::SessionStore;
use glimt_model::{
    CompletionRequest, ContentPart, Message, ModelProvider, ResponseFormat, ToolCallRequest,
    ToolSchema,
};
use glimt_screen::Capturer;
use glimt_skills::SkillRegistry;
use glimt_tools::{ToolCall, ToolEvent, ToolRegistry};

use crate::compact;
use crate::context::{TaskContext, RECOVERY_THRESHOLD};
use crate::events::{AgentEvent, EventBus};
use crate::executor::LocalExecutor;
use crate::prompts::{self, ActiveSkill};

/// Terminal outcome of one goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoalOutcome {
    Success(String),
    Failure(String),
    Partial(String),
}

impl GoalOutcome {
    pub fn reason(&self) -> &str {
        match self {
            GoalOutcome::Success(s) | GoalOutcome::Failure(s) | GoalOutcome::Partial(s) => s,
        }
    }
}

/// Loop state, per goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Completed,
    Failed,
    Partial,
}

/// Drives the observe → decide → act cycle for one goal at a time.
///
/// Exactly one `execute_goal` may be active per process; a second call while
/// one is running is rejected.  `interrupt()` is acknowledged at the next
/// iteration boundary and between actions inside a batch, never mid-event.
pub struct Orchestrator {
    provider: Arc<dyn ModelProvider>,
    capturer: Arc<Capturer>,
    executor: LocalExecutor,
    tools: Arc<ToolRegistry>,
    skills: Arc<SkillRegistry>,
    store: Option<Arc<SessionStore>>,
    bus: EventBus,
    config: Arc<Config>,
    interrupt: Arc<AtomicBool>,
    state: Mutex<LoopState>,
    tool_events: Mutex<mpsc::UnboundedReceiver<ToolEvent>>,
    /// Skill knowledge activated by invocations during this goal.
    active_skills: Mutex<Vec<ActiveSkill>>,
    /// Rolling conversation record, compacted when over the token budget.
    history: Mutex<Vec<Message>>,
}

#[allow(clippy::too_many_arguments)]
impl Orchestrator {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        capturer: Arc<Capturer>,
        driver: Arc<dyn InputDriver>,
        tools: Arc<ToolRegistry>,
        skills: Arc<SkillRegistry>,
        store: Option<Arc<SessionStore>>,
        bus: EventBus,
        config: Arc<Config>,
        tool_events: mpsc::UnboundedReceiver<ToolEvent>,
    ) -> Self {
        let interrupt = Arc::new(AtomicBool::new(false));
        let executor = LocalExecutor::new(driver, Arc::clone(&capturer), Arc::clone(&interrupt));
        Self {
            provider,
            capturer,
            executor,
            tools,
            skills,
            store,
            bus,
            config,
            interrupt,
            state: Mutex::new(LoopState::Idle),
            tool_events: Mutex::new(tool_events),
            active_skills: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Request cancellation.  The loop acknowledges it at the next iteration
    /// boundary; a batch in flight stops before its next action.
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::SeqCst);
    }

    /// Shared handle to the interrupt flag, e.g. for a Ctrl-C handler.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    pub fn state(&self) -> LoopState {
        *self.state.lock().unwrap()
    }

    /// Run the loop for `goal` until completion, failure, or a budget stop.
    pub async fn execute_goal(&self, goal: &str) -> GoalOutcome {
        {
            let mut state = self.state.lock().unwrap();
            if *state == LoopState::Running {
                return GoalOutcome::Failure("another goal is already running".into());
            }
            *state = LoopState::Running;
        }
        self.interrupt.store(false, Ordering::SeqCst);
        self.active_skills.lock().unwrap().clear();

        info!(goal, "goal started");
        self.bus.emit(AgentEvent::GoalStarted { goal: goal.into() });
        self.persist("user", &format!("Goal: {goal}"), false);

        let deadline = Duration::from_secs(self.config.decision_loop.deadline_seconds);
        let mut ctx = TaskContext::new(goal, Some(deadline));
        let outcome = self.run_loop(&mut ctx).await;

        let (state, event) = match &outcome {
            GoalOutcome::Success(summary) => (
                LoopState::Completed,
                AgentEvent::GoalCompleted {
                    summary: summary.clone(),
                },
            ),
            GoalOutcome::Failure(reason) => (
                LoopState::Failed,
                AgentEvent::GoalFailed {
                    reason: reason.clone(),
                },
            ),
            GoalOutcome::Partial(reason) if reason == "interrupted" => (
                LoopState::Partial,
                AgentEvent::GoalInterrupted {
                    reason: reason.clone(),
                },
            ),
            GoalOutcome::Partial(reason) => (
                LoopState::Partial,
                AgentEvent::GoalFailed {
                    reason: reason.clone(),
                },
            ),
        };
        *self.state.lock().unwrap() = state;
        self.bus.emit(event);
        self.persist("assistant", outcome.reason(), false);
        info!(outcome = ?outcome, iterations = ctx.total_iterations, "goal finished");
        outcome
    }

    async fn run_loop(&self, ctx: &mut TaskContext) -> GoalOutcome {
        let max_iterations = self.config.decision_loop.max_iterations;
        let max_failures = self.config.decision_loop.max_consecutive_failures;

        while ctx.total_iterations < max_iterations {
            ctx.increment_iteration();
            self.bus.emit(AgentEvent::IterationStarted {
                iteration: ctx.total_iterations,
            });

            if self.interrupt.load(Ordering::SeqCst) {
                return GoalOutcome::Partial("interrupted".into());
            }
            if ctx.consecutive_failures >= max_failures {
                let last = ctx.last_error.as_deref().unwrap_or("unknown");
                return GoalOutcome::Failure(format!(
                    "too many consecutive failures: {last}"
                ));
            }
            if ctx.deadline_exceeded() {
                return GoalOutcome::Partial("deadline exceeded".into());
            }

            // Observe.
            let shot = match self.capturer.capture() {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "capture failed; retrying next iteration");
                    ctx.record_loop_error(e.to_string());
                    continue;
                }
            };

            self.maybe_compact().await;

            // Decide.
            let injection = ctx.injection(RECOVERY_THRESHOLD);
            let active = self.active_skills.lock().unwrap().clone();
            let system = prompts::system_prompt(&injection, &active);
            let round = prompts::round_prompt(ctx, RECOVERY_THRESHOLD);
            let request = CompletionRequest {
                messages: vec![
                    Message::system(system),
                    Message::user_with_parts(vec![
                        ContentPart::text(round.clone()),
                        ContentPart::image(shot.to_data_url()),
                    ]),
                ],
                tools: self
                    .tools
                    .schemas()
                    .into_iter()
                    .map(|s| ToolSchema {
                        name: s.name,
                        description: s.description,
                        parameters: s.parameters,
                    })
                    .collect(),
                response_format: self
                    .provider
                    .supports_response_schema()
                    .then(|| ResponseFormat {
                        name: "decision_bundle".into(),
                        schema: decision_bundle_schema(),
                    }),
            };

            let completion = match self.provider.complete(request).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "model call failed");
                    ctx.record_loop_error(format!("model call failed: {e}"));
                    continue;
                }
            };

            self.persist("user", &round, true);
            self.push_history(Message::user(round));
            if !completion.text.is_empty() {
                self.persist("assistant", &completion.text, false);
                self.push_history(Message::assistant(completion.text.clone()));
            }

            // Function-calling surface: built-ins and skills.
            if !completion.tool_calls.is_empty() {
                if let Some(outcome) = self.dispatch_tools(ctx, &completion.tool_calls).await {
                    return outcome;
                }
                if completion.text.trim().is_empty() {
                    // Pure tool round; observe the effects next iteration.
                    continue;
                }
            }

            // Parse and validate the decision.
            let bundle = match parse_bundle(&completion.text) {
                Ok(b) => b,
                Err(e) => {
                    warn!(error = %e, "malformed decision");
                    ctx.record_loop_error(e.to_string());
                    continue;
                }
            };
            debug!(thought = %bundle.thought, "decision");

            if bundle.is_goal_complete {
                let summary = bundle
                    .completion_summary
                    .unwrap_or_else(|| "goal complete".into());
                return GoalOutcome::Success(summary);
            }

            // Validation guarantees execute_now is present here.
            let Some(batch) = bundle.execute_now else {
                ctx.record_loop_error("missing_execute_now");
                continue;
            };

            // Act.
            ctx.start_intent(&batch.intent);
            self.bus.emit(AgentEvent::RoundStarted {
                intent: batch.intent.clone(),
                iteration: ctx.total_iterations,
            });

            let result = self.executor.execute_batch(&batch).await;

            let mut outcomes = Vec::with_capacity(result.results.len());
            for r in &result.results {
                if r.success {
                    self.bus.emit(AgentEvent::ActionExecuted {
                        action: r.description.clone(),
                        success: true,
                        message: r.message.clone(),
                    });
                } else {
                    self.bus.emit(AgentEvent::ActionFailed {
                        action: r.description.clone(),
                        message: r.message.clone(),
                    });
                }
                ctx.record_action(r.description.clone(), r.success, r.message.clone());
                outcomes.push((r.description.clone(), r.success, r.message.clone()));
            }
            ctx.record_round_actions(&result.intent, &outcomes);

            let round_note = if result.all_success {
                if result.hit_boundary && result.executed < batch.actions.len() {
                    format!(
                        "{} of {} actions ran before a boundary forced re-observation",
                        result.executed,
                        batch.actions.len()
                    )
                } else {
                    format!("all {} actions executed", result.executed)
                }
            } else {
                result
                    .results
                    .iter()
                    .find(|r| !r.success)
                    .map(|r| format!("{} failed: {}", r.description, r.message))
                    .unwrap_or_else(|| "action failed".into())
            };
            ctx.complete_intent(result.all_success, round_note);

            self.bus.emit(AgentEvent::RoundFinished {
                intent: result.intent.clone(),
                executed: result.executed,
                all_success: result.all_success,
                hit_boundary: result.hit_boundary,
            });
        }

        GoalOutcome::Partial("max iterations reached".into())
    }

    /// Execute the model's tool calls, record their outputs, and fold tool
    /// events back into loop state.  Returns an outcome when a completion
    /// bridge fired.
    async fn dispatch_tools(
        &self,
        ctx: &mut TaskContext,
        calls: &[ToolCallRequest],
    ) -> Option<GoalOutcome> {
        for call in calls {
            let tc = ToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
                args: call.args.clone(),
            };
            let output = self.tools.execute(&tc).await;
            debug!(tool = %call.name, is_error = output.is_error, "tool executed");
            self.persist("tool", &output.content, false);
            self.push_history(Message::tool_result(&call.id, &output.content));
            ctx.record_action(
                format!("tool {}", call.name),
                !output.is_error,
                truncate_note(&output.content),
            );
        }

        let mut completed: Option<String> = None;
        {
            let mut rx = self.tool_events.lock().unwrap();
            while let Ok(event) = rx.try_recv() {
                match event {
                    ToolEvent::GoalComplete { summary } => completed = Some(summary),
                    ToolEvent::SkillInvoked { tool_name, command } => {
                        debug!(skill = %tool_name, command = %command, "skill knowledge activated");
                        if let Some(skill) = self.skills.find(&tool_name) {
                            let mut active = self.active_skills.lock().unwrap();
                            if !active.iter().any(|s| s.name == tool_name) {
                                active.push(ActiveSkill {
                                    name: tool_name,
                                    body: skill.body.clone(),
                                });
                            }
                        }
                    }
                }
            }
        }
        completed.map(GoalOutcome::Success)
    }

    /// Compact the rolling history when it exceeds the token budget.
    ///
    /// The configured threshold is capped by the decision model's context
    /// window (when the catalog knows it) so a small local model compacts
    /// long before the default budget would fire.
    async fn maybe_compact(&self) {
        let budget = glimt_model::catalog::compaction_budget(
            self.provider.name(),
            self.provider.model_name(),
            self.config.memory.token_threshold,
        );
        let snapshot = {
            let history = self.history.lock().unwrap();
            if !compact::needs_compression(&history, budget) {
                return;
            }
            history.clone()
        };
        let before = snapshot.len();
        match compact::compress_history(
            &self.provider,
            snapshot,
            self.config.memory.keep_recent_messages,
        )
        .await
        {
            Ok(compacted) => {
                info!(before, after = compacted.len(), "history compacted");
                *self.history.lock().unwrap() = compacted;
            }
            Err(e) => warn!(error = %e, "history compaction failed; keeping full history"),
        }
    }

    fn push_history(&self, message: Message) {
        self.history.lock().unwrap().push(message);
    }

    /// Best-effort persistence; store failures never reach the loop.
    fn persist(&self, message_type: &str, content: &str, has_image: bool) {
        let Some(store) = &self.store else { return };
        let key = match store.ensure_session() {
            Ok(k) => k,
            Err(e) => {
                warn!(error = %e, "session unavailable; turn not persisted");
                return;
            }
        };
        // chars/4 plus the flat image estimate, mirroring the prompt cost.
        let tokens = (content.len() / 4) as i64 + if has_image { 765 } else { 0 };
        if let Err(e) = store.save_message(&key, message_type, content, has_image, tokens) {
            warn!(error = %e, "failed to persist turn");
        }
    }
}

fn truncate_note(s: &str) -> String {
    const NOTE_MAX: usize = 200;
    if s.len() <= NOTE_MAX {
        return s.to_string();
    }
    let mut end = NOTE_MAX;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}
