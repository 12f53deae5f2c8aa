// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! End-to-end loop scenarios against scripted providers, a recording input
//! driver, and static screen frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use glimt_config::Config;
use glimt_memory::SessionStore;
use glimt_model::mock::ScriptedProvider;
use glimt_model::{Completion, CompletionRequest, ModelProvider, ToolCallRequest};
use glimt_input::RecordingDriver;
use glimt_screen::{Capturer, FailingSource, FixedPointer, StaticFrameSource};
use glimt_skills::{parse_skill_md, SkillRegistry};
use glimt_tools::{CompleteMilestoneTool, ToolRegistry};

use crate::events::AgentEvent;
use crate::orchestrator::{GoalOutcome, LoopState, Orchestrator};
use crate::EventBus;

// ─── Harness ─────────────────────────────────────────────────────────────────

struct Harness {
    orchestrator: Arc<Orchestrator>,
    driver: Arc<RecordingDriver>,
    bus: EventBus,
    store: Arc<SessionStore>,
    skills: Arc<SkillRegistry>,
}

fn build(provider: Arc<dyn ModelProvider>, driver: RecordingDriver, config: Config) -> Harness {
    let capturer = Arc::new(Capturer::new(
        Box::new(StaticFrameSource {
            width: 1000,
            height: 1000,
        }),
        Box::new(FixedPointer(Some((500, 500)))),
    ));
    let skills = Arc::new(SkillRegistry::new());
    let (tool_tx, tool_rx) = mpsc::unbounded_channel();
    let mut tools = ToolRegistry::new(Arc::clone(&skills), 10, tool_tx.clone());
    tools.register(CompleteMilestoneTool::new(tool_tx));
    let store = Arc::new(SessionStore::open_in_memory().unwrap());
    let bus = EventBus::new(1024);
    let driver = Arc::new(driver);

    let orchestrator = Arc::new(Orchestrator::new(
        provider,
        capturer,
        Arc::clone(&driver) as Arc<dyn glimt_input::InputDriver>,
        Arc::new(tools),
        Arc::clone(&skills),
        Some(Arc::clone(&store)),
        bus.clone(),
        Arc::new(config),
        tool_rx,
    ));
    Harness {
        orchestrator,
        driver,
        bus,
        store,
        skills,
    }
}

fn config(max_iterations: u32, max_failures: u32) -> Config {
    let mut cfg = Config::default();
    cfg.decision_loop.max_iterations = max_iterations;
    cfg.decision_loop.max_consecutive_failures = max_failures;
    cfg
}

fn action_bundle(intent: &str, actions: &str) -> String {
    format!(
        r#"{{"thought": "screen looks right", "last_action_result": "none",
            "execute_now": {{"intent": "{intent}", "actions": [{actions}]}},
            "is_goal_complete": false, "completion_summary": null}}"#
    )
}

fn completion_bundle(summary: &str) -> String {
    format!(
        r#"{{"thought": "verified on screen", "last_action_result": "success",
            "execute_now": null, "is_goal_complete": true,
            "completion_summary": "{summary}"}}"#
    )
}

// ─── Scenario 1: immediate completion ────────────────────────────────────────

#[tokio::test]
async fn immediate_completion() {
    let provider = Arc::new(ScriptedProvider::from_texts(&[&completion_bundle(
        "Already open",
    )]));
    let h = build(provider.clone(), RecordingDriver::new(), config(50, 5));

    let outcome = h.orchestrator.execute_goal("open the app").await;
    assert_eq!(outcome, GoalOutcome::Success("Already open".into()));
    assert_eq!(provider.calls(), 1, "exactly one model call");
    assert!(h.driver.calls().is_empty(), "zero executor calls");
    assert_eq!(h.orchestrator.state(), LoopState::Completed);
}

// ─── Scenario 2: two-round form fill ─────────────────────────────────────────

#[tokio::test]
async fn two_round_form_fill() {
    let round1 = action_bundle(
        "Fill login",
        r#"{"type": "type", "text": "admin"},
           {"type": "key", "key": "tab"},
           {"type": "type", "text": "secret"}"#,
    );
    let provider = Arc::new(ScriptedProvider::from_texts(&[
        &round1,
        &completion_bundle("Logged in"),
    ]));
    let h = build(provider.clone(), RecordingDriver::new(), config(50, 5));

    let mut rx = h.bus.subscribe();
    let outcome = h.orchestrator.execute_goal("log in").await;

    assert_eq!(outcome, GoalOutcome::Success("Logged in".into()));
    assert_eq!(provider.calls(), 2);
    assert_eq!(
        h.driver.calls(),
        vec!["type(admin)", "key(tab)", "type(secret)"],
        "three executor actions in order"
    );

    // No boundary was hit.
    let mut saw_round_finished = false;
    while let Ok(event) = rx.try_recv() {
        if let AgentEvent::RoundFinished {
            hit_boundary,
            executed,
            all_success,
            ..
        } = event
        {
            saw_round_finished = true;
            assert!(!hit_boundary);
            assert!(all_success);
            assert_eq!(executed, 3);
        }
    }
    assert!(saw_round_finished);
}

// ─── Scenario 3: boundary forces re-observation ──────────────────────────────

#[tokio::test]
async fn boundary_forces_reobservation() {
    let round1 = action_bundle(
        "Click then type",
        r#"{"type": "click", "coords": [500, 300]},
           {"type": "type", "text": "hello"}"#,
    );
    let provider = Arc::new(ScriptedProvider::from_texts(&[
        &round1,
        &completion_bundle("Done"),
    ]));
    let h = build(provider.clone(), RecordingDriver::new(), config(50, 5));

    let mut rx = h.bus.subscribe();
    let outcome = h.orchestrator.execute_goal("click and type").await;

    assert_eq!(outcome, GoalOutcome::Success("Done".into()));
    assert_eq!(provider.calls(), 2);
    // Only the click ran; "hello" was discarded by the boundary.
    assert_eq!(h.driver.calls(), vec!["click(500, 300)"]);

    let mut boundary_round = None;
    while let Ok(event) = rx.try_recv() {
        if let AgentEvent::RoundFinished {
            executed,
            hit_boundary,
            ..
        } = event
        {
            boundary_round = Some((executed, hit_boundary));
        }
    }
    assert_eq!(boundary_round, Some((1, true)));
}

// ─── Scenario 4: recovery mode after sustained failure ───────────────────────

#[tokio::test]
async fn recovery_warning_reaches_sixth_prompt() {
    let failing_round = action_bundle("Press the button", r#"{"type": "click", "coords": [10, 10]}"#);
    let scripts: Vec<&str> = vec![&failing_round; 7];
    let provider = Arc::new(ScriptedProvider::from_texts(&scripts));
    // Raise the termination cap so recovery mode (fixed threshold 5) is
    // observable before the loop aborts.
    let h = build(provider.clone(), RecordingDriver::failing(), config(50, 7));

    let outcome = h.orchestrator.execute_goal("press it").await;
    assert!(matches!(outcome, GoalOutcome::Failure(_)));

    let requests = provider.requests.lock().unwrap();
    assert!(requests.len() >= 6);
    let sixth_system = requests[5].messages[0].as_text().unwrap();
    assert!(
        sixth_system.contains("DIFFERENT strategy"),
        "recovery warning missing: {sixth_system}"
    );
    assert!(
        sixth_system.contains("injected failure"),
        "last error must be quoted"
    );
    // The first five prompts carry no warning.
    let first_system = requests[0].messages[0].as_text().unwrap();
    assert!(!first_system.contains("DIFFERENT strategy"));
}

// ─── Scenario 5: over budget ─────────────────────────────────────────────────

#[tokio::test]
async fn max_iterations_yields_partial() {
    let endless = action_bundle("Keep scrolling", r#"{"type": "wait", "duration": 1}"#);
    let scripts: Vec<&str> = vec![&endless; 10];
    let provider = Arc::new(ScriptedProvider::from_texts(&scripts));
    let h = build(provider.clone(), RecordingDriver::new(), config(4, 5));

    let outcome = h.orchestrator.execute_goal("never finishes").await;
    assert_eq!(outcome, GoalOutcome::Partial("max iterations reached".into()));
    assert_eq!(provider.calls(), 4);
    assert_eq!(h.orchestrator.state(), LoopState::Partial);
}

// ─── Scenario 6: interrupt ───────────────────────────────────────────────────

/// Provider adapter that raises the interrupt flag after its N-th response
/// has been handed out, so the loop sees it at the next iteration boundary.
struct InterruptAfter {
    inner: ScriptedProvider,
    after: usize,
    flag: Mutex<Option<Arc<AtomicBool>>>,
}

#[async_trait]
impl ModelProvider for InterruptAfter {
    fn name(&self) -> &str {
        "interrupting-mock"
    }
    fn model_name(&self) -> &str {
        "interrupting-mock"
    }
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<Completion> {
        let completion = self.inner.complete(req).await?;
        if self.inner.calls() >= self.after {
            if let Some(flag) = self.flag.lock().unwrap().as_ref() {
                flag.store(true, Ordering::SeqCst);
            }
        }
        Ok(completion)
    }
}

#[tokio::test]
async fn interrupt_is_acknowledged_at_iteration_boundary() {
    let round = action_bundle("step", r#"{"type": "type", "text": "x"}"#);
    let scripts: Vec<&str> = vec![&round; 10];
    let provider = Arc::new(InterruptAfter {
        inner: ScriptedProvider::from_texts(&scripts),
        after: 3,
        flag: Mutex::new(None),
    });
    let h = build(provider.clone(), RecordingDriver::new(), config(50, 5));
    *provider.flag.lock().unwrap() = Some(h.orchestrator.interrupt_handle());

    let outcome = h.orchestrator.execute_goal("interruptible").await;
    assert_eq!(outcome, GoalOutcome::Partial("interrupted".into()));
    // Rounds 1–3 each executed one action; round 4 never ran.
    assert_eq!(h.driver.calls().len(), 3);
    assert_eq!(h.orchestrator.state(), LoopState::Partial);
}

// ─── Failure recovery paths ──────────────────────────────────────────────────

#[tokio::test]
async fn capture_failures_exhaust_failure_budget() {
    let provider = Arc::new(ScriptedProvider::from_texts(&["unused"]));
    let capturer = Arc::new(Capturer::new(
        Box::new(FailingSource),
        Box::new(FixedPointer(None)),
    ));
    let skills = Arc::new(SkillRegistry::new());
    let (tool_tx, tool_rx) = mpsc::unbounded_channel();
    let tools = ToolRegistry::new(Arc::clone(&skills), 10, tool_tx);
    let orchestrator = Orchestrator::new(
        provider.clone(),
        capturer,
        Arc::new(RecordingDriver::new()),
        Arc::new(tools),
        skills,
        None,
        EventBus::new(16),
        Arc::new(config(50, 3)),
        tool_rx,
    );

    let outcome = orchestrator.execute_goal("see the screen").await;
    match outcome {
        GoalOutcome::Failure(reason) => {
            assert!(reason.contains("too many consecutive failures"));
            assert!(reason.contains("display locked"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(provider.calls(), 0, "no model call without a screenshot");
}

#[tokio::test]
async fn malformed_decisions_count_as_failures_then_recover() {
    let provider = Arc::new(ScriptedProvider::from_texts(&[
        "this is not json",
        r#"{"thought": "", "last_action_result": "none", "execute_now": null,
            "is_goal_complete": false, "completion_summary": null}"#,
        &completion_bundle("Recovered"),
    ]));
    let h = build(provider.clone(), RecordingDriver::new(), config(50, 5));

    let outcome = h.orchestrator.execute_goal("be robust").await;
    assert_eq!(outcome, GoalOutcome::Success("Recovered".into()));
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn fenced_bundle_is_accepted() {
    let fenced = format!("```json\n{}\n```", completion_bundle("Fenced fine"));
    let provider = Arc::new(ScriptedProvider::from_texts(&[&fenced]));
    let h = build(provider.clone(), RecordingDriver::new(), config(50, 5));
    let outcome = h.orchestrator.execute_goal("tolerate fences").await;
    assert_eq!(outcome, GoalOutcome::Success("Fenced fine".into()));
}

// ─── Tool surface ────────────────────────────────────────────────────────────

#[tokio::test]
async fn complete_milestone_bridge_finishes_goal() {
    let provider = Arc::new(ScriptedProvider::new(vec![Completion {
        text: String::new(),
        tool_calls: vec![ToolCallRequest {
            id: "call_1".into(),
            name: "complete_milestone".into(),
            args: serde_json::json!({"summary": "milestone done"}),
        }],
        usage: Default::default(),
    }]));
    let h = build(provider.clone(), RecordingDriver::new(), config(50, 5));

    let outcome = h.orchestrator.execute_goal("legacy completion").await;
    assert_eq!(outcome, GoalOutcome::Success("milestone done".into()));
}

#[tokio::test]
async fn skill_invocation_injects_knowledge_into_next_prompt() {
    let round1 = Completion {
        text: String::new(),
        tool_calls: vec![ToolCallRequest {
            id: "s1".into(),
            name: "echo_greeting".into(),
            args: serde_json::json!({}),
        }],
        usage: Default::default(),
    };
    let provider = Arc::new(ScriptedProvider::new(vec![
        round1,
        Completion::text_only(completion_bundle("Greeted")),
    ]));
    let h = build(provider.clone(), RecordingDriver::new(), config(50, 5));
    h.skills.publish(vec![parse_skill_md(
        "---\n\
         name: Echo Greeting\n\
         description: Greets.\n\
         command: echo hello\n\
         ---\n\
         Always greet in a friendly tone.",
    )
    .unwrap()]);

    let outcome = h.orchestrator.execute_goal("greet").await;
    assert_eq!(outcome, GoalOutcome::Success("Greeted".into()));

    let requests = provider.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    // The skill tool was offered to the model.
    assert!(requests[0].tools.iter().any(|t| t.name == "echo_greeting"));
    // After the invocation, the skill body is active knowledge.
    let second_system = requests[1].messages[0].as_text().unwrap();
    assert!(second_system.contains("Active skill knowledge: echo_greeting"));
    assert!(second_system.contains("friendly tone"));
}

// ─── Loop bookkeeping ────────────────────────────────────────────────────────

#[tokio::test]
async fn turns_are_persisted_with_image_flags() {
    let round1 = action_bundle("one step", r#"{"type": "type", "text": "x"}"#);
    let provider = Arc::new(ScriptedProvider::from_texts(&[
        &round1,
        &completion_bundle("Stored"),
    ]));
    let h = build(provider, RecordingDriver::new(), config(50, 5));

    h.orchestrator.execute_goal("persist me").await;

    let key = h.store.active_session().unwrap();
    let messages = h.store.load_messages(&key).unwrap();
    // Goal note, two screenshot-bearing round prompts, two assistant
    // decisions, final outcome.
    assert!(messages.len() >= 5);
    let with_images = messages.iter().filter(|m| m.has_image).count();
    assert_eq!(with_images, 2, "each round prompt carries a screenshot");
    assert!(messages.iter().any(|m| m.message_type == "assistant"));
}

#[tokio::test]
async fn round_prompts_differ_between_first_and_followup() {
    let round1 = action_bundle("step", r#"{"type": "type", "text": "a"}"#);
    let provider = Arc::new(ScriptedProvider::from_texts(&[
        &round1,
        &completion_bundle("Done"),
    ]));
    let h = build(provider.clone(), RecordingDriver::new(), config(50, 5));
    h.orchestrator.execute_goal("observe prompts").await;

    let requests = provider.requests.lock().unwrap();
    let first = &requests[0].messages[1];
    let second = &requests[1].messages[1];
    // Multimodal user turns: the text part leads, the screenshot follows.
    let first_text = match &first.content {
        glimt_model::MessageContent::ContentParts(parts) => match &parts[0] {
            glimt_model::ContentPart::Text { text } => text.clone(),
            _ => panic!("text part expected first"),
        },
        _ => panic!("multipart user message expected"),
    };
    let second_text = match &second.content {
        glimt_model::MessageContent::ContentParts(parts) => match &parts[0] {
            glimt_model::ContentPart::Text { text } => text.clone(),
            _ => panic!("text part expected first"),
        },
        _ => panic!("multipart user message expected"),
    };
    assert!(first_text.contains("first"));
    assert!(second_text.contains("The previous round executed"));
    assert!(second_text.contains("type \"a\""));
    assert!(first.has_image() && second.has_image());
}

#[tokio::test]
async fn second_goal_while_running_is_rejected() {
    // A provider that never returns keeps the first goal running.
    struct Stalling;
    #[async_trait]
    impl ModelProvider for Stalling {
        fn name(&self) -> &str {
            "stalling"
        }
        fn model_name(&self) -> &str {
            "stalling"
        }
        async fn complete(&self, _req: CompletionRequest) -> anyhow::Result<Completion> {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            Ok(Completion::default())
        }
    }

    let h = build(Arc::new(Stalling), RecordingDriver::new(), config(50, 5));
    let orch = Arc::clone(&h.orchestrator);
    let first = tokio::spawn(async move { orch.execute_goal("long running").await });

    // Give the first goal time to take the Running state.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let second = h.orchestrator.execute_goal("concurrent").await;
    assert_eq!(
        second,
        GoalOutcome::Failure("another goal is already running".into())
    );
    first.abort();
}
