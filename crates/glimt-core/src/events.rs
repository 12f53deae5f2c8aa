// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::trace;

/// Lifecycle events emitted by the decision loop.
///
/// Consumers (CLI printer, WebSocket forwarder) subscribe to these; delivery
/// is best-effort and never blocks the loop.  The `Tts*` kinds originate in
/// external collaborators — the core only relays them.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    GoalStarted {
        goal: String,
    },
    IterationStarted {
        iteration: u32,
    },
    RoundStarted {
        intent: String,
        iteration: u32,
    },
    ActionExecuted {
        action: String,
        success: bool,
        message: String,
    },
    ActionFailed {
        action: String,
        message: String,
    },
    RoundFinished {
        intent: String,
        executed: usize,
        all_success: bool,
        hit_boundary: bool,
    },
    GoalCompleted {
        summary: String,
    },
    GoalFailed {
        reason: String,
    },
    GoalInterrupted {
        reason: String,
    },
    TtsAudio {
        payload: Value,
    },
    TtsSkip {
        payload: Value,
    },
    TtsError {
        payload: Value,
    },
}

impl AgentEvent {
    /// The wire-normative event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::GoalStarted { .. } => "goal_started",
            AgentEvent::IterationStarted { .. } => "iteration_started",
            AgentEvent::RoundStarted { .. } => "round_started",
            AgentEvent::ActionExecuted { .. } => "action_executed",
            AgentEvent::ActionFailed { .. } => "action_failed",
            AgentEvent::RoundFinished { .. } => "round_finished",
            AgentEvent::GoalCompleted { .. } => "goal_completed",
            AgentEvent::GoalFailed { .. } => "goal_failed",
            AgentEvent::GoalInterrupted { .. } => "goal_interrupted",
            AgentEvent::TtsAudio { .. } => "tts_audio",
            AgentEvent::TtsSkip { .. } => "tts_skip",
            AgentEvent::TtsError { .. } => "tts_error",
        }
    }

    /// The wire-normative payload for this kind.
    pub fn payload(&self) -> Value {
        match self {
            AgentEvent::GoalStarted { goal } => json!({ "goal": goal }),
            AgentEvent::IterationStarted { iteration } => json!({ "iteration": iteration }),
            AgentEvent::RoundStarted { intent, iteration } => {
                json!({ "intent": intent, "iteration": iteration })
            }
            AgentEvent::ActionExecuted {
                action,
                success,
                message,
            } => json!({ "action": action, "success": success, "message": message }),
            AgentEvent::ActionFailed { action, message } => {
                json!({ "action": action, "message": message })
            }
            AgentEvent::RoundFinished {
                intent,
                executed,
                all_success,
                hit_boundary,
            } => json!({
                "intent": intent,
                "executed": executed,
                "all_success": all_success,
                "hit_boundary": hit_boundary,
            }),
            AgentEvent::GoalCompleted { summary } => json!({ "summary": summary }),
            AgentEvent::GoalFailed { reason } => json!({ "reason": reason }),
            AgentEvent::GoalInterrupted { reason } => json!({ "reason": reason }),
            AgentEvent::TtsAudio { payload }
            | AgentEvent::TtsSkip { payload }
            | AgentEvent::TtsError { payload } => payload.clone(),
        }
    }
}

/// The `{type, data, timestamp}` wire envelope forwarded over WebSocket.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
    /// Unix milliseconds.
    pub timestamp: i64,
}

impl From<&AgentEvent> for Envelope {
    fn from(event: &AgentEvent) -> Self {
        Self {
            kind: event.kind().to_string(),
            data: event.payload(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Broadcast fan-out for agent events.
///
/// Each subscriber gets its own bounded buffer; a slow subscriber lags and
/// loses the oldest events instead of stalling the loop.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AgentEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }

    /// Non-blocking emit; an event with no subscribers is simply dropped.
    pub fn emit(&self, event: AgentEvent) {
        trace!(kind = event.kind(), "event");
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_wire_normative() {
        let cases: Vec<(AgentEvent, &str)> = vec![
            (
                AgentEvent::GoalStarted { goal: "g".into() },
                "goal_started",
            ),
            (
                AgentEvent::IterationStarted { iteration: 1 },
                "iteration_started",
            ),
            (
                AgentEvent::RoundStarted {
                    intent: "i".into(),
                    iteration: 2,
                },
                "round_started",
            ),
            (
                AgentEvent::ActionExecuted {
                    action: "click".into(),
                    success: true,
                    message: String::new(),
                },
                "action_executed",
            ),
            (
                AgentEvent::ActionFailed {
                    action: "c".into(),
                    message: "m".into(),
                },
                "action_failed",
            ),
            (
                AgentEvent::RoundFinished {
                    intent: "i".into(),
                    executed: 1,
                    all_success: true,
                    hit_boundary: false,
                },
                "round_finished",
            ),
            (
                AgentEvent::GoalCompleted { summary: "s".into() },
                "goal_completed",
            ),
            (AgentEvent::GoalFailed { reason: "r".into() }, "goal_failed"),
            (
                AgentEvent::GoalInterrupted { reason: "r".into() },
                "goal_interrupted",
            ),
            (AgentEvent::TtsAudio { payload: json!({}) }, "tts_audio"),
            (AgentEvent::TtsSkip { payload: json!({}) }, "tts_skip"),
            (AgentEvent::TtsError { payload: json!({}) }, "tts_error"),
        ];
        for (event, kind) in cases {
            assert_eq!(event.kind(), kind);
        }
    }

    #[test]
    fn round_started_payload_shape() {
        let e = AgentEvent::RoundStarted {
            intent: "Fill login".into(),
            iteration: 3,
        };
        let p = e.payload();
        assert_eq!(p["intent"], "Fill login");
        assert_eq!(p["iteration"], 3);
    }

    #[test]
    fn envelope_serializes_with_type_field() {
        let e = AgentEvent::GoalCompleted {
            summary: "done".into(),
        };
        let envelope = Envelope::from(&e);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "goal_completed");
        assert_eq!(json["data"]["summary"], "done");
        assert!(json["timestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn subscriber_receives_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.emit(AgentEvent::IterationStarted { iteration: 1 });
        let got = rx.recv().await.unwrap();
        assert_eq!(got.kind(), "iteration_started");
    }

    #[test]
    fn emit_without_subscribers_does_not_block_or_error() {
        let bus = EventBus::new(1);
        for i in 0..100 {
            bus.emit(AgentEvent::IterationStarted { iteration: i });
        }
    }

    #[tokio::test]
    async fn slow_subscriber_lags_but_sees_newest() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for i in 0..10 {
            bus.emit(AgentEvent::IterationStarted { iteration: i });
        }
        // The oldest events were dropped; the receiver reports the lag and
        // then yields the retained tail.
        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(n)) => assert!(n > 0),
            Ok(ev) => panic!("expected lag, got {:?}", ev.kind()),
            Err(e) => panic!("unexpected: {e:?}"),
        }
        let next = rx.recv().await.unwrap();
        assert_eq!(next.kind(), "iteration_started");
    }
}
