// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::validate::{validate_bundle_value, ValidationError};

/// The model's output for one loop iteration.
///
/// Exactly one of the two terminal shapes is legal: either the goal is
/// complete (`is_goal_complete = true`, non-empty `completion_summary`) or the
/// model hands back a batch to execute (`execute_now` present).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionBundle {
    /// The model's verbal analysis, including its verification of the
    /// previous round.
    pub thought: String,
    #[serde(default)]
    pub last_action_result: LastActionResult,
    #[serde(default)]
    pub execute_now: Option<ExecuteNow>,
    pub is_goal_complete: bool,
    #[serde(default)]
    pub completion_summary: Option<String>,
}

/// The model's verdict on the previous round, as seen on the new screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastActionResult {
    Success,
    Failed,
    Partial,
    #[default]
    None,
}

/// A named batch of 1–5 ordered actions to run before the next observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteNow {
    pub intent: String,
    pub actions: Vec<Action>,
}

/// Maximum number of actions the model may batch into one round.
pub const MAX_ACTIONS_PER_BATCH: usize = 5;

/// One primitive input action in normalized coordinates.
///
/// camelCase aliases are accepted on input because models drift between the
/// two casings; serialization always emits snake_case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Click {
        coords: [i64; 2],
    },
    #[serde(alias = "doubleClick")]
    DoubleClick {
        coords: [i64; 2],
    },
    #[serde(alias = "rightClick")]
    RightClick {
        coords: [i64; 2],
    },
    Type {
        text: String,
    },
    Key {
        key: KeyCode,
    },
    Scroll {
        /// Wheel amount; negative scrolls up.
        amount: i64,
    },
    Drag {
        coords: [i64; 2],
        #[serde(alias = "toCoords")]
        to_coords: [i64; 2],
    },
    Wait {
        /// Milliseconds.
        duration: u64,
    },
}

impl Action {
    /// Whether this action is presumed to change the screen in ways that
    /// cannot be predicted before the next observation.  Boundary actions
    /// terminate a batch unless they are its final action.
    pub fn is_boundary(&self) -> bool {
        matches!(
            self,
            Action::Click { .. }
                | Action::DoubleClick { .. }
                | Action::RightClick { .. }
                | Action::Scroll { .. }
                | Action::Key {
                    key: KeyCode::Enter
                }
        )
    }

    /// Short human-readable descriptor used in events and round summaries.
    pub fn describe(&self) -> String {
        match self {
            Action::Click { coords } => format!("click ({}, {})", coords[0], coords[1]),
            Action::DoubleClick { coords } => {
                format!("double-click ({}, {})", coords[0], coords[1])
            }
            Action::RightClick { coords } => {
                format!("right-click ({}, {})", coords[0], coords[1])
            }
            Action::Type { text } => format!("type {text:?}"),
            Action::Key { key } => format!("press {key}"),
            Action::Scroll { amount } => format!("scroll {amount}"),
            Action::Drag { coords, to_coords } => format!(
                "drag ({}, {}) -> ({}, {})",
                coords[0], coords[1], to_coords[0], to_coords[1]
            ),
            Action::Wait { duration } => format!("wait {duration}ms"),
        }
    }
}

/// Named keys the model may press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCode {
    Enter,
    Tab,
    Escape,
    Backspace,
    Space,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
}

impl KeyCode {
    pub const ALL: &'static [KeyCode] = &[
        KeyCode::Enter,
        KeyCode::Tab,
        KeyCode::Escape,
        KeyCode::Backspace,
        KeyCode::Space,
        KeyCode::Delete,
        KeyCode::Home,
        KeyCode::End,
        KeyCode::PageUp,
        KeyCode::PageDown,
        KeyCode::ArrowUp,
        KeyCode::ArrowDown,
        KeyCode::ArrowLeft,
        KeyCode::ArrowRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyCode::Enter => "enter",
            KeyCode::Tab => "tab",
            KeyCode::Escape => "escape",
            KeyCode::Backspace => "backspace",
            KeyCode::Space => "space",
            KeyCode::Delete => "delete",
            KeyCode::Home => "home",
            KeyCode::End => "end",
            KeyCode::PageUp => "page_up",
            KeyCode::PageDown => "page_down",
            KeyCode::ArrowUp => "arrow_up",
            KeyCode::ArrowDown => "arrow_down",
            KeyCode::ArrowLeft => "arrow_left",
            KeyCode::ArrowRight => "arrow_right",
        }
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyCode::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or(())
    }
}

/// Errors from [`parse_bundle`].
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("decision is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Parse and validate a model response into a [`DecisionBundle`].
///
/// The text may be wrapped in a ```` ```json ```` fence — providers without
/// native structured output often emit one despite instructions.  Validation
/// runs on the raw JSON value so rule violations surface with their stable
/// error names instead of serde's positional messages.
pub fn parse_bundle(text: &str) -> Result<DecisionBundle, BundleError> {
    let stripped = strip_code_fence(text);
    let value: serde_json::Value = serde_json::from_str(stripped)?;
    validate_bundle_value(&value)?;
    Ok(serde_json::from_value(value)?)
}

/// Strip a surrounding Markdown code fence, tolerating a language tag and
/// surrounding whitespace.  Returns the input unchanged when no fence wraps it.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the language tag on the opening fence line, if any.
    match body.split_once('\n') {
        Some((first, remainder)) if first.trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            remainder.trim()
        }
        _ => body.trim(),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
