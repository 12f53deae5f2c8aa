// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Structural validation of a decision bundle.
//!
//! Validation runs against the raw JSON value, before typed deserialization,
//! so every rule violation carries its stable error name.  A value that
//! passes is guaranteed to deserialize into [`crate::DecisionBundle`].

use std::str::FromStr;

use serde_json::Value;

use crate::{coords, DecisionBundle, KeyCode, MAX_ACTIONS_PER_BATCH};

/// A rejected bundle, named after the violated rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("empty_thought: thought must be a non-empty string")]
    EmptyThought,
    #[error("missing_summary: completed goals require a completion_summary")]
    MissingSummary,
    #[error("missing_execute_now: incomplete goals require an execute_now batch")]
    MissingExecuteNow,
    #[error("no_actions: execute_now.actions must not be empty")]
    NoActions,
    #[error("too_many_actions: batch has {0} actions, maximum is {max}", max = MAX_ACTIONS_PER_BATCH)]
    TooManyActions(usize),
    #[error("missing_action_type: action {0} has no recognised type")]
    MissingActionType(usize),
    #[error("bad_coords: action {0} needs coords as two integers in [0, 1000]")]
    BadCoords(usize),
    #[error("missing_text: action {0} needs a text string")]
    MissingText(usize),
    #[error("bad_key: action {0} needs a key from the key vocabulary")]
    BadKey(usize),
    #[error("missing_amount: action {0} needs an integer amount")]
    MissingAmount(usize),
    #[error("bad_drag: action {0} needs coords and to_coords in [0, 1000]")]
    BadDrag(usize),
    #[error("missing_duration: action {0} needs an integer duration")]
    MissingDuration(usize),
}

impl ValidationError {
    /// The stable rule name (the part before the colon).
    pub fn name(&self) -> &'static str {
        match self {
            ValidationError::EmptyThought => "empty_thought",
            ValidationError::MissingSummary => "missing_summary",
            ValidationError::MissingExecuteNow => "missing_execute_now",
            ValidationError::NoActions => "no_actions",
            ValidationError::TooManyActions(_) => "too_many_actions",
            ValidationError::MissingActionType(_) => "missing_action_type",
            ValidationError::BadCoords(_) => "bad_coords",
            ValidationError::MissingText(_) => "missing_text",
            ValidationError::BadKey(_) => "bad_key",
            ValidationError::MissingAmount(_) => "missing_amount",
            ValidationError::BadDrag(_) => "bad_drag",
            ValidationError::MissingDuration(_) => "missing_duration",
        }
    }
}

/// Validate an already-typed bundle (serializes and re-checks).
pub fn validate_bundle(bundle: &DecisionBundle) -> Result<(), ValidationError> {
    // Serialization of our own types cannot fail.
    let value = serde_json::to_value(bundle).unwrap_or(Value::Null);
    validate_bundle_value(&value)
}

/// Validate a raw JSON decision value against the bundle rules.
pub fn validate_bundle_value(value: &Value) -> Result<(), ValidationError> {
    let thought_ok = value["thought"]
        .as_str()
        .is_some_and(|t| !t.trim().is_empty());
    if !thought_ok {
        return Err(ValidationError::EmptyThought);
    }

    let is_complete = value["is_goal_complete"].as_bool().unwrap_or(false);
    if is_complete {
        let summary_ok = value["completion_summary"]
            .as_str()
            .is_some_and(|s| !s.trim().is_empty());
        if !summary_ok {
            return Err(ValidationError::MissingSummary);
        }
        return Ok(());
    }

    let execute_now = &value["execute_now"];
    if execute_now.is_null() {
        return Err(ValidationError::MissingExecuteNow);
    }

    let actions = match execute_now["actions"].as_array() {
        Some(a) if !a.is_empty() => a,
        _ => return Err(ValidationError::NoActions),
    };
    if actions.len() > MAX_ACTIONS_PER_BATCH {
        return Err(ValidationError::TooManyActions(actions.len()));
    }

    for (i, action) in actions.iter().enumerate() {
        validate_action(i, action)?;
    }
    Ok(())
}

fn validate_action(i: usize, action: &Value) -> Result<(), ValidationError> {
    let ty = action["type"]
        .as_str()
        .ok_or(ValidationError::MissingActionType(i))?;

    match ty {
        "click" | "double_click" | "doubleClick" | "right_click" | "rightClick" => {
            if !coords_in_range(&action["coords"]) {
                return Err(ValidationError::BadCoords(i));
            }
        }
        "type" => {
            if !action["text"].is_string() {
                return Err(ValidationError::MissingText(i));
            }
        }
        "key" => {
            let key_ok = action["key"]
                .as_str()
                .is_some_and(|k| KeyCode::from_str(k).is_ok());
            if !key_ok {
                return Err(ValidationError::BadKey(i));
            }
        }
        "scroll" => {
            if !action["amount"].is_i64() && !action["amount"].is_u64() {
                return Err(ValidationError::MissingAmount(i));
            }
        }
        "drag" => {
            let to = if action["to_coords"].is_null() {
                &action["toCoords"]
            } else {
                &action["to_coords"]
            };
            if !coords_in_range(&action["coords"]) || !coords_in_range(to) {
                return Err(ValidationError::BadDrag(i));
            }
        }
        "wait" => {
            if !action["duration"].is_u64() {
                return Err(ValidationError::MissingDuration(i));
            }
        }
        // Anything outside the vocabulary is indistinguishable from a
        // missing type as far as dispatch is concerned.
        _ => return Err(ValidationError::MissingActionType(i)),
    }
    Ok(())
}

fn coords_in_range(v: &Value) -> bool {
    let Some(pair) = v.as_array() else {
        return false;
    };
    pair.len() == 2
        && pair
            .iter()
            .all(|c| c.as_i64().is_some_and(coords::in_range))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
