// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde_json::{json, Value};

/// JSON schema of the decision bundle, handed to providers as the
/// `response_format` so structured-output backends guarantee parseable
/// decisions.  Kept in sync with the serde types in `bundle.rs`.
pub fn decision_bundle_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "thought": {
                "type": "string",
                "description": "Analysis of the current screen, including verification of the previous round."
            },
            "last_action_result": {
                "type": "string",
                "enum": ["success", "failed", "partial", "none"]
            },
            "execute_now": {
                "anyOf": [
                    { "type": "null" },
                    {
                        "type": "object",
                        "properties": {
                            "intent": { "type": "string" },
                            "actions": {
                                "type": "array",
                                "minItems": 1,
                                "maxItems": 5,
                                "items": action_schema(),
                            }
                        },
                        "required": ["intent", "actions"],
                        "additionalProperties": false
                    }
                ]
            },
            "is_goal_complete": { "type": "boolean" },
            "completion_summary": {
                "anyOf": [{ "type": "null" }, { "type": "string" }]
            }
        },
        "required": [
            "thought",
            "last_action_result",
            "execute_now",
            "is_goal_complete",
            "completion_summary"
        ],
        "additionalProperties": false
    })
}

fn action_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "type": {
                "type": "string",
                "enum": [
                    "click", "double_click", "right_click", "type",
                    "key", "scroll", "drag", "wait"
                ]
            },
            "coords": {
                "type": "array",
                "items": { "type": "integer", "minimum": 0, "maximum": 1000 },
                "minItems": 2,
                "maxItems": 2
            },
            "to_coords": {
                "type": "array",
                "items": { "type": "integer", "minimum": 0, "maximum": 1000 },
                "minItems": 2,
                "maxItems": 2
            },
            "text": { "type": "string" },
            "key": {
                "type": "string",
                "enum": [
                    "enter", "tab", "escape", "backspace", "space", "delete",
                    "home", "end", "page_up", "page_down",
                    "arrow_up", "arrow_down", "arrow_left", "arrow_right"
                ]
            },
            "amount": { "type": "integer" },
            "duration": { "type": "integer", "minimum": 0 }
        },
        "required": ["type"]
    })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
