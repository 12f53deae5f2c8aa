// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Markdown export of a stored session.
//!
//! Screenshots are not stored (only the fact that a turn carried one), so
//! image turns render as their prompt text plus a marker.

use chrono::{DateTime, Utc};

use crate::store::StoredMessage;

/// Serialize one stored turn into a Markdown section.
fn message_to_section(msg: &StoredMessage) -> String {
    let heading = match msg.message_type.as_str() {
        "user" => "## User",
        "assistant" => "## Glimt",
        "tool" => "## Tool Result",
        "system" => return String::new(), // injected fresh on every run
        other => return format!("## {other}\n{}\n\n", msg.content.trim()),
    };
    let marker = if msg.has_image {
        "\n\n*(a screenshot accompanied this turn)*"
    } else {
        ""
    };
    if msg.message_type == "tool" {
        format!("{heading}\n```\n{}\n```\n\n", msg.content.trim())
    } else {
        format!("{heading}\n{}{marker}\n\n", msg.content.trim())
    }
}

/// Serialize a whole session into a fresh Markdown document.
pub fn serialize_session(session_key: &str, messages: &[StoredMessage]) -> String {
    let mut out = format!("# Session {session_key}\n\n");
    if let Some(first) = messages.first() {
        if let Some(ts) = DateTime::<Utc>::from_timestamp_millis(first.created_at) {
            out.push_str(&format!("Started: {}\n\n", ts.to_rfc3339()));
        }
    }
    for msg in messages {
        out.push_str(&message_to_section(msg));
    }
    out.trim_end().to_string() + "\n"
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
