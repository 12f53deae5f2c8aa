// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! History compaction.
//!
//! When the persisted conversation grows past the token budget, the older
//! prefix is summarized by the model into a single synthetic assistant
//! message; the most recent messages are preserved verbatim.  The token
//! estimate (chars/4) is a lower bound — compression may fire late relative
//! to provider-exact counts, never early.

use std::sync::Arc;

use anyhow::Context;

use glimt_model::{CompletionRequest, Message, MessageContent, ModelProvider, Role};

const SUMMARIZE_PROMPT: &str =
    "You are a context compaction assistant. Summarise the following conversation history \
     in a concise, information-dense way. Preserve the goal, every screen observation that \
     still matters, decisions taken, and unresolved problems. The summary will replace the \
     original history to free up context space.";

/// Approximate token count of a message list.
pub fn estimate_tokens(messages: &[Message]) -> usize {
    messages.iter().map(|m| m.approx_tokens()).sum()
}

/// Whether `messages` exceed the compression threshold.
pub fn needs_compression(messages: &[Message], token_threshold: usize) -> bool {
    estimate_tokens(messages) > token_threshold
}

/// Index where the preserved tail begins.
///
/// Starts at `len - keep_recent` and moves backward while the tail would
/// open with a tool result or tool call, so a tool-interaction group is
/// never split from the call it answers.
pub fn split_point(messages: &[Message], keep_recent: usize) -> usize {
    let mut split = messages.len().saturating_sub(keep_recent);
    while split > 0 && split < messages.len() {
        match &messages[split].content {
            MessageContent::ToolResult { .. } | MessageContent::ToolCall { .. } => split -= 1,
            _ => break,
        }
    }
    split
}

/// Compress the history: `[synthetic summary, …last keep_recent messages]`.
///
/// The preserved tail is returned bitwise-identical to the input.  When the
/// list is already within `keep_recent` messages there is nothing to
/// summarize and the input is returned unchanged.
pub async fn compress_history(
    provider: &Arc<dyn ModelProvider>,
    messages: Vec<Message>,
    keep_recent: usize,
) -> anyhow::Result<Vec<Message>> {
    let split = split_point(&messages, keep_recent);
    if split == 0 {
        return Ok(messages);
    }

    let (old, recent) = messages.split_at(split);
    let history_text = serialize_history(old);
    let request = CompletionRequest {
        messages: vec![
            Message::system(SUMMARIZE_PROMPT),
            Message::user(history_text),
        ],
        ..Default::default()
    };
    let completion = provider
        .complete(request)
        .await
        .context("compaction model call failed")?;
    let summary = if completion.text.trim().is_empty() {
        "[earlier history dropped during compaction]".to_string()
    } else {
        completion.text
    };

    let mut result = Vec::with_capacity(recent.len() + 1);
    result.push(Message::assistant(format!(
        "[Conversation summary]\n{summary}"
    )));
    result.extend_from_slice(recent);
    Ok(result)
}

/// Flatten messages into readable text for the summarization request.
fn serialize_history(messages: &[Message]) -> String {
    let mut out = String::new();
    for m in messages {
        let role = match m.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        let text = match &m.content {
            MessageContent::Text(t) => t.clone(),
            MessageContent::ContentParts(_) => m
                .as_text()
                .map(str::to_string)
                .unwrap_or_else(|| "[screenshot]".to_string()),
            MessageContent::ToolCall { function, .. } => {
                format!("[tool call {}({})]", function.name, function.arguments)
            }
            MessageContent::ToolResult { content, .. } => format!("[tool result] {content}"),
        };
        out.push_str(&format!("{role}: {text}\n"));
    }
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use glimt_model::mock::ScriptedProvider;
    use glimt_model::FunctionCall;

    use super::*;

    fn texts(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("user turn {i}"))
                } else {
                    Message::assistant(format!("assistant turn {i}"))
                }
            })
            .collect()
    }

    #[test]
    fn estimate_is_sum_of_message_estimates() {
        let msgs = vec![Message::user("12345678"), Message::assistant("abcd")];
        assert_eq!(estimate_tokens(&msgs), 3);
    }

    #[test]
    fn needs_compression_respects_threshold() {
        let msgs = vec![Message::user("x".repeat(4000))];
        assert!(needs_compression(&msgs, 999));
        assert!(!needs_compression(&msgs, 1001));
    }

    #[test]
    fn split_point_simple_tail() {
        let msgs = texts(20);
        assert_eq!(split_point(&msgs, 10), 10);
        assert_eq!(split_point(&msgs, 30), 0);
    }

    #[test]
    fn split_point_backs_over_tool_groups() {
        let mut msgs = texts(8);
        msgs.push(Message {
            role: Role::Assistant,
            content: MessageContent::ToolCall {
                tool_call_id: "c1".into(),
                function: FunctionCall {
                    name: "run_command".into(),
                    arguments: "{}".into(),
                },
            },
        });
        msgs.push(Message::tool_result("c1", "output"));
        msgs.extend(texts(2));
        // Naive split at len-4 = 8 would orphan the tool result; it must
        // move back before the tool call.
        let split = split_point(&msgs, 4);
        assert_eq!(split, 8);
        assert!(matches!(
            msgs[split].content,
            MessageContent::ToolCall { .. }
        ));
    }

    #[tokio::test]
    async fn compress_keeps_tail_bitwise_identical() {
        let msgs = texts(25);
        let tail: Vec<Message> = msgs[15..].to_vec();
        let provider: Arc<dyn ModelProvider> =
            Arc::new(ScriptedProvider::from_texts(&["condensed history"]));
        let result = compress_history(&provider, msgs, 10).await.unwrap();

        assert_eq!(result.len(), 11);
        // First message is the synthetic summary…
        assert_eq!(result[0].role, Role::Assistant);
        assert!(result[0].as_text().unwrap().contains("condensed history"));
        // …and the tail is exactly the input tail.
        assert_eq!(&result[1..], &tail[..]);
    }

    #[tokio::test]
    async fn compress_noop_when_under_keep_recent() {
        let msgs = texts(5);
        let provider: Arc<dyn ModelProvider> = Arc::new(ScriptedProvider::from_texts(&["unused"]));
        let result = compress_history(&provider, msgs.clone(), 10).await.unwrap();
        assert_eq!(result, msgs);
    }

    #[tokio::test]
    async fn compress_empty_summary_gets_placeholder() {
        let msgs = texts(15);
        let provider: Arc<dyn ModelProvider> = Arc::new(ScriptedProvider::from_texts(&[""]));
        let result = compress_history(&provider, msgs, 5).await.unwrap();
        assert!(result[0]
            .as_text()
            .unwrap()
            .contains("earlier history dropped"));
    }

    #[tokio::test]
    async fn compaction_prompt_receives_old_messages_only() {
        let msgs = texts(12);
        let provider = Arc::new(ScriptedProvider::from_texts(&["s"]));
        let dyn_provider: Arc<dyn ModelProvider> = provider.clone();
        compress_history(&dyn_provider, msgs, 4).await.unwrap();
        let reqs = provider.requests.lock().unwrap();
        let sent = reqs[0].messages[1].as_text().unwrap();
        assert!(sent.contains("user turn 0"));
        assert!(sent.contains("turn 7"));
        assert!(!sent.contains("turn 8"), "tail must not be summarized");
    }
}
