// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{Completion, CompletionRequest, Role};

/// Deterministic mock provider.  Echoes the last user text back as the
/// response.  Selectable from config (`provider = "mock"`) for offline runs.
#[derive(Default)]
pub struct EchoProvider;

#[async_trait]
impl crate::ModelProvider for EchoProvider {
    fn name(&self) -> &str {
        "mock"
    }
    fn model_name(&self) -> &str {
        "mock-model"
    }
    fn supports_response_schema(&self) -> bool {
        false
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<Completion> {
        let reply = req
            .messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .and_then(|m| m.as_text())
            .unwrap_or("[no input]")
            .to_string();
        Ok(Completion::text_only(format!("MOCK: {reply}")))
    }
}

/// A pre-scripted mock provider.  Each call to `complete` pops the next
/// completion from the front of the queue.  Tests use it to drive the
/// decision loop through exact response sequences without network access.
pub struct ScriptedProvider {
    scripts: Arc<Mutex<Vec<Completion>>>,
    /// Every `CompletionRequest` seen by this provider, in call order.
    /// Written on each `complete()` call so tests can inspect what was sent.
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedProvider {
    /// Build a provider from an ordered list of completions.
    pub fn new(scripts: Vec<Completion>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Convenience: provider answering with the given texts in order.
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|t| Completion::text_only(t.as_ref()))
                .collect(),
        )
    }

    /// Number of completions handed out so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl crate::ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted-mock"
    }
    fn model_name(&self) -> &str {
        "scripted-mock-model"
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<Completion> {
        self.requests.lock().unwrap().push(req);
        let mut scripts = self.scripts.lock().unwrap();
        if scripts.is_empty() {
            // Default fallback when all scripts are consumed
            Ok(Completion::text_only("[no more scripts]"))
        } else {
            Ok(scripts.remove(0))
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
