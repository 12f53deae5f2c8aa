// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use crate::{Completion, CompletionRequest};

#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Human-readable provider name for status display.
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Whether the provider honours a JSON-schema `response_format`.
    ///
    /// When `false`, callers must carry the output contract in the prompt and
    /// validate the response themselves.
    fn supports_response_schema(&self) -> bool {
        true
    }

    /// Send a completion request and block until the full response is
    /// available.
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<Completion>;
}
