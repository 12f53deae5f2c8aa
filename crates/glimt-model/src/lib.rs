// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Model-provider abstraction for glimt.
//!
//! The decision loop makes exactly one blocking model call per iteration, so
//! the provider contract is a plain request → response exchange rather than a
//! streaming one.  Providers that support a JSON-schema `response_format`
//! receive the decision schema verbatim; the loop's own validation handles
//! providers that only honour prompt-level instructions.

use std::sync::Arc;

use anyhow::bail;
use tracing::warn;

pub mod catalog;
pub mod mock;
mod openai_compat;
mod provider;
mod types;

pub use openai_compat::OpenAICompatProvider;
pub use provider::ModelProvider;
pub use types::*;

/// Build a provider from config.
///
/// `"openai"` covers every OpenAI-compatible endpoint (the base URL decides
/// where requests go); `"mock"` is the in-process echo provider used for
/// offline runs and tests.
pub fn from_config(cfg: &glimt_config::ModelConfig) -> anyhow::Result<Arc<dyn ModelProvider>> {
    // Every decision turn carries a screenshot; an unknown or text-only
    // model usually means a typo in the config.  Advisory only — custom
    // endpoints serve models the catalog has never heard of.
    if !catalog::is_vision_capable(&cfg.provider, &cfg.name) {
        warn!(
            model = %cfg.name,
            "model is not in the catalog as vision-capable; screenshots may be rejected"
        );
    }
    match cfg.provider.as_str() {
        "openai" => {
            let api_key = cfg.api_key.clone().or_else(|| {
                cfg.api_key_env
                    .as_deref()
                    .or(Some("OPENAI_API_KEY"))
                    .and_then(|var| std::env::var(var).ok())
            });
            let base_url = cfg
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
            Ok(Arc::new(OpenAICompatProvider::new(
                cfg.name.clone(),
                api_key,
                &base_url,
                cfg.max_tokens,
                cfg.temperature,
            )))
        }
        "mock" => Ok(Arc::new(mock::EchoProvider)),
        other => bail!("unknown model provider: {other}"),
    }
}
