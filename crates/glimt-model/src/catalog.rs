// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Known decision models and their loop-relevant capabilities.
//!
//! The loop needs exactly two facts about a model: whether it accepts the
//! screenshot that rides on every decision turn, and how much context it can
//! hold — which caps the history-compaction budget.  Both come from the
//! bundled `models.yaml`; models absent from it still run, with conservative
//! answers (no vision, no budget cap).

use std::sync::OnceLock;

use serde::Deserialize;
use tracing::warn;

/// One model the loop knows how to reason about.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DecisionModel {
    /// Identifier as configured in `model.name` (e.g. "gpt-4o").
    pub id: String,
    /// Provider identifier: "openai" | "mock".
    pub provider: String,
    /// Total context window in tokens.
    pub context_window: u32,
    /// Whether the model accepts image input.  Screenshots are attached to
    /// every decision turn, so a `false` here means the model cannot drive
    /// the loop.
    #[serde(default)]
    pub vision: bool,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    models: Vec<DecisionModel>,
}

/// All bundled catalog entries.  Parsed once per process.
pub fn known_models() -> &'static [DecisionModel] {
    static CATALOG: OnceLock<Vec<DecisionModel>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        match serde_yaml::from_str::<CatalogFile>(include_str!("../models.yaml")) {
            Ok(file) => file.models,
            Err(e) => {
                warn!(error = %e, "bundled models.yaml is invalid; catalog lookups disabled");
                Vec::new()
            }
        }
    })
}

/// Find a model by provider and configured name.
pub fn find(provider: &str, model: &str) -> Option<&'static DecisionModel> {
    known_models()
        .iter()
        .find(|m| m.provider == provider && m.id == model)
}

/// Whether the model is known to accept the per-turn screenshot.
///
/// Unknown models answer `false`: custom endpoints serve models the catalog
/// has never heard of, so callers treat this as advisory, not a rejection.
pub fn is_vision_capable(provider: &str, model: &str) -> bool {
    find(provider, model).is_some_and(|m| m.vision)
}

/// The token budget at which history compaction should trigger.
///
/// The configured threshold is capped at three quarters of the model's
/// context window: the chars/4 estimate is a lower bound, so compression has
/// to fire well before the window actually fills.  Unknown models keep the
/// configured threshold unchanged.
pub fn compaction_budget(provider: &str, model: &str, configured: usize) -> usize {
    match find(provider, model) {
        Some(entry) => {
            let ceiling = (entry.context_window as usize / 4) * 3;
            configured.min(ceiling)
        }
        None => configured,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_catalog_parses_and_is_nonempty() {
        assert!(!known_models().is_empty());
    }

    #[test]
    fn find_matches_provider_and_id() {
        assert!(find("openai", "gpt-4o").is_some());
        assert!(find("mock", "mock-model").is_some());
        assert!(find("openai", "made-up-model").is_none());
        assert!(find("mock", "gpt-4o").is_none(), "provider must match too");
    }

    #[test]
    fn vision_defaults_to_false_in_the_schema() {
        let entry: DecisionModel =
            serde_yaml::from_str("id: x\nprovider: openai\ncontext_window: 1").unwrap();
        assert!(!entry.vision);
    }

    #[test]
    fn text_only_models_are_not_vision_capable() {
        // deepseek-r1 is bundled without a vision flag.
        assert!(!is_vision_capable("openai", "deepseek-r1"));
        assert!(is_vision_capable("openai", "gpt-4o"));
        assert!(!is_vision_capable("openai", "unknown-model"));
    }

    #[test]
    fn compaction_budget_caps_small_context_models() {
        // qwen2.5-vl has a 32768-token window: 3/4 of it is well below the
        // default 100k threshold.
        assert_eq!(
            compaction_budget("openai", "qwen2.5-vl", 100_000),
            32_768 / 4 * 3
        );
    }

    #[test]
    fn compaction_budget_passes_through_when_window_is_large() {
        // gpt-4.1 holds a million tokens; the configured threshold wins.
        assert_eq!(compaction_budget("openai", "gpt-4.1", 100_000), 100_000);
    }

    #[test]
    fn compaction_budget_unknown_model_keeps_configured_value() {
        assert_eq!(compaction_budget("openai", "mystery", 42_000), 42_000);
    }
}
