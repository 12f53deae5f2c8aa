// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Serde default helper — returns `true`.
///
/// `#[serde(default)]` on a `bool` always falls back to `bool::default()`
/// (i.e. `false`), so fields that should be on by default need a named
/// function.
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(rename = "loop", default)]
    pub decision_loop: LoopConfig,
    #[serde(default)]
    pub skills: SkillsConfig,
    #[serde(default)]
    pub screen: ScreenConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider identifier: "openai" for any OpenAI-compatible endpoint,
    /// or "mock" for the scripted in-process provider.
    pub provider: String,
    /// Model name forwarded to the provider API. Must be a vision-capable
    /// model — every decision turn carries a screenshot.
    pub name: String,
    /// Environment variable that holds the API key (read at runtime)
    pub api_key_env: Option<String>,
    /// Explicit API key; prefer api_key_env in config files to avoid secrets
    /// in version-controlled files
    pub api_key: Option<String>,
    /// Base URL override. Useful for local proxies or OpenAI-compatible
    /// gateways.
    pub base_url: Option<String>,
    /// Maximum tokens to request in a single completion
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0–2.0)
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            name: "gpt-4o".into(),
            api_key_env: None,
            api_key: None,
            base_url: None,
            max_tokens: Some(4096),
            temperature: Some(0.2),
        }
    }
}

fn default_keep_images() -> usize {
    10
}
fn default_token_threshold() -> usize {
    100_000
}
fn default_keep_recent_messages() -> usize {
    10
}
fn default_retention_days() -> u32 {
    30
}
fn default_cleanup_interval_ms() -> u64 {
    3_600_000
}

/// Session-memory settings: persistence, image pruning, and history
/// compaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Image-bearing messages kept per session; older ones are pruned.
    #[serde(default = "default_keep_images")]
    pub keep_images: usize,
    /// Estimated token count above which history compression triggers.
    #[serde(default = "default_token_threshold")]
    pub token_threshold: usize,
    /// Messages preserved verbatim at the tail during compression.
    #[serde(default = "default_keep_recent_messages")]
    pub keep_recent_messages: usize,
    /// Sessions inactive longer than this are deleted by maintenance.
    #[serde(default = "default_retention_days")]
    pub session_retention_days: u32,
    /// Interval between maintenance passes.
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
    /// Database file location. Defaults to `~/.glimt/sessions.db`.
    pub db_path: Option<PathBuf>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            keep_images: default_keep_images(),
            token_threshold: default_token_threshold(),
            keep_recent_messages: default_keep_recent_messages(),
            session_retention_days: default_retention_days(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
            db_path: None,
        }
    }
}

fn default_max_corrections() -> u32 {
    5
}
fn default_action_timeout_seconds() -> u64 {
    30
}
fn default_tool_wait_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Correction attempts the model is granted for one failing step before
    /// the round is marked failed.
    #[serde(default = "default_max_corrections")]
    pub max_corrections: u32,
    /// Hard timeout for a single built-in tool invocation.
    #[serde(default = "default_action_timeout_seconds")]
    pub action_timeout_seconds: u64,
    /// Pause after a tool invocation before the next observation.
    #[serde(default = "default_tool_wait_ms")]
    pub tool_wait_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_corrections: default_max_corrections(),
            action_timeout_seconds: default_action_timeout_seconds(),
            tool_wait_ms: default_tool_wait_ms(),
        }
    }
}

fn default_max_iterations() -> u32 {
    50
}
fn default_max_consecutive_failures() -> u32 {
    5
}
fn default_deadline_seconds() -> u64 {
    600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Maximum decision rounds for one goal.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Consecutive failed rounds before the goal is abandoned.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    /// Wall-clock budget for one goal.
    #[serde(default = "default_deadline_seconds")]
    pub deadline_seconds: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_consecutive_failures: default_max_consecutive_failures(),
            deadline_seconds: default_deadline_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillsConfig {
    /// Directory scanned for SKILL.md packages.
    /// Defaults to `~/.glimt/skills`.
    pub dir: Option<PathBuf>,
    /// Re-scan the directory when files change.
    #[serde(default = "default_true")]
    pub watch: bool,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            watch: true,
        }
    }
}

fn default_jpeg_quality() -> u8 {
    80
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenConfig {
    /// JPEG quality for encoded frames (1–100).
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
