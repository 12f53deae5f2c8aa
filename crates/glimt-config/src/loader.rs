// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context};
use tracing::{debug, warn};

use crate::Config;

/// Ordered list of config file locations searched from lowest to highest priority.
/// Later files override earlier ones; `GLIMT_*` environment variables override
/// every file.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. System-wide default
    paths.push(PathBuf::from("/etc/glimt/config.yaml"));
    paths.push(PathBuf::from("/etc/glimt/config.yml"));

    // 2. XDG / home
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/glimt/config.yaml"));
        paths.push(home.join(".config/glimt/config.yml"));
        paths.push(home.join(".glimt/config.yaml"));
    }

    // 3. Workspace-local
    paths.push(PathBuf::from(".glimt/config.yaml"));
    paths.push(PathBuf::from(".glimt.yaml"));

    paths
}

/// Load configuration: merge the discovered YAML layers, apply environment
/// overrides, and validate the result.
///
/// The `extra` argument may provide an explicit path (e.g. `--config` CLI
/// flag) as the highest-priority file layer.  A config that deserializes but
/// cannot run the loop (zero iterations, out-of-range JPEG quality) is a
/// startup error, not something to limp along with.
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            overlay(&mut merged, read_layer(&path)?);
        }
    }

    if let Some(path) = extra {
        debug!(path = %path.display(), "loading explicit config");
        overlay(&mut merged, read_layer(path)?);
    }

    let mut config: Config = if matches!(merged, serde_yaml::Value::Mapping(ref m) if m.is_empty())
    {
        Config::default()
    } else {
        serde_yaml::from_value(merged).context("config does not match the expected schema")?
    };

    apply_env_overrides(&mut config);
    validate(&config)?;
    Ok(config)
}

fn read_layer(path: &Path) -> anyhow::Result<serde_yaml::Value> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Deep-merge `layer` into `base`.
///
/// Mapping keys recurse; everything else (scalars, sequences, nulls) is
/// replaced wholesale, so a later layer can override a whole list.
fn overlay(base: &mut serde_yaml::Value, layer: serde_yaml::Value) {
    use serde_yaml::mapping::Entry;

    match layer {
        serde_yaml::Value::Mapping(entries) => {
            let serde_yaml::Value::Mapping(target) = base else {
                *base = serde_yaml::Value::Mapping(entries);
                return;
            };
            for (key, value) in entries {
                match target.entry(key) {
                    Entry::Occupied(mut slot) => overlay(slot.get_mut(), value),
                    Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                }
            }
        }
        other => *base = other,
    }
}

/// Environment overrides for the handful of settings people flip per run
/// without touching a config file.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(v) = std::env::var("GLIMT_PROVIDER") {
        config.model.provider = v;
    }
    if let Ok(v) = std::env::var("GLIMT_MODEL") {
        config.model.name = v;
    }
    if let Ok(v) = std::env::var("GLIMT_BASE_URL") {
        config.model.base_url = Some(v);
    }
    if let Ok(v) = std::env::var("GLIMT_SKILLS_DIR") {
        config.skills.dir = Some(PathBuf::from(v));
    }
    if let Ok(v) = std::env::var("GLIMT_DB_PATH") {
        config.memory.db_path = Some(PathBuf::from(v));
    }
    if let Ok(v) = std::env::var("GLIMT_MAX_ITERATIONS") {
        match v.parse() {
            Ok(n) => config.decision_loop.max_iterations = n,
            Err(_) => warn!(value = %v, "ignoring non-numeric GLIMT_MAX_ITERATIONS"),
        }
    }
}

/// Reject configs the loop cannot run with.
fn validate(config: &Config) -> anyhow::Result<()> {
    ensure!(
        config.decision_loop.max_iterations >= 1,
        "loop.max_iterations must be at least 1"
    );
    ensure!(
        config.decision_loop.max_consecutive_failures >= 1,
        "loop.max_consecutive_failures must be at least 1"
    );
    ensure!(
        config.decision_loop.deadline_seconds >= 1,
        "loop.deadline_seconds must be at least 1"
    );
    ensure!(
        (1..=100).contains(&config.screen.jpeg_quality),
        "screen.jpeg_quality must be within 1-100"
    );
    ensure!(
        config.executor.action_timeout_seconds >= 1,
        "executor.action_timeout_seconds must be at least 1"
    );
    ensure!(
        config.memory.token_threshold >= 1,
        "memory.token_threshold must be at least 1"
    );
    ensure!(
        config.memory.keep_images >= 1,
        "memory.keep_images must be at least 1 (the loop needs its last screenshots)"
    );
    Ok(())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    fn val(s: &str) -> serde_yaml::Value {
        serde_yaml::from_str(s).unwrap()
    }

    fn load_literal(yaml: &str) -> anyhow::Result<Config> {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{yaml}").unwrap();
        load(Some(f.path()))
    }

    #[test]
    fn overlay_scalar_layer_wins() {
        let mut base = val("x: 1");
        overlay(&mut base, val("x: 2"));
        assert_eq!(base["x"].as_i64(), Some(2));
    }

    #[test]
    fn overlay_preserves_keys_not_in_layer() {
        let mut base = val("a: 1\nb: 2");
        overlay(&mut base, val("b: 99"));
        assert_eq!(base["a"].as_i64(), Some(1));
        assert_eq!(base["b"].as_i64(), Some(99));
    }

    #[test]
    fn overlay_recurses_into_sections() {
        let mut base = val("loop:\n  max_iterations: 50\n  deadline_seconds: 600");
        overlay(&mut base, val("loop:\n  max_iterations: 10"));
        assert_eq!(base["loop"]["max_iterations"].as_i64(), Some(10));
        assert_eq!(base["loop"]["deadline_seconds"].as_i64(), Some(600));
    }

    #[test]
    fn overlay_replaces_sequences_wholesale() {
        let mut base = val("xs: [1, 2, 3]");
        overlay(&mut base, val("xs: [9]"));
        assert_eq!(base["xs"].as_sequence().unwrap().len(), 1);
    }

    #[test]
    fn load_returns_error_when_explicit_path_missing() {
        let result = load(Some(Path::new("/tmp/glimt_nonexistent_config_xyz.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn load_explicit_file_overrides_defaults() {
        let cfg =
            load_literal("model:\n  provider: mock\n  name: test-model\nloop:\n  max_iterations: 3")
                .unwrap();
        assert_eq!(cfg.model.provider, "mock");
        assert_eq!(cfg.model.name, "test-model");
        assert_eq!(cfg.decision_loop.max_iterations, 3);
    }

    #[test]
    fn zero_iterations_is_a_startup_error() {
        let err = load_literal("loop:\n  max_iterations: 0").unwrap_err();
        assert!(err.to_string().contains("max_iterations"));
    }

    #[test]
    fn out_of_range_jpeg_quality_is_rejected() {
        let err = load_literal("screen:\n  jpeg_quality: 0").unwrap_err();
        assert!(err.to_string().contains("jpeg_quality"));
    }

    #[test]
    fn mistyped_section_is_a_schema_error() {
        let err = load_literal("loop: not-a-mapping").unwrap_err();
        assert!(err.to_string().contains("expected schema"));
    }

    #[test]
    fn env_override_wins_over_files() {
        // GLIMT_SKILLS_DIR is asserted nowhere else, so this cannot race
        // with the other loader tests mutating process env.
        std::env::set_var("GLIMT_SKILLS_DIR", "/tmp/env-skills");
        let cfg = load_literal("skills:\n  dir: /tmp/file-skills").unwrap();
        std::env::remove_var("GLIMT_SKILLS_DIR");
        assert_eq!(
            cfg.skills.dir.as_deref(),
            Some(Path::new("/tmp/env-skills"))
        );
    }
}
