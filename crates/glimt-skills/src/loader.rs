// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::{parse_skill_md, ParsedSkill, SkillRegistry};

/// Recursively collect all parsed skills under `dir`.
///
/// Unparseable SKILL.md files are logged and skipped — one broken skill must
/// not take down the rest of the catalog.  Results are sorted by tool name
/// for deterministic listings.
pub fn scan_dir(dir: &Path) -> Vec<ParsedSkill> {
    let mut found = Vec::new();
    collect(dir, &mut found);
    let mut skills = Vec::with_capacity(found.len());
    for path in found {
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable SKILL.md");
                continue;
            }
        };
        match parse_skill_md(&content) {
            Ok(mut skill) => {
                skill.dir = path.parent().unwrap_or(dir).to_path_buf();
                debug!(skill = %skill.tool_name(), path = %path.display(), "loaded skill");
                skills.push(skill);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping invalid skill"),
        }
    }
    skills.sort_by_key(|s| s.tool_name());
    skills
}

fn collect(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect(&path, out);
        } else if path.file_name().is_some_and(|n| n == "SKILL.md") {
            out.push(path);
        }
    }
}

/// Watches a skills directory and republishes the registry on change.
///
/// The watcher callback runs on notify's own thread; it rescans the whole
/// directory and publishes a fresh immutable list.  Dropping the watcher
/// stops the updates.
pub struct SkillWatcher {
    // Held for its lifetime; dropping it unregisters the OS watches.
    _watcher: notify::RecommendedWatcher,
}

impl SkillWatcher {
    pub fn start(dir: PathBuf, registry: Arc<SkillRegistry>) -> anyhow::Result<Self> {
        registry.publish(scan_dir(&dir));

        let scan_dir_path = dir.clone();
        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                match res {
                    Ok(event) if is_relevant(&event) => {
                        debug!(?event.kind, "skills directory changed; rescanning");
                        registry.publish(scan_dir(&scan_dir_path));
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "skills watcher error"),
                }
            })?;
        watcher.watch(&dir, RecursiveMode::Recursive)?;
        Ok(Self { _watcher: watcher })
    }
}

fn is_relevant(event: &notify::Event) -> bool {
    use notify::EventKind;
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
