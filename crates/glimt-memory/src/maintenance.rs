// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use glimt_config::MemoryConfig;

use crate::SessionStore;

/// Spawn the periodic store maintenance task.
///
/// Every `cleanup_interval_ms`: expire old sessions, prune old screenshots
/// from the active session, and log store statistics.  Failures are logged
/// and never reach the decision loop.
pub fn spawn_maintenance(store: Arc<SessionStore>, cfg: MemoryConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_millis(cfg.cleanup_interval_ms.max(1)));
        // The first tick completes immediately; skip it so startup is quiet.
        interval.tick().await;
        loop {
            interval.tick().await;
            run_once(&store, &cfg);
        }
    })
}

/// One maintenance pass.  Public for tests and for an explicit CLI trigger.
pub(crate) fn run_once(store: &SessionStore, cfg: &MemoryConfig) {
    match store.delete_old_sessions(cfg.session_retention_days) {
        Ok(n) if n > 0 => info!(sessions = n, "maintenance: expired sessions removed"),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "maintenance: session expiry failed"),
    }

    if let Some(key) = store.active_session() {
        match store.cleanup_old_images(&key, cfg.keep_images) {
            Ok(n) if n > 0 => info!(images = n, "maintenance: old screenshots pruned"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "maintenance: image cleanup failed"),
        }
        match store.stats(&key) {
            Ok(stats) => info!(
                messages = stats.message_count,
                tokens = stats.total_tokens,
                images = stats.image_messages,
                "maintenance: session stats"
            ),
            Err(e) => warn!(error = %e, "maintenance: stats failed"),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
