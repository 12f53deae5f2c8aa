// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use glimt_decision::{coords, Action, ExecuteNow};
use glimt_input::InputDriver;
use glimt_screen::Capturer;

/// Ceiling for a single `wait` action; the model occasionally asks for
/// absurd pauses and the loop must stay responsive to interrupts.
const MAX_WAIT_MS: u64 = 30_000;

/// Outcome of one executed (or rejected) action.
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub description: String,
    pub success: bool,
    pub message: String,
}

/// Outcome of one batch.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub intent: String,
    pub results: Vec<ActionResult>,
    pub executed: usize,
    pub all_success: bool,
    /// A boundary action ran.  When it was not the last action, the rest of
    /// the batch was discarded and the loop must re-observe.
    pub hit_boundary: bool,
}

/// Expands one decision batch into input-driver primitives.
///
/// Boundary actions (clicks, scrolls, enter) are presumed to change the
/// screen unpredictably: executing one stops the batch unless it is the
/// final action, forcing a fresh observation before further planning.
pub struct LocalExecutor {
    driver: Arc<dyn InputDriver>,
    capturer: Arc<Capturer>,
    interrupt: Arc<AtomicBool>,
}

impl LocalExecutor {
    pub fn new(
        driver: Arc<dyn InputDriver>,
        capturer: Arc<Capturer>,
        interrupt: Arc<AtomicBool>,
    ) -> Self {
        Self {
            driver,
            capturer,
            interrupt,
        }
    }

    /// Execute the batch in order, stopping at a non-final boundary action.
    ///
    /// Per-action validation failures and driver errors are recorded and do
    /// not stop the batch; the model sees the outcomes on the next round.
    /// The interrupt flag is honoured between actions — never mid-event.
    pub async fn execute_batch(&self, batch: &ExecuteNow) -> BatchResult {
        let total = batch.actions.len();
        let mut results: Vec<ActionResult> = Vec::with_capacity(total);
        let mut hit_boundary = false;

        for (i, action) in batch.actions.iter().enumerate() {
            if i > 0 && self.interrupt.load(Ordering::SeqCst) {
                debug!(executed = i, "interrupt observed between actions");
                break;
            }

            let description = action.describe();
            let outcome = self.run_action(action).await;
            match outcome {
                Ok(()) => {
                    results.push(ActionResult {
                        description,
                        success: true,
                        message: String::new(),
                    });
                }
                Err(message) => {
                    warn!(action = %description, error = %message, "action failed");
                    results.push(ActionResult {
                        description,
                        success: false,
                        message,
                    });
                }
            }

            if action.is_boundary() {
                hit_boundary = true;
                if i + 1 < total {
                    debug!(
                        executed = i + 1,
                        remaining = total - i - 1,
                        "boundary action; discarding rest of batch"
                    );
                    break;
                }
            }
        }

        let executed = results.len();
        let all_success = results.iter().all(|r| r.success);
        BatchResult {
            intent: batch.intent.clone(),
            results,
            executed,
            all_success,
            hit_boundary,
        }
    }

    async fn run_action(&self, action: &Action) -> Result<(), String> {
        match action {
            Action::Click { coords: c } => {
                let (px, py) = self.translate(c)?;
                self.driver
                    .click_at(px, py)
                    .await
                    .map_err(|e| e.to_string())?;
                self.capturer.record_click(px, py);
                Ok(())
            }
            Action::DoubleClick { coords: c } => {
                let (px, py) = self.translate(c)?;
                self.driver
                    .double_click_at(px, py)
                    .await
                    .map_err(|e| e.to_string())?;
                self.capturer.record_click(px, py);
                Ok(())
            }
            Action::RightClick { coords: c } => {
                let (px, py) = self.translate(c)?;
                self.driver
                    .right_click_at(px, py)
                    .await
                    .map_err(|e| e.to_string())?;
                self.capturer.record_click(px, py);
                Ok(())
            }
            Action::Type { text } => {
                if text.is_empty() {
                    return Err("type action with empty text".into());
                }
                self.driver.type_text(text).await.map_err(|e| e.to_string())
            }
            Action::Key { key } => self
                .driver
                .press_key(*key)
                .await
                .map_err(|e| e.to_string()),
            Action::Scroll { amount } => {
                if *amount == 0 {
                    return Err("scroll action with zero amount".into());
                }
                self.driver.scroll(*amount).await.map_err(|e| e.to_string())
            }
            Action::Drag {
                coords: from,
                to_coords: to,
            } => {
                let from_px = self.translate(from)?;
                let to_px = self.translate(to)?;
                self.driver
                    .drag(from_px, to_px)
                    .await
                    .map_err(|e| e.to_string())
            }
            Action::Wait { duration } => {
                let ms = (*duration).min(MAX_WAIT_MS);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(())
            }
        }
    }

    fn translate(&self, pair: &[i64; 2]) -> Result<(u32, u32), String> {
        if !coords::in_range(pair[0]) || !coords::in_range(pair[1]) {
            return Err(format!(
                "coordinates ({}, {}) outside [0, 1000]",
                pair[0], pair[1]
            ));
        }
        self.capturer
            .to_physical_safe(pair[0], pair[1])
            .map_err(|e| e.to_string())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
