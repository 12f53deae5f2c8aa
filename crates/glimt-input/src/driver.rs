// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use enigo::{Axis, Button, Coordinate, Direction, Keyboard, Mouse};
use thiserror::Error;
use tracing::debug;

use glimt_decision::KeyCode;

use crate::keys::to_enigo_key;

/// Post-action pauses, in milliseconds.  These absorb the minimum time
/// between injecting an event and the GUI beginning to react.
pub mod pause {
    pub const CLICK_MS: u64 = 300;
    pub const TYPE_MS: u64 = 50;
    pub const KEY_MS: u64 = 100;
    pub const SCROLL_MS: u64 = 200;
    pub const OTHER_MS: u64 = 100;
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("input backend unavailable: {0}")]
    Init(String),
    #[error("input event rejected: {0}")]
    Input(String),
}

/// Primitive OS input operations.  All coordinates are physical pixels.
#[async_trait]
pub trait InputDriver: Send + Sync {
    async fn click_at(&self, px: u32, py: u32) -> Result<(), DriverError>;
    async fn double_click_at(&self, px: u32, py: u32) -> Result<(), DriverError>;
    async fn right_click_at(&self, px: u32, py: u32) -> Result<(), DriverError>;
    async fn type_text(&self, text: &str) -> Result<(), DriverError>;
    async fn press_key(&self, key: KeyCode) -> Result<(), DriverError>;
    /// Positive scrolls down, negative up.
    async fn scroll(&self, amount: i64) -> Result<(), DriverError>;
    async fn drag(&self, from: (u32, u32), to: (u32, u32)) -> Result<(), DriverError>;
}

// ─── Production driver ────────────────────────────────────────────────────────

/// enigo-backed driver for the host desktop.
///
/// enigo's connection is not `Sync`, so it lives behind a mutex shared with
/// the pointer probe.  Every primitive takes the lock only for the duration
/// of the OS calls; the pacing sleep happens outside it.
pub struct EnigoDriver {
    enigo: Arc<Mutex<enigo::Enigo>>,
}

impl EnigoDriver {
    pub fn new() -> Result<Self, DriverError> {
        let enigo = enigo::Enigo::new(&enigo::Settings::default())
            .map_err(|e| DriverError::Init(e.to_string()))?;
        Ok(Self {
            enigo: Arc::new(Mutex::new(enigo)),
        })
    }

    /// A pointer probe sharing this driver's OS connection.
    pub fn pointer_probe(&self) -> EnigoPointer {
        EnigoPointer {
            enigo: Arc::clone(&self.enigo),
        }
    }

    fn with_enigo<T>(
        &self,
        f: impl FnOnce(&mut enigo::Enigo) -> Result<T, enigo::InputError>,
    ) -> Result<T, DriverError> {
        let mut enigo = self.enigo.lock().unwrap();
        f(&mut enigo).map_err(|e| DriverError::Input(e.to_string()))
    }
}

#[async_trait]
impl InputDriver for EnigoDriver {
    async fn click_at(&self, px: u32, py: u32) -> Result<(), DriverError> {
        debug!(px, py, "click");
        self.with_enigo(|e| {
            e.move_mouse(px as i32, py as i32, Coordinate::Abs)?;
            e.button(Button::Left, Direction::Click)
        })?;
        tokio::time::sleep(Duration::from_millis(pause::CLICK_MS)).await;
        Ok(())
    }

    async fn double_click_at(&self, px: u32, py: u32) -> Result<(), DriverError> {
        debug!(px, py, "double-click");
        self.with_enigo(|e| {
            e.move_mouse(px as i32, py as i32, Coordinate::Abs)?;
            e.button(Button::Left, Direction::Click)?;
            e.button(Button::Left, Direction::Click)
        })?;
        tokio::time::sleep(Duration::from_millis(pause::CLICK_MS)).await;
        Ok(())
    }

    async fn right_click_at(&self, px: u32, py: u32) -> Result<(), DriverError> {
        debug!(px, py, "right-click");
        self.with_enigo(|e| {
            e.move_mouse(px as i32, py as i32, Coordinate::Abs)?;
            e.button(Button::Right, Direction::Click)
        })?;
        tokio::time::sleep(Duration::from_millis(pause::OTHER_MS)).await;
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), DriverError> {
        debug!(len = text.len(), "type text");
        self.with_enigo(|e| e.text(text))?;
        tokio::time::sleep(Duration::from_millis(pause::TYPE_MS)).await;
        Ok(())
    }

    async fn press_key(&self, key: KeyCode) -> Result<(), DriverError> {
        debug!(%key, "press key");
        self.with_enigo(|e| e.key(to_enigo_key(key), Direction::Click))?;
        tokio::time::sleep(Duration::from_millis(pause::KEY_MS)).await;
        Ok(())
    }

    async fn scroll(&self, amount: i64) -> Result<(), DriverError> {
        debug!(amount, "scroll");
        let clamped = amount.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        self.with_enigo(|e| e.scroll(clamped, Axis::Vertical))?;
        tokio::time::sleep(Duration::from_millis(pause::SCROLL_MS)).await;
        Ok(())
    }

    async fn drag(&self, from: (u32, u32), to: (u32, u32)) -> Result<(), DriverError> {
        debug!(?from, ?to, "drag");
        self.with_enigo(|e| {
            e.move_mouse(from.0 as i32, from.1 as i32, Coordinate::Abs)?;
            e.button(Button::Left, Direction::Press)?;
            e.move_mouse(to.0 as i32, to.1 as i32, Coordinate::Abs)?;
            e.button(Button::Left, Direction::Release)
        })?;
        tokio::time::sleep(Duration::from_millis(pause::OTHER_MS)).await;
        Ok(())
    }
}

/// Pointer probe backed by the same enigo connection as [`EnigoDriver`].
pub struct EnigoPointer {
    enigo: Arc<Mutex<enigo::Enigo>>,
}

impl glimt_screen::PointerProbe for EnigoPointer {
    fn position(&self) -> Option<(i32, i32)> {
        self.enigo.lock().unwrap().location().ok()
    }
}

// ─── Test double ─────────────────────────────────────────────────────────────

/// Records every primitive call instead of touching the OS.  Public so the
/// executor and loop tests can assert on exact dispatch order without a
/// desktop session.
pub struct RecordingDriver {
    calls: Mutex<Vec<String>>,
    fail_all: bool,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_all: false,
        }
    }

    /// A driver whose every primitive reports failure.
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_all: true,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<(), DriverError> {
        self.calls.lock().unwrap().push(call);
        if self.fail_all {
            Err(DriverError::Input("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

impl Default for RecordingDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputDriver for RecordingDriver {
    async fn click_at(&self, px: u32, py: u32) -> Result<(), DriverError> {
        self.record(format!("click({px}, {py})"))
    }
    async fn double_click_at(&self, px: u32, py: u32) -> Result<(), DriverError> {
        self.record(format!("double_click({px}, {py})"))
    }
    async fn right_click_at(&self, px: u32, py: u32) -> Result<(), DriverError> {
        self.record(format!("right_click({px}, {py})"))
    }
    async fn type_text(&self, text: &str) -> Result<(), DriverError> {
        self.record(format!("type({text})"))
    }
    async fn press_key(&self, key: KeyCode) -> Result<(), DriverError> {
        self.record(format!("key({key})"))
    }
    async fn scroll(&self, amount: i64) -> Result<(), DriverError> {
        self.record(format!("scroll({amount})"))
    }
    async fn drag(&self, from: (u32, u32), to: (u32, u32)) -> Result<(), DriverError> {
        self.record(format!(
            "drag({}, {} -> {}, {})",
            from.0, from.1, to.0, to.1
        ))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
