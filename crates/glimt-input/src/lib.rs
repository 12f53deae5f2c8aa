// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! OS input injection for the executor.
//!
//! All coordinates at this layer are physical pixels — normalization is the
//! executor's job.  Every primitive blocks until the OS has accepted the
//! event, then pauses briefly so the GUI can start reacting before the next
//! event lands.  The pauses are pacing, not perceptual verification; the
//! loop confirms effects on the next screenshot.

mod driver;
mod keys;

pub use driver::{pause, DriverError, EnigoDriver, EnigoPointer, InputDriver, RecordingDriver};
pub use keys::to_enigo_key;
