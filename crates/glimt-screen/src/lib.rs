// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Screen capture for the decision loop.
//!
//! Each observation grabs the primary display, overlays the current pointer
//! position (red cross, annotated with its normalized coordinate) and the
//! most recent click (green ring), and encodes the result as base64 JPEG for
//! the multimodal model.  The capturer also owns the normalized→physical
//! coordinate mapping used by the executor.

mod capture;
mod error;
pub mod overlay;

pub use capture::{
    CaptureMeta, Capturer, DisplayGrabber, FailingSource, FixedPointer, Frame, PointerProbe,
    ScreenSource, Screenshot, StaticFrameSource,
};
pub use error::ScreenError;
