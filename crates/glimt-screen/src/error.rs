// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScreenError {
    /// The display could not be grabbed.  The decision loop treats this as
    /// recoverable: the failure counter is incremented and the next
    /// iteration retries.
    #[error("screen unavailable: {0}")]
    UnavailableScreen(String),

    #[error("could not encode frame: {0}")]
    Encode(String),
}
