// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The decision contract between the model and the execution core.
//!
//! Each loop iteration the model returns one [`DecisionBundle`]: its analysis
//! of the current screen, a verdict on the previous round, and either a batch
//! of input actions to execute now or a completion summary.  This crate owns
//! the wire types, the JSON schema handed to the provider, the validation
//! rules, and the normalized coordinate space.

mod bundle;
pub mod coords;
mod schema;
mod validate;

pub use bundle::*;
pub use schema::decision_bundle_schema;
pub use validate::{validate_bundle, validate_bundle_value, ValidationError};
