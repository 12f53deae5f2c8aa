// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Long-lived session memory.
//!
//! Conversation turns persist across process restarts in a SQLite database
//! under the user's data directory.  Image-bearing turns are pruned beyond a
//! recency window (screenshots dominate storage and token cost), whole
//! sessions expire after a retention period, and a background task performs
//! both cleanups on an interval.

mod maintenance;
mod store;
pub mod transcript;

pub use maintenance::spawn_maintenance;
pub use store::{default_db_path, SessionStats, SessionStore, StoreError, StoredMessage};
