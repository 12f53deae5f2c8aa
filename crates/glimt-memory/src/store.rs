// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("could not open database at '{0}': {1}")]
    Open(String, rusqlite::Error),
    #[error("no such session: {0}")]
    NoSuchSession(String),
}

/// One persisted conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub id: i64,
    pub session_id: i64,
    /// One of "user", "assistant", "system", "tool".
    pub message_type: String,
    pub content: String,
    pub has_image: bool,
    pub token_count: i64,
    /// Unix milliseconds.
    pub created_at: i64,
}

/// Aggregate statistics for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub session_key: String,
    pub message_count: i64,
    pub total_tokens: i64,
    pub image_messages: i64,
    pub created_at: i64,
    pub last_active_at: i64,
}

/// Default database location under the user's home.
pub fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".glimt")
        .join("sessions.db")
}

/// SQLite-backed session store.
///
/// Writes go through a single connection behind a mutex (the per-session
/// write lock); booleans are stored as 0/1 and timestamps as unix
/// milliseconds.  Exactly one session key is active per process — `reset`
/// forks a new one.
pub struct SessionStore {
    conn: Mutex<Connection>,
    active_key: Mutex<Option<String>>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS user_sessions (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    session_key    TEXT NOT NULL UNIQUE,
    created_at     INTEGER NOT NULL,
    updated_at     INTEGER NOT NULL,
    last_active_at INTEGER NOT NULL,
    message_count  INTEGER NOT NULL DEFAULT 0,
    total_tokens   INTEGER NOT NULL DEFAULT 0,
    metadata       TEXT
);
CREATE TABLE IF NOT EXISTS session_messages (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id  INTEGER NOT NULL REFERENCES user_sessions(id) ON DELETE CASCADE,
    message_type TEXT NOT NULL,
    content     TEXT NOT NULL,
    has_image   INTEGER NOT NULL DEFAULT 0,
    token_count INTEGER NOT NULL DEFAULT 0,
    created_at  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_session ON session_messages(session_id);
";

impl SessionStore {
    /// Open (or create) the store at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Open(path.display().to_string(), e))?;
        Self::init(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            active_key: Mutex::new(None),
        })
    }

    /// Create a fresh session and make it the active one.
    pub fn create_session(&self) -> Result<String, StoreError> {
        let key = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp_millis();
        self.conn.lock().unwrap().execute(
            "INSERT INTO user_sessions (session_key, created_at, updated_at, last_active_at)
             VALUES (?1, ?2, ?2, ?2)",
            params![key, now],
        )?;
        *self.active_key.lock().unwrap() = Some(key.clone());
        debug!(session = %key, "created session");
        Ok(key)
    }

    /// The currently active session key, if any.
    pub fn active_session(&self) -> Option<String> {
        self.active_key.lock().unwrap().clone()
    }

    /// Return the active session key, creating a session when none exists.
    pub fn ensure_session(&self) -> Result<String, StoreError> {
        if let Some(key) = self.active_session() {
            return Ok(key);
        }
        self.create_session()
    }

    /// Fork a new active session, leaving the old one in place.
    pub fn reset(&self) -> Result<String, StoreError> {
        self.create_session()
    }

    /// The most recently active session on disk, if any.  Used by CLI
    /// inspection commands that run in a fresh process.
    pub fn latest_session(&self) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT session_key FROM user_sessions ORDER BY last_active_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn session_id(&self, conn: &Connection, key: &str) -> Result<i64, StoreError> {
        conn.query_row(
            "SELECT id FROM user_sessions WHERE session_key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| StoreError::NoSuchSession(key.to_string()))
    }

    /// Append one turn and update the session's rolling counters.
    pub fn save_message(
        &self,
        session_key: &str,
        message_type: &str,
        content: &str,
        has_image: bool,
        token_count: i64,
    ) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        let session_id = self.session_id(&conn, session_key)?;
        let now = Utc::now().timestamp_millis();
        conn.execute(
            "INSERT INTO session_messages
                 (session_id, message_type, content, has_image, token_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session_id,
                message_type,
                content,
                has_image as i64,
                token_count,
                now
            ],
        )?;
        let message_id = conn.last_insert_rowid();
        conn.execute(
            "UPDATE user_sessions
             SET message_count = message_count + 1,
                 total_tokens = total_tokens + ?2,
                 updated_at = ?3,
                 last_active_at = ?3
             WHERE id = ?1",
            params![session_id, token_count, now],
        )?;
        Ok(message_id)
    }

    /// All surviving turns of a session, oldest first.
    pub fn load_messages(&self, session_key: &str) -> Result<Vec<StoredMessage>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let session_id = self.session_id(&conn, session_key)?;
        let mut stmt = conn.prepare(
            "SELECT id, session_id, message_type, content, has_image, token_count, created_at
             FROM session_messages WHERE session_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok(StoredMessage {
                id: row.get(0)?,
                session_id: row.get(1)?,
                message_type: row.get(2)?,
                content: row.get(3)?,
                has_image: row.get::<_, i64>(4)? != 0,
                token_count: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Delete image-bearing turns beyond the most recent `keep_last_n`.
    ///
    /// Text turns are never touched.  Returns the number of deleted rows.
    pub fn cleanup_old_images(
        &self,
        session_key: &str,
        keep_last_n: usize,
    ) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let session_id = self.session_id(&conn, session_key)?;
        let deleted = conn.execute(
            "DELETE FROM session_messages
             WHERE session_id = ?1 AND has_image = 1 AND id NOT IN (
                 SELECT id FROM session_messages
                 WHERE session_id = ?1 AND has_image = 1
                 ORDER BY id DESC LIMIT ?2
             )",
            params![session_id, keep_last_n as i64],
        )?;
        if deleted > 0 {
            debug!(session = %session_key, deleted, "pruned old screenshots");
            conn.execute(
                "UPDATE user_sessions
                 SET message_count = (SELECT COUNT(*) FROM session_messages WHERE session_id = ?1)
                 WHERE id = ?1",
                params![session_id],
            )?;
        }
        Ok(deleted)
    }

    /// Delete sessions inactive for longer than `days`, cascading their
    /// messages.  Returns the number of deleted sessions.
    pub fn delete_old_sessions(&self, days: u32) -> Result<usize, StoreError> {
        let cutoff = Utc::now().timestamp_millis() - i64::from(days) * 24 * 60 * 60 * 1000;
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM user_sessions WHERE last_active_at < ?1",
            params![cutoff],
        )?;
        if deleted > 0 {
            debug!(deleted, days, "removed expired sessions");
        }
        Ok(deleted)
    }

    /// Aggregate statistics for one session.
    pub fn stats(&self, session_key: &str) -> Result<SessionStats, StoreError> {
        let conn = self.conn.lock().unwrap();
        let session_id = self.session_id(&conn, session_key)?;
        let (message_count, total_tokens, created_at, last_active_at): (i64, i64, i64, i64) = conn
            .query_row(
                "SELECT message_count, total_tokens, created_at, last_active_at
                 FROM user_sessions WHERE id = ?1",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
        let image_messages: i64 = conn.query_row(
            "SELECT COUNT(*) FROM session_messages WHERE session_id = ?1 AND has_image = 1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(SessionStats {
            session_key: session_key.to_string(),
            message_count,
            total_tokens,
            image_messages,
            created_at,
            last_active_at,
        })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::open_in_memory().unwrap()
    }

    #[test]
    fn create_session_becomes_active() {
        let s = store();
        assert_eq!(s.active_session(), None);
        let key = s.create_session().unwrap();
        assert_eq!(s.active_session(), Some(key));
    }

    #[test]
    fn ensure_session_reuses_active() {
        let s = store();
        let a = s.ensure_session().unwrap();
        let b = s.ensure_session().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn reset_forks_a_new_session() {
        let s = store();
        let old = s.create_session().unwrap();
        let new = s.reset().unwrap();
        assert_ne!(old, new);
        assert_eq!(s.active_session(), Some(new));
        // Old session still loadable
        assert!(s.load_messages(&old).unwrap().is_empty());
    }

    #[test]
    fn save_and_load_round_trip() {
        let s = store();
        let key = s.create_session().unwrap();
        s.save_message(&key, "user", "look at this", true, 800).unwrap();
        s.save_message(&key, "assistant", "I see a form", false, 12)
            .unwrap();
        let msgs = s.load_messages(&key).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].message_type, "user");
        assert!(msgs[0].has_image);
        assert_eq!(msgs[1].content, "I see a form");
        assert!(!msgs[1].has_image);
    }

    #[test]
    fn save_to_unknown_session_errors() {
        let s = store();
        assert!(matches!(
            s.save_message("nope", "user", "x", false, 1),
            Err(StoreError::NoSuchSession(_))
        ));
    }

    #[test]
    fn counters_accumulate() {
        let s = store();
        let key = s.create_session().unwrap();
        s.save_message(&key, "user", "a", false, 10).unwrap();
        s.save_message(&key, "assistant", "b", false, 5).unwrap();
        let stats = s.stats(&key).unwrap();
        assert_eq!(stats.message_count, 2);
        assert_eq!(stats.total_tokens, 15);
        assert_eq!(stats.image_messages, 0);
    }

    #[test]
    fn cleanup_keeps_newest_images_and_all_text() {
        let s = store();
        let key = s.create_session().unwrap();
        for i in 0..15 {
            s.save_message(&key, "user", &format!("shot {i}"), true, 700)
                .unwrap();
            s.save_message(&key, "assistant", &format!("reply {i}"), false, 5)
                .unwrap();
        }
        let deleted = s.cleanup_old_images(&key, 10).unwrap();
        assert_eq!(deleted, 5);

        let msgs = s.load_messages(&key).unwrap();
        let images: Vec<_> = msgs.iter().filter(|m| m.has_image).collect();
        let texts: Vec<_> = msgs.iter().filter(|m| !m.has_image).collect();
        assert_eq!(images.len(), 10);
        assert_eq!(texts.len(), 15, "no text message may be removed");
        // The survivors are the newest ten
        assert_eq!(images[0].content, "shot 5");
        assert_eq!(images[9].content, "shot 14");
    }

    #[test]
    fn cleanup_under_limit_is_noop() {
        let s = store();
        let key = s.create_session().unwrap();
        s.save_message(&key, "user", "only shot", true, 700).unwrap();
        assert_eq!(s.cleanup_old_images(&key, 10).unwrap(), 0);
        assert_eq!(s.load_messages(&key).unwrap().len(), 1);
    }

    #[test]
    fn delete_old_sessions_cascades_messages() {
        let s = store();
        let key = s.create_session().unwrap();
        s.save_message(&key, "user", "old", false, 1).unwrap();
        // Backdate the session beyond the retention window.
        {
            let conn = s.conn.lock().unwrap();
            conn.execute(
                "UPDATE user_sessions SET last_active_at = 0 WHERE session_key = ?1",
                params![key],
            )
            .unwrap();
        }
        assert_eq!(s.delete_old_sessions(30).unwrap(), 1);
        assert!(matches!(
            s.load_messages(&key),
            Err(StoreError::NoSuchSession(_))
        ));
        // Cascade removed the message rows too.
        let conn = s.conn.lock().unwrap();
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM session_messages", [], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn delete_old_sessions_spares_recent() {
        let s = store();
        let key = s.create_session().unwrap();
        s.save_message(&key, "user", "fresh", false, 1).unwrap();
        assert_eq!(s.delete_old_sessions(30).unwrap(), 0);
        assert_eq!(s.load_messages(&key).unwrap().len(), 1);
    }

    #[test]
    fn latest_session_tracks_activity() {
        let s = store();
        assert_eq!(s.latest_session().unwrap(), None);
        let first = s.create_session().unwrap();
        let second = s.create_session().unwrap();
        // Backdate the second session so the first is unambiguously newest.
        {
            let conn = s.conn.lock().unwrap();
            conn.execute(
                "UPDATE user_sessions SET last_active_at = 1 WHERE session_key = ?1",
                params![second],
            )
            .unwrap();
        }
        assert_eq!(s.latest_session().unwrap(), Some(first));
    }

    #[test]
    fn open_creates_file_and_persists(){
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/dir/sessions.db");
        let key;
        {
            let s = SessionStore::open(&path).unwrap();
            key = s.create_session().unwrap();
            s.save_message(&key, "user", "persisted", false, 4).unwrap();
        }
        let reopened = SessionStore::open(&path).unwrap();
        let msgs = reopened.load_messages(&key).unwrap();
        assert_eq!(msgs[0].content, "persisted");
    }
}
