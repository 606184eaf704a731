//! Per-step local cache.
//!
//! Strictly a resumability hint, subordinate to the server's attempt
//! record: once a server attempt is loaded the cache for that step is
//! cleared and the server row is the only authority. Two string-keyed
//! slots per step hold the answer collection and the gap-answer
//! sub-collection as opaque encoded blobs.
//!
//! The store is injected into the session rather than reached as a global,
//! so tests can substitute an in-memory fake and assert writes and clears.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Cache key for the answer collection of a step.
pub fn answers_key(step_id: i64) -> String {
    format!("quiz_answers_{step_id}")
}

/// Cache key for the gap-answer sub-collection of a step.
pub fn gap_answers_key(step_id: i64) -> String {
    format!("quiz_gap_answers_{step_id}")
}

/// Durable key-value store for per-step quiz state.
///
/// Writes are best-effort: implementations log storage failures instead of
/// propagating them, so a flaky disk never takes the quiz down.
pub trait StepCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory cache for tests and ephemeral sessions.
///
/// Clones share storage, so a test can keep a handle and inspect what the
/// session wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StepCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.slots.lock().expect("cache lock").get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) {
        self.slots
            .lock()
            .expect("cache lock")
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.slots.lock().expect("cache lock").remove(key);
    }
}

/// SQLite-backed cache, one kv table.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, rusqlite::Error> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, rusqlite::Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS quiz_cache (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl StepCache for SqliteCache {
    fn get(&self, key: &str) -> Option<String> {
        let conn = self.conn.lock().expect("cache lock");
        conn.query_row(
            "SELECT value FROM quiz_cache WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .unwrap_or_else(|err| {
            warn!(key, error = %err, "cache read failed");
            None
        })
    }

    fn put(&self, key: &str, value: &str) {
        let conn = self.conn.lock().expect("cache lock");
        if let Err(err) = conn.execute(
            "INSERT OR REPLACE INTO quiz_cache (key, value) VALUES (?1, ?2)",
            params![key, value],
        ) {
            warn!(key, error = %err, "cache write failed");
        }
    }

    fn remove(&self, key: &str) {
        let conn = self.conn.lock().expect("cache lock");
        if let Err(err) = conn.execute("DELETE FROM quiz_cache WHERE key = ?1", params![key]) {
            warn!(key, error = %err, "cache delete failed");
        }
    }
}
