//! SQLite-backed implementation of the state store.
//!
//! The snapshot lives in a single `kv` table with JSON-encoded values. The
//! connection sits behind a mutex; WAL mode and a busy timeout keep the
//! occasional concurrent opener (e.g. an inspection tool) from failing
//! writes outright.

use super::StateStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(&db_path).context("Failed to open state database")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        info!(
            "State database initialized at {}",
            db_path.as_ref().display()
        );
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached("SELECT value FROM kv WHERE key = ?1")?;

        let mut result = HashMap::new();
        for key in keys {
            let row: Option<String> = stmt
                .query_row(params![key], |r| r.get(0))
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            if let Some(raw) = row {
                let value: Value = serde_json::from_str(&raw)
                    .with_context(|| format!("Corrupt JSON value for key '{key}'"))?;
                result.insert((*key).to_string(), value);
            }
        }
        Ok(result)
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )?;
            for (key, value) in &entries {
                stmt.execute(params![key, serde_json::to_string(value)?])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
