//! In-memory implementation of the state store.
//!
//! Used by the test suite and for ephemeral runs without a database file.
//! A single mutex guards the map, so every `get`/`set` call observes one
//! consistent view.

use super::StateStore;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeds the store, e.g. to simulate a warm start in tests.
    pub fn with_entries(entries: HashMap<String, Value>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let entries = self.entries.lock().unwrap();
        let mut result = HashMap::new();
        for key in keys {
            if let Some(value) = entries.get(*key) {
                result.insert((*key).to_string(), value.clone());
            }
        }
        Ok(result)
    }

    async fn set(&self, new_entries: HashMap<String, Value>) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.extend(new_entries);
        Ok(())
    }
}
