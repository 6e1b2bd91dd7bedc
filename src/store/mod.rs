pub mod memory;
pub mod sqlite;

pub use self::memory::MemoryStore;
pub use self::sqlite::SqliteStore;

use crate::error::EngineError;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

// Persisted snapshot keys. Names match the wire protocol so UI surfaces
// see the same identifiers they persist under.
pub const KEY_ENABLED: &str = "enabled";
pub const KEY_TOTAL_BLOCKED: &str = "totalBlocked";
pub const KEY_SESSION_BLOCKED: &str = "sessionBlocked";
pub const KEY_BLOCKED_BY_DOMAIN: &str = "blockedByDomain";

/// Asynchronous key-value persistence boundary.
///
/// No transactions: callers must not issue conflicting concurrent writes to
/// the same key. Each `get`/`set` call observes or applies one consistent
/// view; absent keys are omitted from the returned map.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>>;
    async fn set(&self, entries: HashMap<String, Value>) -> Result<()>;
}

/// Handle over a [`StateStore`] that bounds every operation with a timeout.
///
/// A hanging backend surfaces as `StoreTimeout` instead of leaving the
/// caller's response channel open forever. All snapshot writes are
/// idempotent at the field level, so retrying after either failure is safe.
#[derive(Clone)]
pub struct Store {
    inner: Arc<dyn StateStore>,
    op_timeout: Duration,
}

impl Store {
    pub fn new(inner: Arc<dyn StateStore>, op_timeout: Duration) -> Self {
        Self { inner, op_timeout }
    }

    pub async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, EngineError> {
        match time::timeout(self.op_timeout, self.inner.get(keys)).await {
            Ok(Ok(values)) => Ok(values),
            Ok(Err(e)) => Err(EngineError::StoreUnavailable(e)),
            Err(_) => Err(EngineError::StoreTimeout(self.op_timeout)),
        }
    }

    pub async fn set(&self, entries: HashMap<String, Value>) -> Result<(), EngineError> {
        match time::timeout(self.op_timeout, self.inner.set(entries)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(EngineError::StoreUnavailable(e)),
            Err(_) => Err(EngineError::StoreTimeout(self.op_timeout)),
        }
    }
}
