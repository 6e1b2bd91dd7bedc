use crate::error::EngineError;
use crate::store::{
    Store, KEY_BLOCKED_BY_DOMAIN, KEY_ENABLED, KEY_SESSION_BLOCKED, KEY_TOTAL_BLOCKED,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

/// Bucket for block events whose URL has no parseable authority.
pub const UNKNOWN_DOMAIN: &str = "unknown";

/// One suppressed network request, as consumed by the aggregator.
#[derive(Debug, Clone)]
pub struct BlockEvent {
    pub url: String,
}

/// Full projection of the persisted snapshot, as served to UI surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub enabled: bool,
    pub total_blocked: u64,
    pub session_blocked: u64,
    pub blocked_by_domain: HashMap<String, u64>,
}

impl StatsSnapshot {
    /// Builds a snapshot from raw store values, defaulting absent or
    /// ill-typed fields the way a fresh install looks.
    fn from_values(values: &HashMap<String, Value>) -> Self {
        Self {
            enabled: values
                .get(KEY_ENABLED)
                .and_then(Value::as_bool)
                .unwrap_or(true),
            total_blocked: values
                .get(KEY_TOTAL_BLOCKED)
                .and_then(Value::as_u64)
                .unwrap_or(0),
            session_blocked: values
                .get(KEY_SESSION_BLOCKED)
                .and_then(Value::as_u64)
                .unwrap_or(0),
            blocked_by_domain: values
                .get(KEY_BLOCKED_BY_DOMAIN)
                .map(domain_counts_from_value)
                .unwrap_or_default(),
        }
    }
}

fn domain_counts_from_value(value: &Value) -> HashMap<String, u64> {
    value
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(domain, count)| Some((domain.clone(), count.as_u64()?)))
                .collect()
        })
        .unwrap_or_default()
}

/// Extracts the counting bucket for a blocked URL.
fn domain_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_DOMAIN.to_string())
}

/// Turns the stream of block events into durable counters.
///
/// Every mutation is a read-modify-write against the store, so all of them
/// pass through one mutex: two events arriving together apply cumulatively
/// instead of the second overwriting the first's increment, and a reset
/// cannot interleave with a half-applied increment.
pub struct CounterAggregator {
    store: Store,
    mutation_lock: Mutex<()>,
}

impl CounterAggregator {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            mutation_lock: Mutex::new(()),
        }
    }

    /// Counts one suppressed request against the lifetime, session, and
    /// per-domain counters. A URL that fails to parse lands in the
    /// `"unknown"` bucket; it never aborts the increment.
    pub async fn record_block(&self, event: BlockEvent) -> Result<(), EngineError> {
        let domain = domain_of(&event.url);

        let _guard = self.mutation_lock.lock().await;
        let values = self
            .store
            .get(&[KEY_TOTAL_BLOCKED, KEY_SESSION_BLOCKED, KEY_BLOCKED_BY_DOMAIN])
            .await?;

        let total = values
            .get(KEY_TOTAL_BLOCKED)
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let session = values
            .get(KEY_SESSION_BLOCKED)
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let mut by_domain = values
            .get(KEY_BLOCKED_BY_DOMAIN)
            .map(domain_counts_from_value)
            .unwrap_or_default();
        *by_domain.entry(domain.clone()).or_insert(0) += 1;

        self.store
            .set(HashMap::from([
                (KEY_TOTAL_BLOCKED.to_string(), json!(total + 1)),
                (KEY_SESSION_BLOCKED.to_string(), json!(session + 1)),
                (KEY_BLOCKED_BY_DOMAIN.to_string(), json!(by_domain)),
            ]))
            .await?;

        debug!("Blocked request counted for domain '{}'", domain);
        Ok(())
    }

    /// Serves the full snapshot. Reads all fields in one store call, so it
    /// never observes half of an in-flight increment and never waits on the
    /// mutation lock.
    pub async fn get_stats(&self) -> Result<StatsSnapshot, EngineError> {
        let values = self
            .store
            .get(&[
                KEY_ENABLED,
                KEY_TOTAL_BLOCKED,
                KEY_SESSION_BLOCKED,
                KEY_BLOCKED_BY_DOMAIN,
            ])
            .await?;
        Ok(StatsSnapshot::from_values(&values))
    }

    /// Zeroes all counters, leaving the mode flag untouched. Ordered against
    /// in-flight `record_block` calls by the mutation lock.
    pub async fn reset(&self) -> Result<(), EngineError> {
        let _guard = self.mutation_lock.lock().await;
        self.store
            .set(HashMap::from([
                (KEY_TOTAL_BLOCKED.to_string(), json!(0)),
                (KEY_SESSION_BLOCKED.to_string(), json!(0)),
                (KEY_BLOCKED_BY_DOMAIN.to_string(), json!({})),
            ]))
            .await?;
        Ok(())
    }
}
