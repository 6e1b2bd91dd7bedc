//! Initialization helpers for the application startup.

use crate::config::Config;
use crate::error::EngineError;
use crate::store::{
    Store, KEY_BLOCKED_BY_DOMAIN, KEY_ENABLED, KEY_SESSION_BLOCKED, KEY_TOTAL_BLOCKED,
};
use serde_json::json;
use std::collections::HashMap;
use tracing::info;

/// Sets up the tracing subscriber with the configured filters.
pub fn setup_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone()));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Establishes the persisted snapshot for this process run.
///
/// First run (no `enabled` flag in the store): seeds the full default
/// snapshot. Warm start: zeroes the session counter only, leaving the
/// lifetime counters and the mode flag alone. Exactly one write either way.
///
/// Returns `true` on a first run so the caller can greet the user. Fails
/// with `StoreUnavailable` if the store cannot be reached; the engine must
/// not serve requests in that case.
pub async fn on_start(store: &Store) -> Result<bool, EngineError> {
    let existing = store.get(&[KEY_ENABLED]).await?;

    if existing.contains_key(KEY_ENABLED) {
        store
            .set(HashMap::from([(KEY_SESSION_BLOCKED.to_string(), json!(0))]))
            .await?;
        info!("Warm start: session counter reset");
        Ok(false)
    } else {
        store
            .set(HashMap::from([
                (KEY_ENABLED.to_string(), json!(true)),
                (KEY_TOTAL_BLOCKED.to_string(), json!(0)),
                (KEY_SESSION_BLOCKED.to_string(), json!(0)),
                (KEY_BLOCKED_BY_DOMAIN.to_string(), json!({})),
            ]))
            .await?;
        info!("First run: default snapshot initialized");
        Ok(true)
    }
}
