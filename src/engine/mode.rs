use super::traits::RuleEngine;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::store::{Store, KEY_ENABLED};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

/// Broadcast to page contexts whenever the filter mode flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModeChanged {
    pub enabled: bool,
}

/// Owner of the enabled/disabled flag.
///
/// Toggles are serialized through an internal mutex so two concurrent
/// requests cannot both read the same pre-toggle flag. The persisted flag
/// is the source of truth: it is written first, the change is broadcast,
/// and only then is the rule engine instructed — with retries, and without
/// ever reverting the flag if the engine keeps refusing (the user's intent
/// was already recorded).
pub struct ModeController {
    store: Store,
    rules: Arc<dyn RuleEngine>,
    ruleset_id: String,
    sync_attempts: u32,
    sync_retry_delay: Duration,
    toggle_lock: Mutex<()>,
    changes: broadcast::Sender<ModeChanged>,
}

impl ModeController {
    pub fn new(store: Store, rules: Arc<dyn RuleEngine>, config: &EngineConfig) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            store,
            rules,
            ruleset_id: config.ruleset_id.clone(),
            sync_attempts: config.sync_attempts.max(1),
            sync_retry_delay: Duration::from_millis(config.sync_retry_delay_ms),
            toggle_lock: Mutex::new(()),
            changes,
        }
    }

    /// Current persisted mode. An absent flag reads as enabled, matching the
    /// first-run default.
    pub async fn enabled(&self) -> Result<bool, EngineError> {
        let values = self.store.get(&[KEY_ENABLED]).await?;
        Ok(values
            .get(KEY_ENABLED)
            .and_then(|v| v.as_bool())
            .unwrap_or(true))
    }

    /// Flips the mode and returns the new value.
    pub async fn toggle(&self) -> Result<bool, EngineError> {
        let _guard = self.toggle_lock.lock().await;

        let next = !self.enabled().await?;
        self.store
            .set(HashMap::from([(KEY_ENABLED.to_string(), json!(next))]))
            .await?;
        info!("Filter mode toggled: enabled={}", next);

        // Best-effort fan-out; no subscribers is not an error.
        let _ = self.changes.send(ModeChanged { enabled: next });

        self.sync_ruleset_to(next).await?;
        Ok(next)
    }

    /// Pushes the persisted flag into the rule engine. Called at startup so
    /// a warm start with a disabled filter deactivates a statically-enabled
    /// ruleset.
    pub async fn sync_ruleset(&self) -> Result<(), EngineError> {
        let enabled = self.enabled().await?;
        self.sync_ruleset_to(enabled).await
    }

    /// Subscribes to mode-change broadcasts. Receivers that lag or
    /// disconnect are skipped silently.
    pub fn subscribe(&self) -> broadcast::Receiver<ModeChanged> {
        self.changes.subscribe()
    }

    async fn sync_ruleset_to(&self, active: bool) -> Result<(), EngineError> {
        let mut last_err = None;
        for attempt in 1..=self.sync_attempts {
            match self.rules.set_ruleset_active(&self.ruleset_id, active).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        "Ruleset sync attempt {}/{} failed: {}",
                        attempt, self.sync_attempts, e
                    );
                    last_err = Some(e);
                    if attempt < self.sync_attempts {
                        tokio::time::sleep(self.sync_retry_delay).await;
                    }
                }
            }
        }

        let source = last_err.unwrap_or_else(|| anyhow::anyhow!("ruleset sync failed"));
        error!(
            "Ruleset '{}' out of sync with persisted mode (enabled={}): {}",
            self.ruleset_id, active, source
        );
        Err(EngineError::RuleEngineSync {
            enabled: active,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::RulesetRegistry;
    use crate::store::MemoryStore;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_store() -> Store {
        Store::new(Arc::new(MemoryStore::new()), Duration::from_secs(1))
    }

    struct FailingEngine {
        calls: AtomicU32,
        succeed_after: u32,
    }

    #[async_trait::async_trait]
    impl RuleEngine for FailingEngine {
        async fn set_ruleset_active(&self, _id: &str, _active: bool) -> anyhow::Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.succeed_after {
                Ok(())
            } else {
                Err(anyhow!("engine unavailable"))
            }
        }
    }

    #[tokio::test]
    async fn test_toggle_round_trip() {
        let (registry, _rx) = RulesetRegistry::new(&["ad_rules"]);
        let controller = ModeController::new(
            test_store(),
            Arc::new(registry.clone()),
            &EngineConfig::default(),
        );

        // Absent flag reads as enabled.
        assert!(controller.enabled().await.unwrap());

        assert!(!controller.toggle().await.unwrap());
        assert!(!registry.is_active("ad_rules"));

        assert!(controller.toggle().await.unwrap());
        assert!(registry.is_active("ad_rules"));
    }

    #[tokio::test]
    async fn test_toggle_broadcasts_new_mode() {
        let (registry, _rx) = RulesetRegistry::new(&["ad_rules"]);
        let controller =
            ModeController::new(test_store(), Arc::new(registry), &EngineConfig::default());

        let mut changes = controller.subscribe();
        controller.toggle().await.unwrap();

        assert_eq!(
            changes.recv().await.unwrap(),
            ModeChanged { enabled: false }
        );
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_is_not_an_error() {
        let (registry, _rx) = RulesetRegistry::new(&["ad_rules"]);
        let controller =
            ModeController::new(test_store(), Arc::new(registry), &EngineConfig::default());

        assert!(!controller.toggle().await.unwrap());
    }

    #[tokio::test]
    async fn test_sync_retries_until_success() {
        let engine = Arc::new(FailingEngine {
            calls: AtomicU32::new(0),
            succeed_after: 2,
        });
        let config = EngineConfig {
            sync_retry_delay_ms: 1,
            ..EngineConfig::default()
        };
        let controller = ModeController::new(test_store(), engine.clone(), &config);

        assert!(!controller.toggle().await.unwrap());
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_sync_keeps_persisted_flag() {
        let engine = Arc::new(FailingEngine {
            calls: AtomicU32::new(0),
            succeed_after: u32::MAX,
        });
        let config = EngineConfig {
            sync_attempts: 2,
            sync_retry_delay_ms: 1,
            ..EngineConfig::default()
        };
        let controller = ModeController::new(test_store(), engine, &config);

        let err = controller.toggle().await.unwrap_err();
        match err {
            EngineError::RuleEngineSync { enabled, .. } => assert!(!enabled),
            other => panic!("unexpected error: {other}"),
        }
        // Intent was recorded despite the sync failure.
        assert!(!controller.enabled().await.unwrap());
    }
}
