use super::traits::{MatchedRequest, RuleEngine};
use anyhow::Result;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::info;

/// In-process adapter over the declarative rule engine.
///
/// Tracks which ruleset ids are active and forwards match notifications
/// from the matching plane into the engine's event channel. Cheap to clone;
/// all clones share the same active set and sender.
#[derive(Clone)]
pub struct RulesetRegistry {
    active: Arc<RwLock<HashSet<String>>>,
    match_tx: mpsc::Sender<MatchedRequest>,
}

impl RulesetRegistry {
    /// Creates a registry with the given rulesets already active, returning
    /// the receiving end of the match-notification channel.
    pub fn new(initially_active: &[&str]) -> (Self, mpsc::Receiver<MatchedRequest>) {
        let (match_tx, match_rx) = mpsc::channel(1024);
        let active: HashSet<String> = initially_active.iter().map(|s| s.to_string()).collect();
        (
            Self {
                active: Arc::new(RwLock::new(active)),
                match_tx,
            },
            match_rx,
        )
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.read().unwrap().contains(id)
    }

    /// Entry point for the matching plane: reports one suppressed request.
    /// Fire and forget; a full channel drops the notification rather than
    /// blocking the caller.
    pub fn notify_match(&self, ruleset_id: &str, url: &str) {
        let _ = self.match_tx.try_send(MatchedRequest {
            ruleset_id: ruleset_id.to_string(),
            url: url.to_string(),
        });
    }
}

#[async_trait::async_trait]
impl RuleEngine for RulesetRegistry {
    async fn set_ruleset_active(&self, id: &str, active: bool) -> Result<()> {
        {
            let mut guard = self.active.write().unwrap();
            if active {
                guard.insert(id.to_string());
            } else {
                guard.remove(id);
            }
        }
        info!(
            "Ruleset '{}' {}",
            id,
            if active { "activated" } else { "deactivated" }
        );
        Ok(())
    }
}
