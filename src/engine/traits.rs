use anyhow::Result;

/// Notification that the rule engine suppressed one network request.
#[derive(Debug, Clone)]
pub struct MatchedRequest {
    /// Which ruleset produced the match. Only matches from the configured
    /// ruleset are counted.
    pub ruleset_id: String,
    pub url: String,
}

/// The "Control Plane" of the external declarative rule engine.
///
/// The engine itself (rule matching, request suppression) is an external
/// collaborator; the coordination core only flips rulesets on and off and
/// receives match notifications over a channel.
#[async_trait::async_trait]
pub trait RuleEngine: Send + Sync {
    /// Activates or deactivates a ruleset.
    async fn set_ruleset_active(&self, id: &str, active: bool) -> Result<()>;
}
