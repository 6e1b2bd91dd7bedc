use std::time::Duration;
use thiserror::Error;

/// Failures the coordination engine reports to its callers.
///
/// Unparseable block-event URLs and unknown request kinds are deliberately
/// not represented here: the former degrade to the `"unknown"` domain
/// bucket, the latter are ignored without a response.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The state store could not be reached. Fatal at startup; the engine
    /// must not serve requests until a retry succeeds.
    #[error("state store unavailable: {0}")]
    StoreUnavailable(#[source] anyhow::Error),

    /// A single store read/write exceeded the configured bound.
    #[error("state store operation timed out after {0:?}")]
    StoreTimeout(Duration),

    /// The ruleset activation instruction kept failing after the mode flag
    /// was already persisted. The persisted flag is not reverted; `enabled`
    /// carries the recorded intent.
    #[error("failed to sync ruleset after mode change (enabled={enabled}): {source}")]
    RuleEngineSync {
        enabled: bool,
        #[source]
        source: anyhow::Error,
    },
}
