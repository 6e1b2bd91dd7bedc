//! Request/response protocol between UI surfaces and the engine.
//!
//! Message kinds and field names match what the popup and side panel send
//! over the extension bus. The bus is permissive: a message whose `type` is
//! not recognized gets no response at all, so parsing yields an `Option`
//! rather than an error.

use crate::engine::ModeController;
use crate::error::EngineError;
use crate::stats::{CounterAggregator, StatsSnapshot};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    GetStats,
    ToggleMode,
    ResetStats,
}

impl Request {
    /// Reads the request kind off a raw bus message. `None` means the
    /// message is not for us and must not be answered.
    pub fn parse(message: &Value) -> Option<Self> {
        match message.get("type")?.as_str()? {
            "GET_STATS" => Some(Self::GetStats),
            "TOGGLE_ENABLED" => Some(Self::ToggleMode),
            "RESET_STATS" => Some(Self::ResetStats),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Stats(StatsSnapshot),
    Mode { enabled: bool },
    Ack,
}

impl Response {
    pub fn into_json(self) -> Value {
        match self {
            Self::Stats(snapshot) => serde_json::to_value(snapshot)
                .unwrap_or_else(|_| json!({})),
            Self::Mode { enabled } => json!({ "enabled": enabled }),
            Self::Ack => json!({ "ok": true }),
        }
    }
}

/// Dispatches UI requests into the aggregator and mode controller.
pub struct RequestRouter {
    aggregator: Arc<CounterAggregator>,
    mode: Arc<ModeController>,
}

impl RequestRouter {
    pub fn new(aggregator: Arc<CounterAggregator>, mode: Arc<ModeController>) -> Self {
        Self { aggregator, mode }
    }

    /// Handles one recognized request, responding only once the underlying
    /// store/engine operation has completed.
    pub async fn handle(&self, request: Request) -> Result<Response, EngineError> {
        match request {
            Request::GetStats => Ok(Response::Stats(self.aggregator.get_stats().await?)),
            Request::ToggleMode => {
                let enabled = self.mode.toggle().await?;
                Ok(Response::Mode { enabled })
            }
            Request::ResetStats => {
                self.aggregator.reset().await?;
                Ok(Response::Ack)
            }
        }
    }

    /// Raw bus entry point: `None` when the message kind is unknown and no
    /// response may be sent.
    pub async fn dispatch(&self, message: &Value) -> Option<Result<Response, EngineError>> {
        let request = Request::parse(message)?;
        Some(self.handle(request).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_kinds() {
        assert_eq!(
            Request::parse(&json!({ "type": "GET_STATS" })),
            Some(Request::GetStats)
        );
        assert_eq!(
            Request::parse(&json!({ "type": "TOGGLE_ENABLED" })),
            Some(Request::ToggleMode)
        );
        assert_eq!(
            Request::parse(&json!({ "type": "RESET_STATS" })),
            Some(Request::ResetStats)
        );
    }

    #[test]
    fn test_unknown_kinds_get_no_response() {
        assert_eq!(Request::parse(&json!({ "type": "OPEN_SETTINGS" })), None);
        assert_eq!(Request::parse(&json!({ "kind": "GET_STATS" })), None);
        assert_eq!(Request::parse(&json!({ "type": 42 })), None);
        assert_eq!(Request::parse(&json!("GET_STATS")), None);
    }

    #[test]
    fn test_response_wire_shapes() {
        assert_eq!(
            Response::Mode { enabled: false }.into_json(),
            json!({ "enabled": false })
        );
        assert_eq!(Response::Ack.into_json(), json!({ "ok": true }));
    }
}
