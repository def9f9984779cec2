use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use trading_core::{DecimalParseError, ExchangeId, ExchangeMessage, Timestamp};

/// Single malformed frame. Logged and dropped; never affects the connection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("frame carries no event type")]
    MissingEventType,
    #[error("unknown event type: {0}")]
    UnknownEvent(String),
    #[error("{event}: missing or invalid field `{field}`")]
    Field {
        event: &'static str,
        field: &'static str,
    },
    #[error("{event}: bad decimal in `{field}`: {source}")]
    Decimal {
        event: &'static str,
        field: &'static str,
        #[source]
        source: DecimalParseError,
    },
}

/// Failure to obtain or extend a private-channel session key.
///
/// Domain-level view of the REST failure; always retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionKeyError {
    #[error("network error: {0}")]
    Network(String),
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("exchange returned an empty session key")]
    EmptyKey,
}

/// Where and when a frame was received
#[derive(Debug, Clone)]
pub struct FrameContext {
    pub exchange: ExchangeId,
    pub received_at: Timestamp,
}

/// Parser for one family of data events, selected by the `"e"` tag
///
/// Add new event types by registering another parser with the codec.
pub trait EventParser: Send + Sync {
    /// Check if this parser handles the given event type
    fn can_parse(&self, event_type: &str) -> bool;

    /// Parse the event body into zero or more messages
    fn parse(&self, ctx: &FrameContext, data: &Value) -> Result<Vec<ExchangeMessage>, DecodeError>;
}

/// Source of short-lived session keys for private channels
#[async_trait]
pub trait SessionKeyProvider: Send + Sync {
    /// Obtain a key (may return the currently valid one)
    async fn create_session_key(&self) -> Result<String, SessionKeyError>;

    /// Extend the validity of an existing key
    async fn keepalive_session_key(&self, key: &str) -> Result<(), SessionKeyError>;
}
