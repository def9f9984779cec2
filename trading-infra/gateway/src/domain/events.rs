use serde::{Deserialize, Serialize};
use serde_json::Value;
use trading_core::ExchangeMessage;

/// Outcome of decoding one inbound text frame
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Market or account data, in emission order
    Messages(Vec<ExchangeMessage>),
    /// Positive response to a control request
    Ack { id: u64, result: Option<Value> },
    /// Error response, optionally correlated with a control request
    Rejected {
        id: Option<u64>,
        code: i64,
        msg: String,
    },
    /// The private-channel session key is no longer valid
    SessionExpired,
}

/// Outbound control frames (`{method, id, params}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "UPPERCASE")]
pub enum WsRequest {
    Subscribe { id: u64, params: Vec<String> },
}

impl WsRequest {
    pub fn subscribe(id: u64, streams: Vec<String>) -> Self {
        WsRequest::Subscribe {
            id,
            params: streams,
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            WsRequest::Subscribe { id, .. } => *id,
        }
    }

    pub fn params(&self) -> &[String] {
        match self {
            WsRequest::Subscribe { params, .. } => params,
        }
    }

    /// Same request under a fresh correlation id
    pub fn with_id(&self, id: u64) -> Self {
        match self {
            WsRequest::Subscribe { params, .. } => WsRequest::subscribe(id, params.clone()),
        }
    }
}

/// Inbound frame envelopes, tried in order.
///
/// `Error` goes first: an error frame also carries an `id` and would
/// otherwise read as a bare `Result`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WsResponse {
    /// Error response
    Error {
        #[serde(default)]
        id: Option<u64>,
        code: i64,
        msg: String,
    },
    /// Response to a control request
    Result { id: u64, result: Option<Value> },
    /// Combined-stream wrapper
    Stream { stream: String, data: Value },
}
