//! Infrastructure Layer - adapters to the exchange
//!
//! - FrameCodec: text frames to typed messages
//! - WsClient: WebSocket transport (split writer/reader halves)
//! - RestClient: session-key endpoints over HTTP
//! - signing: HMAC-SHA256 query signing

pub mod parsers;
pub mod rest_client;
pub mod signing;
pub mod ws_client;

pub use parsers::{
    AccountUpdateParser, BookTickerParser, FrameCodec, LISTEN_KEY_EXPIRED, OrderTradeUpdateParser,
    TradeParser,
};
pub use rest_client::{DEFAULT_LISTEN_KEY_PATH, DEFAULT_REQUEST_TIMEOUT, RestClient, RestError};
pub use signing::{SignError, sign_query};
pub use ws_client::{WsClient, WsError, WsFrame, WsReader, WsWriter};
