//! Gateway Crate
//!
//! Exchange push-feed connector. Keeps one WebSocket per exchange alive,
//! decodes its frames into [`trading_core::ExchangeMessage`]s and forwards
//! them onto a shared queue.
//!
//! # Architecture
//!
//! ```text
//!        Exchange (WebSocket)                 Exchange (REST)
//!               │                                    │
//!               ▼                                    ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      StreamConnector                         │
//! │  ┌──────────┐   ┌────────────┐   ┌────────────────────────┐  │
//! │  │ WsClient │──▶│ FrameCodec │   │ RestClient             │  │
//! │  └────▲─────┘   └─────┬──────┘   │ (SessionKeyProvider)   │  │
//! │       │ replay        │          └───────────┬────────────┘  │
//! │  ┌────┴─────────┐     │          session key │               │
//! │  │ desired set  │     │     ┌────────────────▼───────────┐   │
//! │  │ + TokenBucket│     │     │ key refresh / idle watchdog│   │
//! │  └──────────────┘     │     └────────────────────────────┘   │
//! └───────────────────────┼──────────────────────────────────────┘
//!                         │ mpsc<ExchangeMessage>
//!                         ▼
//!                  feature pipeline
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export key types
pub use domain::{
    ConnectionState, DecodeError, Decoded, EventParser, FrameContext, SessionKeyError,
    SessionKeyProvider, WsRequest, WsResponse,
};

pub use application::{ConnectorConfig, ConnectorError, StreamConnector, TokenBucket};

pub use infrastructure::{
    FrameCodec, RestClient, RestError, SignError, WsClient, WsError, WsFrame, sign_query,
};

pub use config::{
    ConfigError, ExchangeConfig, GatewayConfigFile, GlobalConfig, load_config,
    load_config_from_str, load_default_config,
};
