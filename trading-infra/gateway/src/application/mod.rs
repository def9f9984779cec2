pub mod config;
pub mod rate_limiter;
pub mod stream_connector;

pub use config::ConnectorConfig;
pub use rate_limiter::TokenBucket;
pub use stream_connector::{ConnectorError, StreamConnector};
