use serde::{Deserialize, Serialize};
use std::time::Duration;
use trading_core::ExchangeId;

use crate::application::ConnectorConfig;
use crate::infrastructure::{DEFAULT_LISTEN_KEY_PATH, RestClient, RestError};

/// Root configuration for the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfigFile {
    pub exchanges: Vec<ExchangeConfig>,
    #[serde(default)]
    pub global: GlobalConfig,
}

/// Configuration for a single exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Unique identifier for the exchange (e.g., "binance_futures")
    pub id: String,
    /// Display name
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// REST API base URL
    pub rest_url: String,
    /// WebSocket base URL
    pub ws_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    /// User-data stream endpoint
    #[serde(default = "default_listen_key_path")]
    pub listen_key_path: String,
    /// Open the socket on a session key (private order/account events)
    #[serde(default)]
    pub private_channels: bool,
    /// Emit book tickers as separate TopAsk/TopBid messages
    #[serde(default)]
    pub split_book_ticker: bool,
    #[serde(default = "default_trade_stream")]
    pub trade_stream: String,
}

impl ExchangeConfig {
    pub fn exchange_id(&self) -> ExchangeId {
        ExchangeId::new(&self.id)
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }

    /// Replace credentials from `<ID>_API_KEY` / `<ID>_API_SECRET` when set
    pub fn apply_env_overrides(&mut self) {
        let prefix = self.exchange_id().env_prefix();
        if let Ok(key) = std::env::var(format!("{prefix}_API_KEY")) {
            self.api_key = key;
        }
        if let Ok(secret) = std::env::var(format!("{prefix}_API_SECRET")) {
            self.api_secret = secret;
        }
    }

    /// Convert to the application-layer connector config
    pub fn connector_config(&self, global: &GlobalConfig) -> ConnectorConfig {
        ConnectorConfig {
            exchange: self.exchange_id(),
            ws_url: self.ws_url.clone(),
            trade_stream: self.trade_stream.clone(),
            split_book_ticker: self.split_book_ticker,
            retry_delay: global.retry_delay(),
            idle_timeout: global.idle_timeout(),
            connect_timeout: global.connect_timeout(),
            session_refresh_interval: global.session_refresh_interval(),
            session_retry_delay: global.session_retry_delay(),
            control_frames_per_second: global.control_frames_per_second,
        }
    }

    pub fn rest_client(&self, global: &GlobalConfig) -> Result<RestClient, RestError> {
        Ok(RestClient::with_timeout(
            &self.rest_url,
            &self.api_key,
            &self.api_secret,
            global.request_timeout(),
        )?
        .with_listen_key_path(&self.listen_key_path))
    }
}

/// Settings shared by all exchanges
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Delay between reconnection attempts in milliseconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Silence on a live socket before a forced reconnect
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_ms: u64,
    /// Deadline for TCP connect + TLS + WebSocket upgrade
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Deadline for each REST call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_session_refresh_interval")]
    pub session_refresh_interval_ms: u64,
    #[serde(default = "default_session_retry_delay")]
    pub session_retry_delay_ms: u64,
    /// Capacity of the shared message queue
    #[serde(default = "default_output_queue_capacity")]
    pub output_queue_capacity: usize,
    #[serde(default = "default_control_frames_per_second")]
    pub control_frames_per_second: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        GlobalConfig {
            retry_delay_ms: default_retry_delay(),
            idle_timeout_ms: default_idle_timeout(),
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
            session_refresh_interval_ms: default_session_refresh_interval(),
            session_retry_delay_ms: default_session_retry_delay(),
            output_queue_capacity: default_output_queue_capacity(),
            control_frames_per_second: default_control_frames_per_second(),
        }
    }
}

impl GlobalConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn session_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.session_refresh_interval_ms)
    }

    pub fn session_retry_delay(&self) -> Duration {
        Duration::from_millis(self.session_retry_delay_ms)
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_listen_key_path() -> String {
    DEFAULT_LISTEN_KEY_PATH.to_string()
}

fn default_trade_stream() -> String {
    "aggTrade".to_string()
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_idle_timeout() -> u64 {
    5000
}

fn default_connect_timeout() -> u64 {
    10_000
}

fn default_request_timeout() -> u64 {
    10_000
}

fn default_session_refresh_interval() -> u64 {
    15 * 60 * 1000
}

fn default_session_retry_delay() -> u64 {
    1000
}

fn default_output_queue_capacity() -> usize {
    1024
}

fn default_control_frames_per_second() -> u32 {
    5
}
