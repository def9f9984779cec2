use std::path::Path;
use thiserror::Error;

use super::types::{ExchangeConfig, GatewayConfigFile};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("No enabled exchanges in config")]
    NoEnabledExchanges,
    #[error("Exchange not found: {0}")]
    ExchangeNotFound(String),
    #[error("Invalid URL for {exchange}: {url} ({reason})")]
    InvalidUrl {
        exchange: String,
        url: String,
        reason: String,
    },
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("Exchange {0} needs api_key and api_secret for private channels")]
    MissingCredentials(String),
}

/// Load gateway configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<GatewayConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Load configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<GatewayConfigFile, ConfigError> {
    let config: GatewayConfigFile = serde_json::from_str(json)?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> Result<GatewayConfigFile, ConfigError> {
    let default_config = include_str!("gateway_config.json");
    load_config_from_str(default_config)
}

impl GatewayConfigFile {
    /// Get only enabled exchanges
    pub fn enabled_exchanges(&self) -> Vec<&ExchangeConfig> {
        self.exchanges.iter().filter(|e| e.enabled).collect()
    }

    /// Get a specific exchange by ID
    pub fn get_exchange(&self, id: &str) -> Option<&ExchangeConfig> {
        self.exchanges.iter().find(|e| e.id == id)
    }

    pub fn require_exchange(&self, id: &str) -> Result<&ExchangeConfig, ConfigError> {
        self.get_exchange(id)
            .ok_or_else(|| ConfigError::ExchangeNotFound(id.to_string()))
    }

    /// Pull credentials from the environment for every exchange
    pub fn apply_env_overrides(&mut self) {
        for exchange in &mut self.exchanges {
            exchange.apply_env_overrides();
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let enabled = self.enabled_exchanges();
        if enabled.is_empty() {
            return Err(ConfigError::NoEnabledExchanges);
        }
        for exchange in enabled {
            check_url(exchange, &exchange.rest_url, &["http", "https"])?;
            check_url(exchange, &exchange.ws_url, &["ws", "wss"])?;
            if exchange.private_channels && !exchange.has_credentials() {
                return Err(ConfigError::MissingCredentials(exchange.id.clone()));
            }
        }
        if self.global.output_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "output_queue_capacity",
                reason: "must be at least 1".into(),
            });
        }
        for (field, value) in [
            ("idle_timeout_ms", self.global.idle_timeout_ms),
            ("connect_timeout_ms", self.global.connect_timeout_ms),
            ("request_timeout_ms", self.global.request_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be positive".into(),
                });
            }
        }
        Ok(())
    }
}

fn check_url(exchange: &ExchangeConfig, raw: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        exchange: exchange.id.clone(),
        url: raw.to_string(),
        reason,
    };
    let url = url::Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !schemes.contains(&url.scheme()) {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    Ok(())
}
