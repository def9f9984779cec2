use std::time::Duration;
use trading_core::ExchangeId;

/// Runtime settings for one [`StreamConnector`](super::StreamConnector)
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub exchange: ExchangeId,
    /// WebSocket base, e.g. `wss://fstream.binance.com`
    pub ws_url: String,
    /// Stream suffix used for trades (`aggTrade` on futures, `trade` on spot)
    pub trade_stream: String,
    /// Emit `TopAsk` + `TopBid` instead of a single BBO
    pub split_book_ticker: bool,
    /// Pause between a lost connection and the next attempt
    pub retry_delay: Duration,
    /// Silence after which a live connection is presumed dead
    pub idle_timeout: Duration,
    /// Longest a connect + handshake may take before it counts as failed
    pub connect_timeout: Duration,
    pub session_refresh_interval: Duration,
    pub session_retry_delay: Duration,
    /// Outbound control frames allowed per second
    pub control_frames_per_second: u32,
}

impl ConnectorConfig {
    pub fn new(exchange: ExchangeId, ws_url: impl Into<String>) -> Self {
        Self {
            exchange,
            ws_url: ws_url.into(),
            trade_stream: "aggTrade".to_string(),
            split_book_ticker: false,
            retry_delay: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            session_refresh_interval: Duration::from_secs(15 * 60),
            session_retry_delay: Duration::from_secs(1),
            control_frames_per_second: 5,
        }
    }

    /// Socket URL for an optional session key
    pub fn stream_url(&self, session_key: Option<&str>) -> String {
        let base = self.ws_url.trim_end_matches('/');
        let base = base.strip_suffix("/ws").unwrap_or(base);
        match session_key {
            Some(key) => format!("{base}/ws/{key}"),
            None => format!("{base}/ws"),
        }
    }

    pub fn book_ticker_stream(&self, symbol: &str) -> String {
        format!("{}@bookTicker", symbol.to_lowercase())
    }

    pub fn trade_stream(&self, symbol: &str) -> String {
        format!("{}@{}", symbol.to_lowercase(), self.trade_stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ConnectorConfig::new(ExchangeId::binance_futures(), "wss://fstream.binance.com");
        assert_eq!(cfg.retry_delay, Duration::from_secs(1));
        assert_eq!(cfg.idle_timeout, Duration::from_secs(5));
        assert_eq!(cfg.session_refresh_interval, Duration::from_secs(900));
        assert_eq!(cfg.session_retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_stream_url() {
        let cfg = ConnectorConfig::new(ExchangeId::binance_futures(), "wss://fstream.binance.com/");
        assert_eq!(cfg.stream_url(None), "wss://fstream.binance.com/ws");
        assert_eq!(cfg.stream_url(Some("abc")), "wss://fstream.binance.com/ws/abc");

        let cfg = ConnectorConfig::new(ExchangeId::binance(), "wss://stream.binance.com:9443/ws");
        assert_eq!(cfg.stream_url(None), "wss://stream.binance.com:9443/ws");
    }

    #[test]
    fn test_stream_names() {
        let cfg = ConnectorConfig::new(ExchangeId::binance_futures(), "wss://x");
        assert_eq!(cfg.book_ticker_stream("BTCUSDT"), "btcusdt@bookTicker");
        assert_eq!(cfg.trade_stream("ETHUSDT"), "ethusdt@aggTrade");
    }
}
