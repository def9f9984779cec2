//! Exchange Identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value_objects::Symbol;

/// Unique identifier for an exchange venue
///
/// Normalized to lowercase ("Binance" becomes "binance").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExchangeId(String);

impl ExchangeId {
    pub fn new(id: impl AsRef<str>) -> Self {
        ExchangeId(id.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Binance spot
    pub fn binance() -> Self {
        ExchangeId::new("binance")
    }

    /// Binance USD-M futures
    pub fn binance_futures() -> Self {
        ExchangeId::new("binance_futures")
    }

    /// Prefix used for credential environment variables
    /// (`binance_futures` becomes `BINANCE_FUTURES`).
    pub fn env_prefix(&self) -> String {
        self.0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect()
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExchangeId {
    fn from(s: &str) -> Self {
        ExchangeId::new(s)
    }
}

impl From<String> for ExchangeId {
    fn from(s: String) -> Self {
        ExchangeId::new(s)
    }
}

/// A symbol qualified with its exchange, rendered `exchange:symbol`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedSymbol {
    pub exchange: ExchangeId,
    pub symbol: Symbol,
}

impl QualifiedSymbol {
    pub fn new(exchange: impl Into<ExchangeId>, symbol: impl Into<Symbol>) -> Self {
        QualifiedSymbol {
            exchange: exchange.into(),
            symbol: symbol.into(),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let (exchange, symbol) = s.split_once(':')?;
        if exchange.is_empty() || symbol.is_empty() || symbol.contains(':') {
            return None;
        }
        Some(QualifiedSymbol::new(exchange, symbol))
    }
}

impl fmt::Display for QualifiedSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_id_normalization() {
        let id = ExchangeId::new("Binance");
        assert_eq!(id.as_str(), "binance");
        assert_eq!(id, ExchangeId::binance());
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(ExchangeId::binance_futures().env_prefix(), "BINANCE_FUTURES");
        assert_eq!(ExchangeId::new("okx-v5").env_prefix(), "OKX_V5");
    }

    #[test]
    fn test_qualified_symbol() {
        let sym = QualifiedSymbol::new("binance", "BTCUSDT");
        assert_eq!(sym.symbol.as_str(), "btcusdt");
        assert_eq!(sym.to_string(), "binance:btcusdt");
    }

    #[test]
    fn test_qualified_symbol_parse() {
        let sym = QualifiedSymbol::parse("binance_futures:ETHUSDT").unwrap();
        assert_eq!(sym.exchange, ExchangeId::binance_futures());
        assert_eq!(sym.symbol, Symbol::new("ethusdt"));

        assert!(QualifiedSymbol::parse("invalid").is_none());
        assert!(QualifiedSymbol::parse("a:b:c").is_none());
        assert!(QualifiedSymbol::parse(":btcusdt").is_none());
    }
}
