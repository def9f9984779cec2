//! Typed exchange messages
//!
//! Everything the gateway emits is an [`ExchangeMessage`]: a header
//! (exchange, symbol, receive time) plus a closed [`Payload`] union.
//! Consumers match on the payload exhaustively.

use serde::{Deserialize, Serialize};

use super::exchange::ExchangeId;
use super::order::OrderUpdate;
use crate::value_objects::{Price, Quantity, Side, Symbol, Timestamp};

/// Discriminant of [`Payload`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    TopBid,
    TopAsk,
    Bbo,
    Trade,
    OrderUpdate,
    BalanceUpdate,
    PositionUpdate,
}

/// Single price level (price and size at that price)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Price,
    pub size: Quantity,
}

impl PriceLevel {
    pub fn new(price: Price, size: Quantity) -> Self {
        Self { price, size }
    }
}

/// Best bid and offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bbo {
    pub bid: PriceLevel,
    pub ask: PriceLevel,
}

impl Bbo {
    /// Mid price, exact
    pub fn mid(&self) -> Price {
        Price::new((self.bid.price.inner() + self.ask.price.inner()) / rust_decimal::Decimal::TWO)
    }

    pub fn spread(&self) -> Price {
        self.ask.price - self.bid.price
    }
}

/// Public trade print
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Aggressor side
    pub side: Side,
    pub price: Price,
    pub size: Quantity,
    /// Exchange trade time
    pub traded_at: Timestamp,
}

/// Wallet balance change for one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    pub asset: String,
    pub balance: Quantity,
}

/// Position change for one symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub symbol: Symbol,
    /// Signed: negative for short
    pub amount: Quantity,
    pub entry_price: Price,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    TopBid(PriceLevel),
    TopAsk(PriceLevel),
    Bbo(Bbo),
    Trade(Trade),
    OrderUpdate(OrderUpdate),
    BalanceUpdate(BalanceUpdate),
    PositionUpdate(PositionUpdate),
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::TopBid(_) => MessageKind::TopBid,
            Payload::TopAsk(_) => MessageKind::TopAsk,
            Payload::Bbo(_) => MessageKind::Bbo,
            Payload::Trade(_) => MessageKind::Trade,
            Payload::OrderUpdate(_) => MessageKind::OrderUpdate,
            Payload::BalanceUpdate(_) => MessageKind::BalanceUpdate,
            Payload::PositionUpdate(_) => MessageKind::PositionUpdate,
        }
    }
}

/// One decoded exchange event
///
/// `timestamp` is the local receive time, not the exchange event time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeMessage {
    pub exchange: ExchangeId,
    pub symbol: Symbol,
    pub timestamp: Timestamp,
    pub payload: Payload,
}

impl ExchangeMessage {
    pub fn new(
        exchange: ExchangeId,
        symbol: impl Into<Symbol>,
        timestamp: Timestamp,
        payload: Payload,
    ) -> Self {
        Self {
            exchange,
            symbol: symbol.into(),
            timestamp,
            payload,
        }
    }

    #[inline]
    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    /// Split a BBO into `TopAsk` followed by `TopBid` sharing the header.
    /// Any other payload is returned unchanged.
    pub fn split_bbo(self) -> Vec<ExchangeMessage> {
        match self.payload {
            Payload::Bbo(bbo) => {
                let ask = ExchangeMessage {
                    exchange: self.exchange.clone(),
                    symbol: self.symbol.clone(),
                    timestamp: self.timestamp,
                    payload: Payload::TopAsk(bbo.ask),
                };
                let bid = ExchangeMessage {
                    exchange: self.exchange,
                    symbol: self.symbol,
                    timestamp: self.timestamp,
                    payload: Payload::TopBid(bbo.bid),
                };
                vec![ask, bid]
            }
            _ => vec![self],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn level(p: &str, s: &str) -> PriceLevel {
        PriceLevel::new(Price::parse(p).unwrap(), Quantity::parse(s).unwrap())
    }

    fn bbo_message() -> ExchangeMessage {
        ExchangeMessage::new(
            ExchangeId::binance_futures(),
            "BTCUSDT",
            Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
            Payload::Bbo(Bbo {
                bid: level("100.1", "2"),
                ask: level("100.3", "1.5"),
            }),
        )
    }

    #[test]
    fn test_kind_follows_payload() {
        let msg = bbo_message();
        assert_eq!(msg.kind(), MessageKind::Bbo);
        assert_eq!(msg.symbol.as_str(), "btcusdt");
    }

    #[test]
    fn test_bbo_mid_and_spread() {
        let Payload::Bbo(bbo) = bbo_message().payload else {
            panic!("expected bbo");
        };
        assert_eq!(bbo.mid(), Price::parse("100.2").unwrap());
        assert_eq!(bbo.spread().to_string(), "0.2");
    }

    #[test]
    fn test_split_bbo_order() {
        let original = bbo_message();
        let ts = original.timestamp;
        let parts = original.split_bbo();

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].kind(), MessageKind::TopAsk);
        assert_eq!(parts[1].kind(), MessageKind::TopBid);
        assert!(parts.iter().all(|m| m.timestamp == ts));
        assert_eq!(parts[0].payload, Payload::TopAsk(level("100.3", "1.5")));
    }

    #[test]
    fn test_split_leaves_other_kinds_alone() {
        let msg = ExchangeMessage::new(
            ExchangeId::binance(),
            "usdt",
            Utc::now(),
            Payload::BalanceUpdate(BalanceUpdate {
                asset: "USDT".into(),
                balance: Quantity::from_int(10),
            }),
        );
        let parts = msg.clone().split_bbo();
        assert_eq!(parts, vec![msg]);
    }
}
