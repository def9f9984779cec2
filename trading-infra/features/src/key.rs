use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use trading_core::{ExchangeMessage, Payload, Side, Statistic, Symbol};

/// Observable quantity extracted from market messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    BidPrice,
    BidSize,
    AskPrice,
    AskSize,
    BuyVolume,
    SellVolume,
    BuyPrice,
    SellPrice,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::BidPrice,
        Field::BidSize,
        Field::AskPrice,
        Field::AskSize,
        Field::BuyVolume,
        Field::SellVolume,
        Field::BuyPrice,
        Field::SellPrice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::BidPrice => "bid_price",
            Field::BidSize => "bid_size",
            Field::AskPrice => "ask_price",
            Field::AskSize => "ask_size",
            Field::BuyVolume => "buy_volume",
            Field::SellVolume => "sell_volume",
            Field::BuyPrice => "buy_price",
            Field::SellPrice => "sell_price",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown field: {s}"))
    }
}

/// Field observations carried by one message
///
/// Book updates feed the bid/ask fields, trades feed the buy or sell
/// fields of their aggressor side. Everything else carries none.
pub fn observations(message: &ExchangeMessage) -> Vec<(Field, f64)> {
    match &message.payload {
        Payload::Bbo(bbo) => vec![
            (Field::AskPrice, bbo.ask.price.to_f64()),
            (Field::BidPrice, bbo.bid.price.to_f64()),
            (Field::AskSize, bbo.ask.size.to_f64()),
            (Field::BidSize, bbo.bid.size.to_f64()),
        ],
        Payload::TopBid(level) => vec![
            (Field::BidPrice, level.price.to_f64()),
            (Field::BidSize, level.size.to_f64()),
        ],
        Payload::TopAsk(level) => vec![
            (Field::AskPrice, level.price.to_f64()),
            (Field::AskSize, level.size.to_f64()),
        ],
        Payload::Trade(trade) => match trade.side {
            Side::Buy => vec![
                (Field::BuyVolume, trade.size.to_f64()),
                (Field::BuyPrice, trade.price.to_f64()),
            ],
            Side::Sell => vec![
                (Field::SellVolume, trade.size.to_f64()),
                (Field::SellPrice, trade.price.to_f64()),
            ],
        },
        Payload::OrderUpdate(_) | Payload::BalanceUpdate(_) | Payload::PositionUpdate(_) => {
            Vec::new()
        }
    }
}

/// Name of one feature column: `{symbol}-{field}-{statistic}-{tier}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureKey {
    pub symbol: Symbol,
    pub field: Field,
    pub statistic: Statistic,
    pub tier: String,
}

impl FeatureKey {
    pub fn new(symbol: Symbol, field: Field, statistic: Statistic, tier: impl Into<String>) -> Self {
        Self {
            symbol,
            field,
            statistic,
            tier: tier.into(),
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", self.symbol, self.field, self.statistic, self.tier)
    }
}

/// Column order of the feature vector
///
/// Built once from `(key, cell)` pairs and sorted by the rendered key, so
/// a given configuration always yields the same positions.
#[derive(Debug, Clone)]
pub struct Layout<T> {
    names: Vec<String>,
    cells: Vec<T>,
}

impl<T> Layout<T> {
    pub fn new(entries: impl IntoIterator<Item = (FeatureKey, T)>) -> Self {
        let mut rendered: Vec<(String, T)> = entries
            .into_iter()
            .map(|(key, cell)| (key.to_string(), cell))
            .collect();
        rendered.sort_by(|a, b| a.0.cmp(&b.0));
        let (names, cells) = rendered.into_iter().unzip();
        Self { names, cells }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.binary_search_by(|n| n.as_str().cmp(name)).ok()
    }
}
