use serde::{Deserialize, Serialize};
use std::fmt;

/// Order or aggressor side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Parse the exchange spelling ("BUY" / "SELL", any case)
    pub fn from_exchange(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("buy") {
            Some(Side::Buy)
        } else if s.eq_ignore_ascii_case("sell") {
            Some(Side::Sell)
        } else {
            None
        }
    }

    /// Aggressor side of a trade given the buyer-is-maker flag.
    /// A passive buyer means the seller crossed the spread.
    #[inline]
    pub fn aggressor(buyer_is_maker: bool) -> Self {
        if buyer_is_maker { Side::Sell } else { Side::Buy }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
