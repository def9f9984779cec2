//! Order lifecycle as reported by the exchange

use serde::{Deserialize, Serialize};

use crate::value_objects::{Price, Quantity, Side, Timestamp};

/// Internal order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Unknown,
}

/// Exchange status spelling to internal status.
///
/// `EXPIRED` folds into `Canceled`: from the caller's point of view the
/// order is gone without (further) fills either way.
pub const ORDER_STATUS_TABLE: &[(&str, OrderStatus)] = &[
    ("NEW", OrderStatus::Placed),
    ("PARTIALLY_FILLED", OrderStatus::PartiallyFilled),
    ("FILLED", OrderStatus::Filled),
    ("CANCELED", OrderStatus::Canceled),
    ("EXPIRED", OrderStatus::Canceled),
    ("REJECTED", OrderStatus::Rejected),
];

impl OrderStatus {
    /// Look up an exchange status; anything not in the table is `Unknown`.
    pub fn from_exchange(status: &str) -> Self {
        ORDER_STATUS_TABLE
            .iter()
            .find(|(name, _)| *name == status)
            .map(|(_, s)| *s)
            .unwrap_or(OrderStatus::Unknown)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected
        )
    }
}

/// Private-channel order event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub client_order_id: String,
    pub exchange_order_id: String,
    pub side: Side,
    pub status: OrderStatus,
    pub filled_size: Quantity,
    pub average_price: Price,
    pub updated_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_table() {
        assert_eq!(OrderStatus::from_exchange("NEW"), OrderStatus::Placed);
        assert_eq!(
            OrderStatus::from_exchange("PARTIALLY_FILLED"),
            OrderStatus::PartiallyFilled
        );
        assert_eq!(OrderStatus::from_exchange("FILLED"), OrderStatus::Filled);
        assert_eq!(OrderStatus::from_exchange("REJECTED"), OrderStatus::Rejected);
    }

    #[test]
    fn test_expired_and_canceled_share_a_status() {
        assert_eq!(OrderStatus::from_exchange("CANCELED"), OrderStatus::Canceled);
        assert_eq!(OrderStatus::from_exchange("EXPIRED"), OrderStatus::Canceled);
    }

    #[test]
    fn test_unknown_status() {
        assert_eq!(
            OrderStatus::from_exchange("PENDING_NEW"),
            OrderStatus::Unknown
        );
        assert_eq!(OrderStatus::from_exchange("new"), OrderStatus::Unknown);
        assert!(!OrderStatus::Unknown.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
    }
}
