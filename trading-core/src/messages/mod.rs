//! Exchange Message Types
//!
//! Types shared between the gateway (producer) and the feature pipeline
//! (consumer).
//!
//! # Message Categories
//!
//! - **Exchange Identifiers**: `ExchangeId`, `QualifiedSymbol`
//! - **Market Data**: `PriceLevel`, `Bbo`, `Trade`
//! - **Private Channel**: `OrderUpdate`, `BalanceUpdate`, `PositionUpdate`
//! - **Envelope**: `ExchangeMessage` carrying a `Payload`

mod exchange;
mod market;
mod order;

pub use exchange::{ExchangeId, QualifiedSymbol};
pub use market::{
    BalanceUpdate, Bbo, ExchangeMessage, MessageKind, Payload, PositionUpdate, PriceLevel, Trade,
};
pub use order::{ORDER_STATUS_TABLE, OrderStatus, OrderUpdate};
