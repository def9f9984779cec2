//! Shared kernel for the market-data pipeline
//!
//! - `value_objects`: exact decimal `Price`/`Quantity`, `Side`, `Symbol`
//! - `messages`: the `ExchangeMessage` union produced by the gateway
//! - `clock`: time source port used by age-bounded windows
//! - `stats`: `Accumulator`, `Intervals`, `SlidingWindow`

pub mod clock;
pub mod messages;
pub mod stats;
pub mod value_objects;

// Re-export value objects at crate root for convenience
pub use value_objects::{DecimalParseError, Price, Quantity, Side, Symbol, Timestamp};

pub use messages::{
    BalanceUpdate, Bbo, ExchangeId, ExchangeMessage, MessageKind, OrderStatus, OrderUpdate,
    Payload, PositionUpdate, PriceLevel, QualifiedSymbol, Trade,
};

pub use clock::{Clock, ManualClock, SystemClock};

pub use stats::{Accumulator, Intervals, SlidingWindow, Statistic, StatsView};
