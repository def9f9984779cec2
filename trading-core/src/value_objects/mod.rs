mod price;
mod quantity;
mod side;
mod symbol;

use thiserror::Error;

pub use price::Price;
pub use quantity::Quantity;
pub use side::Side;
pub use symbol::Symbol;

pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Failure to read an exact decimal from exchange text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecimalParseError {
    #[error("empty decimal string")]
    Empty,
    #[error("invalid decimal {input:?}: {reason}")]
    Invalid { input: String, reason: String },
}
