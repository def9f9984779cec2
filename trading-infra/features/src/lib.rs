//! Features Crate
//!
//! Turns the gateway's message queue into a periodic, fixed-layout feature
//! vector.
//!
//! ```text
//!   mpsc<ExchangeMessage>
//!          │
//!          ▼
//!   ┌────────────┐  write lock  ┌──────────────┐  read lock  ┌──────────────────┐
//!   │ Dispatcher │─────────────▶│ FeatureTable │◀────────────│ FeatureAssembler │
//!   └────────────┘              └──────────────┘             └────────┬─────────┘
//!                                                                     │ every cadence
//!                                                                     ▼
//!                                                               FeatureSink
//! ```
//!
//! Column names are `{symbol}-{field}-{statistic}-{tier}`, sorted
//! lexicographically and fixed for the lifetime of the table.

pub mod assembler;
pub mod config;
pub mod dispatcher;
pub mod key;
pub mod sink;
pub mod table;

pub use assembler::FeatureAssembler;
pub use config::{
    FeatureConfig, FeatureConfigError, TierSpec, WindowFamily, load_default_feature_config,
    load_feature_config, load_feature_config_from_str,
};
pub use dispatcher::Dispatcher;
pub use key::{FeatureKey, Field, Layout, observations};
pub use sink::{
    ChannelSink, FeatureExport, FeatureRow, FeatureSink, LogSink, MemorySink, SinkError,
    header_fields,
};
pub use table::{FeatureTable, IntervalsTable, SharedTable, SlidingTable, share};
