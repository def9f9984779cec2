//! Windowed statistics for market data
//!
//! Two families of windows over `f64` observations:
//!
//! - [`Intervals`]: ring-bucket tiers cascaded by merge. Approximate,
//!   memory bounded by the ring sizes, O(1) per observation.
//! - [`SlidingWindow`]: exact count/age bounded window with monotonic
//!   deques for min/max.
//!
//! Both expose their numbers through [`StatsView`] so exporters can treat
//! them uniformly. Every statistic except `count` is NaN on an empty
//! window.

mod accumulator;
mod intervals;
mod rolling;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clock::Clock;

pub use accumulator::Accumulator;
pub use intervals::Intervals;
pub use rolling::SlidingWindow;

/// Named statistic extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    Min,
    Max,
    First,
    Last,
    Avg,
    Sum,
    Count,
    Mid,
}

impl Statistic {
    /// Statistics available from a ring-bucket tier
    pub const INTERVALS: [Statistic; 7] = [
        Statistic::Min,
        Statistic::Max,
        Statistic::First,
        Statistic::Last,
        Statistic::Avg,
        Statistic::Sum,
        Statistic::Count,
    ];

    /// Statistics available from a sliding window
    pub const SLIDING: [Statistic; 8] = [
        Statistic::Min,
        Statistic::Max,
        Statistic::First,
        Statistic::Last,
        Statistic::Avg,
        Statistic::Sum,
        Statistic::Count,
        Statistic::Mid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Min => "min",
            Statistic::Max => "max",
            Statistic::First => "first",
            Statistic::Last => "last",
            Statistic::Avg => "avg",
            Statistic::Sum => "sum",
            Statistic::Count => "count",
            Statistic::Mid => "mid",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only statistic access shared by both window families
pub trait StatsView {
    fn stat(&self, statistic: Statistic) -> f64;
}

impl StatsView for Accumulator {
    fn stat(&self, statistic: Statistic) -> f64 {
        match statistic {
            Statistic::Min => self.min(),
            Statistic::Max => self.max(),
            Statistic::First => self.first(),
            Statistic::Last => self.last(),
            Statistic::Avg => self.avg(),
            Statistic::Sum => self.sum(),
            Statistic::Count => self.count() as f64,
            Statistic::Mid => {
                if self.is_empty() {
                    f64::NAN
                } else {
                    (self.first() + self.last()) / 2.0
                }
            }
        }
    }
}

impl<C: Clock> StatsView for SlidingWindow<C> {
    fn stat(&self, statistic: Statistic) -> f64 {
        match statistic {
            Statistic::Min => self.min(),
            Statistic::Max => self.max(),
            Statistic::First => self.first(),
            Statistic::Last => self.last(),
            Statistic::Avg => self.avg(),
            Statistic::Sum => self.sum(),
            Statistic::Count => self.count() as f64,
            Statistic::Mid => self.mid(),
        }
    }
}
