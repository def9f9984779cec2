//! Running min/max/first/last/sum/count over a stream of `f64`

use serde::{Deserialize, Serialize};

/// Leaf statistics unit
///
/// Every getter except [`Accumulator::count`] returns NaN while empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Accumulator {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    first: f64,
    last: f64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator {
    pub const fn new() -> Self {
        Self {
            count: 0,
            sum: f64::NAN,
            min: f64::NAN,
            max: f64::NAN,
            first: f64::NAN,
            last: f64::NAN,
        }
    }

    /// Merge accumulators in order.
    ///
    /// `first` comes from the first non-empty member and `last` from the
    /// last one; empty members contribute nothing. Merging nothing (or only
    /// empty members) yields an empty accumulator.
    pub fn merged<'a, I>(accs: I) -> Self
    where
        I: IntoIterator<Item = &'a Accumulator>,
    {
        let mut out = Self::new();
        for acc in accs {
            out.merge(acc);
        }
        out
    }

    /// Fold `other` into `self` as if its observations came after ours.
    pub fn merge(&mut self, other: &Accumulator) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = *other;
            return;
        }
        self.count += other.count;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.last = other.last;
    }

    #[inline]
    pub fn observe(&mut self, v: f64) {
        if self.count == 0 {
            self.count = 1;
            self.sum = v;
            self.min = v;
            self.max = v;
            self.first = v;
            self.last = v;
            return;
        }
        self.count += 1;
        self.sum += v;
        self.last = v;
        if v < self.min {
            self.min = v;
        }
        if v > self.max {
            self.max = v;
        }
    }

    /// Back to the empty state, in place
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[inline]
    pub fn sum(&self) -> f64 {
        self.sum
    }

    #[inline]
    pub fn min(&self) -> f64 {
        self.min
    }

    #[inline]
    pub fn max(&self) -> f64 {
        self.max
    }

    #[inline]
    pub fn first(&self) -> f64 {
        self.first
    }

    #[inline]
    pub fn last(&self) -> f64 {
        self.last
    }

    #[inline]
    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        self.sum / self.count as f64
    }
}
