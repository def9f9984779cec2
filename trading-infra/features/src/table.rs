//! Statistics tables
//!
//! A table owns one window per `(symbol, field)` (per tier for the sliding
//! family) and flattens them into the sorted feature vector. The
//! dispatcher mutates it under the exclusive lock; the assembler reads it
//! under the shared lock.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use trading_core::{
    Accumulator, Clock, ExchangeMessage, Intervals, SlidingWindow, Statistic, StatsView, Symbol,
    SystemClock,
};

use crate::config::TierSpec;
use crate::key::{FeatureKey, Field, Layout, observations};

/// Port shared by both accumulator families
pub trait FeatureTable: Send + Sync {
    /// Column names in row order
    fn keys(&self) -> &[String];

    /// Apply one message; returns how many windows it touched
    fn observe(&mut self, message: &ExchangeMessage) -> usize;

    /// Drop observations that have aged out. Called under the exclusive
    /// lock right before a read.
    fn expire(&mut self) {}

    /// Current value of every column, in [`FeatureTable::keys`] order
    fn values(&self) -> Vec<f64>;
}

pub type SharedTable = Arc<RwLock<dyn FeatureTable>>;

pub fn share<T: FeatureTable + 'static>(table: T) -> SharedTable {
    Arc::new(RwLock::new(table))
}

type WindowIndex<V> = HashMap<Symbol, HashMap<Field, V>>;

#[derive(Debug, Clone, Copy)]
struct IntervalsCell {
    window: usize,
    tier: usize,
    statistic: Statistic,
}

/// Table of ring-bucket [`Intervals`], one per `(symbol, field)`
pub struct IntervalsTable {
    windows: Vec<Intervals>,
    index: WindowIndex<usize>,
    layout: Layout<IntervalsCell>,
}

impl IntervalsTable {
    pub fn new(symbols: &[Symbol], fields: &[Field], tiers: &[TierSpec]) -> Self {
        let template = tiers.iter().fold(Intervals::new(), |acc, t| {
            acc.with_tier(t.name.clone(), t.duration(), t.ring_size)
        });
        // snapshot order is duration order, not config order
        let tier_names: Vec<String> = template.tier_names().map(str::to_string).collect();

        let mut windows = Vec::new();
        let mut index: WindowIndex<usize> = HashMap::new();
        let mut entries = Vec::new();
        for symbol in symbols {
            for &field in fields {
                let window = windows.len();
                windows.push(template.clone());
                index.entry(symbol.clone()).or_default().insert(field, window);
                for (tier, name) in tier_names.iter().enumerate() {
                    for statistic in Statistic::INTERVALS {
                        entries.push((
                            FeatureKey::new(symbol.clone(), field, statistic, name.as_str()),
                            IntervalsCell {
                                window,
                                tier,
                                statistic,
                            },
                        ));
                    }
                }
            }
        }

        Self {
            windows,
            index,
            layout: Layout::new(entries),
        }
    }

    pub fn window(&self, symbol: &Symbol, field: Field) -> Option<&Intervals> {
        let i = *self.index.get(symbol)?.get(&field)?;
        self.windows.get(i)
    }
}

impl FeatureTable for IntervalsTable {
    fn keys(&self) -> &[String] {
        self.layout.names()
    }

    fn observe(&mut self, message: &ExchangeMessage) -> usize {
        let Some(fields) = self.index.get(&message.symbol) else {
            return 0;
        };
        let mut touched = 0;
        for (field, value) in observations(message) {
            if let Some(&i) = fields.get(&field) {
                self.windows[i].observe(message.timestamp, value);
                touched += 1;
            }
        }
        touched
    }

    fn values(&self) -> Vec<f64> {
        let snapshots: Vec<Vec<Accumulator>> = self
            .windows
            .iter()
            .map(|w| w.snapshot().into_iter().map(|(_, acc)| acc).collect())
            .collect();
        self.layout
            .cells()
            .iter()
            .map(|c| snapshots[c.window][c.tier].stat(c.statistic))
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct SlidingCell {
    window: usize,
    statistic: Statistic,
}

/// Table of exact [`SlidingWindow`]s, one per `(symbol, field, tier)`
pub struct SlidingTable<C: Clock + Clone = SystemClock> {
    windows: Vec<SlidingWindow<C>>,
    index: WindowIndex<Vec<usize>>,
    layout: Layout<SlidingCell>,
}

impl SlidingTable<SystemClock> {
    pub fn new(symbols: &[Symbol], fields: &[Field], tiers: &[TierSpec]) -> Self {
        Self::with_clock(symbols, fields, tiers, SystemClock)
    }
}

impl<C: Clock + Clone> SlidingTable<C> {
    pub fn with_clock(symbols: &[Symbol], fields: &[Field], tiers: &[TierSpec], clock: C) -> Self {
        let mut windows = Vec::new();
        let mut index: WindowIndex<Vec<usize>> = HashMap::new();
        let mut entries = Vec::new();
        for symbol in symbols {
            for &field in fields {
                let slots = index.entry(symbol.clone()).or_default().entry(field).or_default();
                for tier in tiers {
                    let window = windows.len();
                    windows.push(SlidingWindow::with_clock(
                        tier.max_count,
                        tier.duration(),
                        clock.clone(),
                    ));
                    slots.push(window);
                    for statistic in Statistic::SLIDING {
                        entries.push((
                            FeatureKey::new(symbol.clone(), field, statistic, tier.name.as_str()),
                            SlidingCell { window, statistic },
                        ));
                    }
                }
            }
        }

        Self {
            windows,
            index,
            layout: Layout::new(entries),
        }
    }
}

impl<C: Clock + Clone> FeatureTable for SlidingTable<C> {
    fn keys(&self) -> &[String] {
        self.layout.names()
    }

    fn observe(&mut self, message: &ExchangeMessage) -> usize {
        let Some(fields) = self.index.get(&message.symbol) else {
            return 0;
        };
        let mut touched = 0;
        for (field, value) in observations(message) {
            for &i in fields.get(&field).into_iter().flatten() {
                self.windows[i].add(value);
                touched += 1;
            }
        }
        touched
    }

    fn expire(&mut self) {
        self.windows.iter_mut().for_each(SlidingWindow::evict);
    }

    fn values(&self) -> Vec<f64> {
        self.layout
            .cells()
            .iter()
            .map(|c| self.windows[c.window].stat(c.statistic))
            .collect()
    }
}
