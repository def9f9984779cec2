//! Exact sliding window with O(1) amortized min/max

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};

#[derive(Debug, Clone, Copy)]
struct Entry {
    seq: u64,
    value: f64,
    at: Instant,
}

/// Count- and age-bounded window over `f64` observations
///
/// Keeps two monotonic deques next to the raw entries: the min deque is
/// non-decreasing front to back, the max deque non-increasing, so their
/// fronts are always the window min and max. Deque entries carry the
/// insertion sequence number so eviction removes exactly the element that
/// left the window even when equal values repeat.
#[derive(Debug, Clone)]
pub struct SlidingWindow<C: Clock = SystemClock> {
    entries: VecDeque<Entry>,
    min_deque: VecDeque<(u64, f64)>,
    max_deque: VecDeque<(u64, f64)>,
    sum: f64,
    next_seq: u64,
    max_count: usize,
    max_age: Duration,
    clock: C,
}

impl SlidingWindow<SystemClock> {
    pub fn new(max_count: usize, max_age: Duration) -> Self {
        Self::with_clock(max_count, max_age, SystemClock)
    }
}

impl<C: Clock> SlidingWindow<C> {
    pub fn with_clock(max_count: usize, max_age: Duration, clock: C) -> Self {
        let max_count = max_count.max(1);
        Self {
            entries: VecDeque::with_capacity(max_count.min(4096)),
            min_deque: VecDeque::new(),
            max_deque: VecDeque::new(),
            sum: 0.0,
            next_seq: 0,
            max_count,
            max_age,
            clock,
        }
    }

    /// Add a value stamped with the clock's current instant.
    ///
    /// NaN is ignored: it has no place in an ordered deque.
    pub fn add(&mut self, v: f64) {
        if v.is_nan() {
            return;
        }
        let now = self.clock.now();
        let seq = self.next_seq;
        self.next_seq += 1;

        self.entries.push_back(Entry { seq, value: v, at: now });
        self.sum += v;

        while self.entries.len() > self.max_count {
            self.pop_front();
        }
        self.evict_at(now);

        while self.min_deque.back().is_some_and(|&(_, m)| m >= v) {
            self.min_deque.pop_back();
        }
        self.min_deque.push_back((seq, v));

        while self.max_deque.back().is_some_and(|&(_, m)| m <= v) {
            self.max_deque.pop_back();
        }
        self.max_deque.push_back((seq, v));
    }

    /// Drop entries older than the age bound without adding anything.
    /// Reads do not evict on their own, so idle windows call this first.
    pub fn evict(&mut self) {
        let now = self.clock.now();
        self.evict_at(now);
    }

    fn evict_at(&mut self, now: Instant) {
        while let Some(head) = self.entries.front() {
            if now.saturating_duration_since(head.at) > self.max_age {
                self.pop_front();
            } else {
                break;
            }
        }
    }

    fn pop_front(&mut self) {
        let Some(head) = self.entries.pop_front() else {
            return;
        };
        if self.min_deque.front().is_some_and(|&(s, _)| s == head.seq) {
            self.min_deque.pop_front();
        }
        if self.max_deque.front().is_some_and(|&(s, _)| s == head.seq) {
            self.max_deque.pop_front();
        }
        if self.entries.is_empty() {
            self.sum = 0.0;
        } else {
            self.sum -= head.value;
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.min_deque.clear();
        self.max_deque.clear();
        self.sum = 0.0;
    }

    #[inline]
    pub fn min(&self) -> f64 {
        self.min_deque.front().map_or(f64::NAN, |&(_, v)| v)
    }

    #[inline]
    pub fn max(&self) -> f64 {
        self.max_deque.front().map_or(f64::NAN, |&(_, v)| v)
    }

    #[inline]
    pub fn sum(&self) -> f64 {
        if self.entries.is_empty() {
            return f64::NAN;
        }
        self.sum
    }

    #[inline]
    pub fn avg(&self) -> f64 {
        if self.entries.is_empty() {
            return f64::NAN;
        }
        self.sum / self.entries.len() as f64
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn first(&self) -> f64 {
        self.entries.front().map_or(f64::NAN, |e| e.value)
    }

    #[inline]
    pub fn last(&self) -> f64 {
        self.entries.back().map_or(f64::NAN, |e| e.value)
    }

    /// Average of the oldest and newest values
    #[inline]
    pub fn mid(&self) -> f64 {
        match (self.entries.front(), self.entries.back()) {
            (Some(head), Some(tail)) => (head.value + tail.value) / 2.0,
            _ => f64::NAN,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_count
    }

    #[inline]
    pub fn max_count(&self) -> usize {
        self.max_count
    }

    #[inline]
    pub fn max_age(&self) -> Duration {
        self.max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    fn manual(max_count: usize, max_age: Duration) -> (SlidingWindow<Arc<ManualClock>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (SlidingWindow::with_clock(max_count, max_age, clock.clone()), clock)
    }

    #[test]
    fn test_empty_window() {
        let w = SlidingWindow::new(10, Duration::from_secs(60));
        assert_eq!(w.count(), 0);
        assert!(w.min().is_nan());
        assert!(w.max().is_nan());
        assert!(w.sum().is_nan());
        assert!(w.avg().is_nan());
        assert!(w.first().is_nan());
        assert!(w.last().is_nan());
        assert!(w.mid().is_nan());
    }

    #[test]
    fn test_single_element() {
        let mut w = SlidingWindow::new(10, Duration::from_secs(60));
        w.add(3.25);
        assert_eq!(w.min(), 3.25);
        assert_eq!(w.max(), 3.25);
        assert_eq!(w.first(), 3.25);
        assert_eq!(w.last(), 3.25);
        assert_eq!(w.mid(), 3.25);
        assert_eq!(w.count(), 1);
    }

    #[test]
    fn test_increasing_then_age_out() {
        let (mut w, clock) = manual(100, Duration::from_secs(5));
        for v in 1..=10 {
            w.add(v as f64);
            clock.advance(Duration::from_millis(100));
        }
        assert_eq!(w.min(), 1.0);
        assert_eq!(w.max(), 10.0);
        assert_eq!(w.first(), 1.0);
        assert_eq!(w.last(), 10.0);
        assert_eq!(w.sum(), 55.0);
        assert_eq!(w.mid(), 5.5);

        clock.advance(Duration::from_secs(6));
        w.evict();
        assert_eq!(w.count(), 0);
        assert!(w.min().is_nan());
        assert!(w.max().is_nan());
        assert!(w.sum().is_nan());
        assert!(w.avg().is_nan());
        assert!(w.first().is_nan());
        assert!(w.last().is_nan());
    }

    #[test]
    fn test_count_bound_evicts_head() {
        let mut w = SlidingWindow::new(3, Duration::from_secs(60));
        for v in [5.0, 1.0, 4.0, 2.0] {
            w.add(v);
        }
        // 5.0 is gone
        assert_eq!(w.count(), 3);
        assert_eq!(w.first(), 1.0);
        assert_eq!(w.max(), 4.0);
        assert_eq!(w.min(), 1.0);
        assert_eq!(w.sum(), 7.0);

        w.add(3.0);
        // 1.0 is gone
        assert_eq!(w.min(), 2.0);
        assert_eq!(w.max(), 4.0);
        assert!(w.is_full());
    }

    #[test]
    fn test_age_eviction_many_at_once() {
        let (mut w, clock) = manual(1_000, Duration::from_secs(1));
        for v in [9.0, 8.0, 7.0] {
            w.add(v);
        }
        clock.advance(Duration::from_millis(600));
        w.add(1.0);
        clock.advance(Duration::from_millis(600));
        // the first three are 1.2s old now
        w.add(2.0);
        assert_eq!(w.count(), 2);
        assert_eq!(w.first(), 1.0);
        assert_eq!(w.max(), 2.0);
        assert_eq!(w.min(), 1.0);
        assert_eq!(w.avg(), 1.5);
    }

    #[test]
    fn test_age_exactly_at_bound_is_kept() {
        let (mut w, clock) = manual(10, Duration::from_secs(1));
        w.add(1.0);
        clock.advance(Duration::from_secs(1));
        w.evict();
        assert_eq!(w.count(), 1);
    }

    #[test]
    fn test_duplicate_values_evict_correctly() {
        let mut w = SlidingWindow::new(2, Duration::from_secs(60));
        w.add(2.0);
        w.add(2.0);
        w.add(1.0);
        assert_eq!(w.max(), 2.0);
        assert_eq!(w.min(), 1.0);
        w.add(1.0);
        assert_eq!(w.max(), 1.0);
        assert_eq!(w.min(), 1.0);
    }

    #[test]
    fn test_matches_brute_force() {
        let (mut w, clock) = manual(7, Duration::from_millis(450));
        let mut raw: Vec<(u64, f64)> = Vec::new();
        let mut t = 0u64;
        for i in 0..300u64 {
            let v = ((i * 7919) % 23) as f64 - 11.0;
            w.add(v);
            raw.push((t, v));

            let live: Vec<f64> = raw
                .iter()
                .filter(|(at, _)| t - at <= 450)
                .map(|(_, v)| *v)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .take(7)
                .collect();
            let lo = live.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = live.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            assert_eq!(w.count(), live.len(), "step {i}");
            assert_eq!(w.min(), lo, "step {i}");
            assert_eq!(w.max(), hi, "step {i}");

            let step = 40 + (i % 5) * 35;
            clock.advance(Duration::from_millis(step));
            t += step;
        }
    }

    #[test]
    fn test_nan_is_ignored() {
        let mut w = SlidingWindow::new(4, Duration::from_secs(60));
        w.add(1.0);
        w.add(f64::NAN);
        assert_eq!(w.count(), 1);
        assert_eq!(w.max(), 1.0);
    }

    #[test]
    fn test_clear() {
        let mut w = SlidingWindow::new(4, Duration::from_secs(60));
        w.add(1.0);
        w.add(2.0);
        w.clear();
        assert!(w.is_empty());
        assert!(w.sum().is_nan());
        w.add(4.0);
        assert_eq!(w.sum(), 4.0);
        assert_eq!(w.min(), 4.0);
    }

    #[test]
    fn test_zero_count_is_clamped() {
        let mut w = SlidingWindow::new(0, Duration::from_secs(60));
        assert_eq!(w.max_count(), 1);
        w.add(1.0);
        w.add(2.0);
        assert_eq!(w.count(), 1);
        assert_eq!(w.last(), 2.0);
    }
}
