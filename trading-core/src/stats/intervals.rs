//! Hierarchical ring-bucket accumulator
//!
//! A stack of tiers ordered by duration (e.g. 1s, 15s, 1m, 15m, 1h). Only
//! the lowest tier sees raw observations. Each time a tier completes a full
//! rotation of its ring, the whole ring is merged into one slot of the tier
//! above, so an observation costs O(1) no matter how many tiers there are.
//!
//! # Slot selection
//!
//! For a tier with slot duration `d` and `n` slots the active slot at time
//! `t` is `(t mod d*n) / d`. There is no stored epoch: bucket edges are a
//! pure function of wall time, so a process restart lands on the same grid.
//!
//! ```text
//!  1_sec  [ 0 | 1 | 2 | ... | 14 ]   rotation = 15s ──merge──┐
//!  15_sec [ 0 | 1 | 2 | 3 ]   <──────────────────────────────┘
//! ```
//!
//! Reads return the most recently completed slot of every tier,
//! `(active - 1) mod n`, never the one still being written.

use chrono::{DateTime, Utc};
use std::time::Duration;

use super::accumulator::Accumulator;

#[derive(Debug, Clone)]
struct Tier {
    name: String,
    duration: Duration,
    slot_nanos: i128,
    ring: Vec<Accumulator>,
    /// Absolute bucket number (`t / d`) of the last observation
    last_bucket: Option<i128>,
}

impl Tier {
    fn new(name: String, duration: Duration, ring_size: usize) -> Self {
        let slot_nanos = (duration.as_nanos() as i128).max(1);
        Self {
            name,
            duration,
            slot_nanos,
            ring: vec![Accumulator::new(); ring_size.max(1)],
            last_bucket: None,
        }
    }

    #[inline]
    fn len(&self) -> i128 {
        self.ring.len() as i128
    }

    #[inline]
    fn bucket_of(&self, nanos: i128) -> i128 {
        nanos.div_euclid(self.slot_nanos)
    }

    #[inline]
    fn slot_of(&self, bucket: i128) -> usize {
        bucket.rem_euclid(self.len()) as usize
    }

    #[inline]
    fn rotation_of(&self, bucket: i128) -> i128 {
        bucket.div_euclid(self.len())
    }

    /// Move the active slot forward to `bucket`, clearing every slot passed
    /// over on the way (at most one full ring). With `keep_previous` the
    /// slot of the previous bucket survives even when the ring wraps onto it.
    fn advance(&mut self, bucket: i128, keep_previous: bool) {
        let Some(prev) = self.last_bucket else {
            let slot = self.slot_of(bucket);
            self.ring[slot].reset();
            self.last_bucket = Some(bucket);
            return;
        };
        if bucket <= prev {
            return;
        }
        let keep = if keep_previous && bucket - prev == 1 {
            Some(self.slot_of(prev))
        } else {
            None
        };
        let steps = (bucket - prev).min(self.len());
        for step in 0..steps {
            let slot = self.slot_of(bucket - step);
            if Some(slot) != keep {
                self.ring[slot].reset();
            }
        }
        self.last_bucket = Some(bucket);
    }

    fn completed(&self) -> Accumulator {
        match self.last_bucket {
            Some(bucket) => self.ring[self.slot_of(bucket - 1)],
            None => Accumulator::new(),
        }
    }
}

/// Multi-resolution accumulator fed from a single observation stream
#[derive(Debug, Clone, Default)]
pub struct Intervals {
    tiers: Vec<Tier>,
}

impl Intervals {
    pub fn new() -> Self {
        Self { tiers: Vec::new() }
    }

    /// Add a tier of `ring_size` slots, each `duration` long.
    ///
    /// Tiers stay sorted by duration regardless of insertion order.
    pub fn add_tier(&mut self, name: impl Into<String>, duration: Duration, ring_size: usize) {
        self.tiers.push(Tier::new(name.into(), duration, ring_size));
        self.tiers.sort_by_key(|t| t.duration);
    }

    /// Builder-style [`Intervals::add_tier`]
    pub fn with_tier(mut self, name: impl Into<String>, duration: Duration, ring_size: usize) -> Self {
        self.add_tier(name, duration, ring_size);
        self
    }

    pub fn tier_names(&self) -> impl Iterator<Item = &str> {
        self.tiers.iter().map(|t| t.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Record `v` observed at `at`.
    ///
    /// Timestamps older than the last observation are folded into the
    /// currently active slot instead of rewinding the ring.
    pub fn observe(&mut self, at: DateTime<Utc>, v: f64) {
        if self.tiers.is_empty() {
            return;
        }
        let nanos = i128::from(at.timestamp()) * 1_000_000_000 + i128::from(at.timestamp_subsec_nanos());

        let mut carry: Option<Accumulator> = None;
        let top = self.tiers.len() - 1;
        for (j, tier) in self.tiers.iter_mut().enumerate() {
            let bucket = tier.bucket_of(nanos);
            let prev = tier.last_bucket;

            if let (Some(merged), Some(prev)) = (carry.take(), prev) {
                let slot = tier.slot_of(prev);
                tier.ring[slot] = merged;
            }

            if let Some(prev) = prev {
                if j < top && bucket > prev && tier.rotation_of(bucket) != tier.rotation_of(prev) {
                    carry = Some(Accumulator::merged(&tier.ring));
                }
            }

            tier.advance(bucket, j > 0);
        }

        let tier0 = &mut self.tiers[0];
        if let Some(bucket) = tier0.last_bucket {
            let slot = tier0.slot_of(bucket);
            tier0.ring[slot].observe(v);
        }
    }

    /// Most recently completed slot of every tier, in tier order.
    ///
    /// Pure read: calling it twice without an intervening observation
    /// returns identical values.
    pub fn snapshot(&self) -> Vec<(&str, Accumulator)> {
        self.tiers
            .iter()
            .map(|t| (t.name.as_str(), t.completed()))
            .collect()
    }

    /// Completed slot of a single tier
    pub fn completed(&self, tier: &str) -> Option<Accumulator> {
        self.tiers
            .iter()
            .find(|t| t.name == tier)
            .map(Tier::completed)
    }

    /// Empty every slot and forget the last active bucket
    pub fn clear(&mut self) {
        for tier in &mut self.tiers {
            tier.ring.iter_mut().for_each(Accumulator::reset);
            tier.last_bucket = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_ms(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    /// 1s x 15 feeding 15s x 4 feeding 60s x 1
    fn three_tiers() -> Intervals {
        Intervals::new()
            .with_tier("1_min", Duration::from_secs(60), 1)
            .with_tier("1_sec", Duration::from_secs(1), 15)
            .with_tier("15_sec", Duration::from_secs(15), 4)
    }

    #[test]
    fn test_tiers_sorted_by_duration() {
        let iv = three_tiers();
        let names: Vec<_> = iv.tier_names().collect();
        assert_eq!(names, vec!["1_sec", "15_sec", "1_min"]);
    }

    #[test]
    fn test_bucket_sum_matches_raw() {
        let mut iv = three_tiers();
        // all inside the 1_sec bucket starting at t=1000s
        let base = 1_000_000;
        let values = [1.5, 2.0, -0.5, 4.0];
        for (i, v) in values.iter().enumerate() {
            iv.observe(at_ms(base + i as i64 * 100), *v);
        }
        // next bucket closes the previous one
        iv.observe(at_ms(base + 1_000), 100.0);

        let done = iv.completed("1_sec").unwrap();
        assert_eq!(done.count(), 4);
        assert_eq!(done.sum(), 7.0);
        assert_eq!(done.first(), 1.5);
        assert_eq!(done.last(), 4.0);
        assert_eq!(done.min(), -0.5);
        assert_eq!(done.max(), 4.0);
    }

    #[test]
    fn test_in_progress_slot_is_not_visible() {
        let mut iv = three_tiers();
        iv.observe(at_ms(5_000), 1.0);
        iv.observe(at_ms(5_500), 2.0);
        let snap = iv.snapshot();
        assert!(snap.iter().all(|(_, acc)| acc.is_empty()));
    }

    #[test]
    fn test_rotation_merges_into_next_tier() {
        let mut iv = three_tiers();
        // one value per second over [0s, 15s), value == second index
        for s in 0..15 {
            iv.observe(at_ms(s * 1_000 + 10), s as f64);
        }
        // crossing 15s completes one 1_sec rotation
        iv.observe(at_ms(15_010), 99.0);

        let q = iv.completed("15_sec").unwrap();
        assert_eq!(q.count(), 15);
        assert_eq!(q.sum(), (0..15).sum::<i64>() as f64);
        assert_eq!(q.first(), 0.0);
        assert_eq!(q.last(), 14.0);
        assert_eq!(q.min(), 0.0);
        assert_eq!(q.max(), 14.0);
    }

    #[test]
    fn test_merge_happens_once_per_rotation() {
        let mut iv = three_tiers();
        for s in 0..15 {
            iv.observe(at_ms(s * 1_000), 1.0);
        }
        iv.observe(at_ms(15_000), 1.0);
        let after_rotation = iv.completed("15_sec").unwrap();

        // more observations inside the next rotation leave it untouched
        for s in 16..29 {
            iv.observe(at_ms(s * 1_000), 50.0);
        }
        assert_eq!(iv.completed("15_sec").unwrap(), after_rotation);
        assert_eq!(after_rotation.count(), 15);
    }

    #[test]
    fn test_single_slot_top_tier_holds_last_minute() {
        let mut iv = three_tiers();
        // 0..60s, one observation every 500ms, value 1
        for i in 0..120 {
            iv.observe(at_ms(i * 500), 1.0);
        }
        iv.observe(at_ms(60_000), 7.0);

        let minute = iv.completed("1_min").unwrap();
        assert_eq!(minute.count(), 120);
        assert_eq!(minute.sum(), 120.0);

        // a few more observations in the new minute do not wipe it
        iv.observe(at_ms(61_000), 7.0);
        iv.observe(at_ms(62_000), 7.0);
        assert_eq!(iv.completed("1_min").unwrap().count(), 120);
    }

    #[test]
    fn test_snapshot_idempotent() {
        let mut iv = three_tiers();
        for i in 0..400 {
            iv.observe(at_ms(i * 250), (i % 17) as f64);
        }
        let a: Vec<_> = iv.snapshot().into_iter().map(|(n, acc)| (n.to_string(), acc)).collect();
        let b: Vec<_> = iv.snapshot().into_iter().map(|(n, acc)| (n.to_string(), acc)).collect();
        assert_eq!(a.len(), 3);
        for ((na, xa), (nb, xb)) in a.iter().zip(b.iter()) {
            assert_eq!(na, nb);
            assert_eq!(xa.count(), xb.count());
            assert_eq!(xa.sum().to_bits(), xb.sum().to_bits());
            assert_eq!(xa.min().to_bits(), xb.min().to_bits());
            assert_eq!(xa.last().to_bits(), xb.last().to_bits());
        }
    }

    #[test]
    fn test_gap_ages_out_stale_slots() {
        let mut iv = Intervals::new().with_tier("1_sec", Duration::from_secs(1), 5);
        iv.observe(at_ms(0), 1.0);
        iv.observe(at_ms(1_000), 2.0);
        // silent for 3 seconds, then resume: slot for t=3s must be clean
        iv.observe(at_ms(4_000), 3.0);
        let done = iv.completed("1_sec").unwrap();
        assert!(done.is_empty());

        iv.observe(at_ms(5_000), 4.0);
        let done = iv.completed("1_sec").unwrap();
        assert_eq!(done.count(), 1);
        assert_eq!(done.last(), 3.0);
    }

    #[test]
    fn test_late_observation_folds_into_active_slot() {
        let mut iv = Intervals::new().with_tier("1_sec", Duration::from_secs(1), 4);
        iv.observe(at_ms(2_100), 1.0);
        iv.observe(at_ms(1_900), 2.0);
        iv.observe(at_ms(3_000), 0.0);
        let done = iv.completed("1_sec").unwrap();
        assert_eq!(done.count(), 2);
        assert_eq!(done.sum(), 3.0);
    }

    #[test]
    fn test_long_run_bounds() {
        // 0..49 sawtooth at 100 obs/s for a little over two minutes,
        // starting off the minute grid
        let mut iv = three_tiers();
        for i in 0..13_000i64 {
            iv.observe(at_ms(1_700_000_000_000 + i * 10), (i % 50) as f64);
        }
        for (name, acc) in iv.snapshot() {
            assert!(!acc.is_empty(), "{name} should be populated");
            assert_eq!(acc.min(), 0.0, "{name}");
            assert_eq!(acc.max(), 49.0, "{name}");
            assert!((acc.avg() - 24.5).abs() < 1e-9, "{name}: {}", acc.avg());
        }
    }

    #[test]
    fn test_clear() {
        let mut iv = three_tiers();
        for i in 0..100 {
            iv.observe(at_ms(i * 1_000), 1.0);
        }
        iv.clear();
        assert!(iv.snapshot().iter().all(|(_, acc)| acc.is_empty()));
    }
}
