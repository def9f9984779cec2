use parking_lot::Mutex;
use std::time::{Duration, Instant};
use trading_core::{Clock, SystemClock};

struct BucketState {
    tokens: f64,
    last_update: Instant,
}

/// Token bucket for outbound control frames
///
/// Holds up to `capacity` tokens, refilled continuously so that a full
/// bucket regenerates every `refill_interval`.
pub struct TokenBucket<C: Clock = SystemClock> {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_rate: f64, // tokens per second
    clock: C,
}

impl TokenBucket<SystemClock> {
    pub fn new(capacity: u32, refill_interval: Duration) -> Self {
        Self::with_clock(capacity, refill_interval, SystemClock)
    }

    /// `per_second` frames per second, bursting up to the same amount
    pub fn per_second(per_second: u32) -> Self {
        Self::new(per_second, Duration::from_secs(1))
    }
}

impl<C: Clock> TokenBucket<C> {
    pub fn with_clock(capacity: u32, refill_interval: Duration, clock: C) -> Self {
        let capacity = f64::from(capacity.max(1));
        let interval = refill_interval.as_secs_f64().max(f64::EPSILON);
        let now = clock.now();
        TokenBucket {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_update: now,
            }),
            capacity,
            refill_rate: capacity / interval,
            clock,
        }
    }

    /// Take `amount` tokens if available, otherwise return how long until
    /// they will be.
    pub fn try_acquire(&self, amount: u32) -> Result<(), Duration> {
        let amount = f64::from(amount).min(self.capacity);
        let mut state = self.state.lock();
        self.refill(&mut state);

        if state.tokens >= amount {
            state.tokens -= amount;
            Ok(())
        } else {
            let deficit = amount - state.tokens;
            Err(Duration::from_secs_f64(deficit / self.refill_rate))
        }
    }

    /// Wait until `amount` tokens are available and take them
    pub async fn acquire(&self, amount: u32) {
        while let Err(wait) = self.try_acquire(amount) {
            tokio::time::sleep(wait).await;
        }
    }

    pub fn available(&self) -> f64 {
        let mut state = self.state.lock();
        self.refill(&mut state);
        state.tokens
    }

    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }

    fn refill(&self, state: &mut BucketState) {
        let now = self.clock.now();
        let elapsed = now.saturating_duration_since(state.last_update);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.last_update = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use trading_core::ManualClock;

    fn bucket(capacity: u32) -> (TokenBucket<Arc<ManualClock>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (
            TokenBucket::with_clock(capacity, Duration::from_secs(1), clock.clone()),
            clock,
        )
    }

    #[test]
    fn test_burst_up_to_capacity() {
        let (tb, _clock) = bucket(5);
        for _ in 0..5 {
            assert!(tb.try_acquire(1).is_ok());
        }
        let wait = tb.try_acquire(1).unwrap_err();
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_millis(200));
    }

    #[test]
    fn test_refills_over_time() {
        let (tb, clock) = bucket(5);
        for _ in 0..5 {
            tb.try_acquire(1).unwrap();
        }
        assert!(tb.try_acquire(1).is_err());

        clock.advance(Duration::from_millis(400));
        // 0.4s at 5/s is two tokens
        assert!(tb.try_acquire(1).is_ok());
        assert!(tb.try_acquire(1).is_ok());
        assert!(tb.try_acquire(1).is_err());
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let (tb, clock) = bucket(3);
        clock.advance(Duration::from_secs(60));
        assert!((tb.available() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_oversized_request_is_capped() {
        let (tb, _clock) = bucket(2);
        // asking for more than capacity must not wait forever
        assert!(tb.try_acquire(10).is_ok());
        assert!(tb.try_acquire(1).is_err());
    }

    #[tokio::test]
    async fn test_acquire_waits_for_refill() {
        let tb = TokenBucket::new(2, Duration::from_millis(100));
        let start = Instant::now();
        for _ in 0..3 {
            tb.acquire(1).await;
        }
        // third token needs ~50ms of refill
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
