use crate::measure::Bandwidth;
use std::{
    sync::{Mutex, PoisonError},
    time::Instant,
};

/// Token bucket rate limiter.
///
/// Credit accrues at the configured [`Bandwidth`] up to `capacity`
/// bytes; transmitting `n` bytes requires (and consumes) `n` tokens.
/// The bucket starts full so a fresh simulation can burst immediately.
///
/// Running out of tokens is normal flow control, not an error: callers
/// poll [`TokenBucket::consume`] until it succeeds. There is no
/// wait/notify machinery on purpose — the consumer decides its own
/// backoff.
///
/// All state transitions happen under one internal lock so the
/// accounting stays exact even with several consumers.
///
/// # Example
///
/// ```
/// # use tbfsim_core::{measure::Bandwidth, bucket::TokenBucket};
/// # use std::time::Duration;
/// let bucket = TokenBucket::new(
///     Bandwidth::new(600 * 1_024, Duration::from_secs(1)),
///     80 * 1_024,
/// );
///
/// // the bucket starts full
/// assert!(bucket.consume(80 * 1_024));
/// // and is now empty until time passes
/// assert!(!bucket.consume(1));
/// ```
#[derive(Debug)]
pub struct TokenBucket {
    rate: Bandwidth,
    capacity: u64,
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    tokens: u64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rate: Bandwidth, capacity: u64) -> Self {
        Self::new_at(rate, capacity, Instant::now())
    }

    /// like [`Self::new`] with an explicit creation time, letting the
    /// caller drive the clock (simulations at arbitrary speed, tests)
    pub fn new_at(rate: Bandwidth, capacity: u64, now: Instant) -> Self {
        Self {
            rate,
            capacity,
            state: Mutex::new(State {
                tokens: capacity,
                last_refill: now,
            }),
        }
    }

    /// the long-run shaping rate of this bucket
    pub fn rate(&self) -> Bandwidth {
        self.rate
    }

    /// the burst allowance in bytes
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// refill from elapsed wall time, then take `tokens` bytes of
    /// credit if available
    ///
    /// Returns `false` without any state change when the credit is
    /// insufficient.
    pub fn consume(&self, tokens: u64) -> bool {
        self.consume_at(tokens, Instant::now())
    }

    /// like [`Self::consume`] with an explicit current time
    pub fn consume_at(&self, tokens: u64, now: Instant) -> bool {
        let mut state = self.lock();
        state.refill(self.rate, self.capacity, now);

        if state.tokens >= tokens {
            state.tokens -= tokens;
            true
        } else {
            false
        }
    }

    /// refill from elapsed wall time, then report the credit
    pub fn current_tokens(&self) -> u64 {
        self.tokens_at(Instant::now())
    }

    /// like [`Self::current_tokens`] with an explicit current time
    pub fn tokens_at(&self, now: Instant) -> u64 {
        let mut state = self.lock();
        state.refill(self.rate, self.capacity, now);
        state.tokens
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // a poisoned lock only means another consumer panicked between
        // two consistent states; the token count itself is still valid
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl State {
    fn refill(&mut self, rate: Bandwidth, capacity: u64, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let add = rate.capacity(elapsed);

        // `last_refill` only advances when at least one whole token
        // accrued: the sub-microsecond remainder keeps accumulating
        // against the old reference point, so frequent callers do not
        // systematically underfill the bucket.
        if add > 0 {
            self.tokens = std::cmp::min(self.tokens.saturating_add(add), capacity);
            self.last_refill = now;
        }
    }
}
