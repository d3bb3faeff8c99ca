//! Token-bucket admission control.
//!
//! Every external operation (put, get, delete) consumes one token before it
//! is allowed to touch the engine. Tokens refill lazily: each acquisition
//! attempt first credits the bucket with the tokens earned since the last
//! refill, then tries to take one. There is no blocking and no background
//! timer — a caller that finds the bucket empty simply gets `false` and is
//! expected to retry later.
//!
//! # Refill semantics
//!
//! With capacity `C`, rate `R`, and fill interval `I`, an attempt at time
//! `t` credits `floor((t − last_refill) / I × R)` tokens, clamped at `C`.
//! `last_refill` advances only when at least one token was credited, so
//! partial intervals keep accumulating instead of being discarded.
//!
//! This is the only component that may be called from more than one
//! scheduler; its state sits behind a `Mutex` held for the duration of one
//! refill-and-take step.


use std::sync::Mutex;
use std::time::Instant;

use thiserror::Error;
use tracing::trace;

/// Errors returned by token bucket operations.
#[derive(Debug, Error)]
pub enum TokenBucketError {
    /// Internal consistency or locking error.
    #[error("Internal error: {0}")]
    Internal(String),
}

struct BucketState {
    tokens: u64,
    last_refill: Instant,
}

/// A non-blocking token bucket.
///
/// See the [module-level documentation](self) for refill semantics.
pub struct TokenBucket {
    capacity: u64,
    rate: u64,
    fill_interval: std::time::Duration,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Creates a bucket that starts full.
    ///
    /// `rate` tokens accrue per `fill_interval`; a zero rate disables
    /// refill so the bucket only ever drains.
    pub fn new(capacity: u64, rate: u64, fill_interval: std::time::Duration) -> Self {
        Self {
            capacity,
            rate,
            fill_interval,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Refills from elapsed time, then tries to take one token.
    ///
    /// Returns `false` when the bucket is empty; callers surface that as a
    /// rate-limit error and retry later.
    pub fn try_acquire(&self) -> Result<bool, TokenBucketError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| TokenBucketError::Internal("Mutex poisoned".into()))?;

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill);
        let intervals = elapsed.as_secs_f64() / self.fill_interval.as_secs_f64();
        let to_add = (intervals * self.rate as f64) as u64;

        if to_add > 0 {
            state.tokens = state.tokens.saturating_add(to_add).min(self.capacity);
            state.last_refill = now;
        }

        if state.tokens > 0 {
            state.tokens -= 1;
            Ok(true)
        } else {
            trace!(capacity = self.capacity, rate = self.rate, "admission rejected");
            Ok(false)
        }
    }

    /// Current token count, for diagnostics.
    pub fn tokens(&self) -> Result<u64, TokenBucketError> {
        let state = self
            .state
            .lock()
            .map_err(|_| TokenBucketError::Internal("Mutex poisoned".into()))?;
        Ok(state.tokens)
    }
}
