//! Token bucket rate limiter

use super::config::RateLimitConfig;
use crate::error::BulkheadResult;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Token bucket rate limiter for one named upstream
///
/// Tokens refill continuously at the configured rate up to the burst
/// capacity; each permitted request consumes one or more tokens. The bucket
/// state lives behind a single plain mutex shared by the suspending
/// ([`RateLimiter::acquire`]) and thread-blocking
/// ([`RateLimiter::acquire_blocking`]) entry points, so a process mixing both
/// calling styles observes one consistent token count. The mutex is never
/// held across a sleep or an await point.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    /// Tokens per second
    rate: f64,
    /// Bucket capacity
    burst: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    /// Current tokens available, clamped to [0, burst]
    tokens: f64,
    /// Last refill time
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// Fails with a configuration error if the derived rate or the burst
    /// capacity is not positive.
    pub fn new(config: RateLimitConfig) -> BulkheadResult<Self> {
        config.validate()?;
        let rate = config.rate();
        let burst = config.effective_burst() as f64;
        Ok(Self {
            config,
            rate,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        })
    }

    /// Get the current configuration
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// The bucket capacity
    pub fn burst(&self) -> f64 {
        self.burst
    }

    /// Acquire `tokens` units, suspending cooperatively while the bucket
    /// refills
    ///
    /// Returns true once the tokens were deducted. If `timeout` is supplied
    /// and the projected wait for the next attempt would exceed the remaining
    /// budget, returns false without consuming anything.
    pub async fn acquire(&self, tokens: u32, timeout: Option<Duration>) -> bool {
        if !self.satisfiable(tokens) {
            return false;
        }
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            match self.try_take(tokens as f64) {
                Ok(()) => return true,
                Err(wait) => {
                    if Self::budget_exceeded(deadline, wait) {
                        return false;
                    }
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Acquire `tokens` units from a thread that is not on the async runtime
    ///
    /// Same contract as [`RateLimiter::acquire`], but waits by sleeping the
    /// calling thread. The bucket mutex is released before every sleep so
    /// concurrent callers are never starved.
    pub fn acquire_blocking(&self, tokens: u32, timeout: Option<Duration>) -> bool {
        if !self.satisfiable(tokens) {
            return false;
        }
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            match self.try_take(tokens as f64) {
                Ok(()) => return true,
                Err(wait) => {
                    if Self::budget_exceeded(deadline, wait) {
                        return false;
                    }
                    std::thread::sleep(wait);
                }
            }
        }
    }

    /// Single attempt without waiting
    pub fn try_acquire(&self, tokens: u32) -> bool {
        self.satisfiable(tokens) && self.try_take(tokens as f64).is_ok()
    }

    /// Refill and return the current token level without consuming
    pub fn available_tokens(&self) -> f64 {
        let mut state = self.state.lock();
        self.refill(&mut state);
        state.tokens
    }

    /// Refill to full burst and reinitialize the refill timestamp
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.tokens = self.burst;
        state.last_refill = Instant::now();
    }

    /// One refill-and-deduct attempt; on shortfall returns the wait until
    /// enough tokens will have accrued
    fn try_take(&self, needed: f64) -> Result<(), Duration> {
        let mut state = self.state.lock();
        self.refill(&mut state);

        if state.tokens >= needed {
            state.tokens -= needed;
            debug!(
                "rate limiter: acquired {} token(s), {:.1} remaining",
                needed, state.tokens
            );
            Ok(())
        } else {
            let missing = needed - state.tokens;
            Err(Duration::from_secs_f64(missing / self.rate))
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
        state.last_refill = now;
    }

    /// A request above the bucket capacity can never be satisfied
    fn satisfiable(&self, tokens: u32) -> bool {
        if tokens as f64 > self.burst {
            warn!(
                "rate limiter: requested {} tokens but burst capacity is {}",
                tokens, self.burst
            );
            return false;
        }
        true
    }

    fn budget_exceeded(deadline: Option<Instant>, wait: Duration) -> bool {
        match deadline {
            Some(deadline) => {
                let projected = Instant::now() + wait;
                if projected > deadline {
                    warn!(
                        "rate limiter: projected wait {:.2}s exceeds remaining budget",
                        wait.as_secs_f64()
                    );
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }
}
