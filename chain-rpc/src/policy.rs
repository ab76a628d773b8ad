//! Reconnection backoff policies
//!
//! A policy is a pure function from the retry attempt count to either the
//! next wait duration or the decision to stop retrying. Policies carry no
//! mutable state and may be shared across engine instances.

use std::time::Duration;

/// Maps a retry attempt (starting at 0) to the delay before the next
/// connection attempt, or `None` to give up.
pub trait ReconnectionPolicy: Send + Sync + 'static {
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

/// Exponential backoff: `delay = multiplier * e^attempt`.
///
/// Never gives up, so the engine retries forever with growing delay.
#[derive(Debug, Clone)]
pub struct ExponentialReconnection {
    multiplier: f64,
}

impl ExponentialReconnection {
    pub fn new(multiplier: f64) -> Self {
        Self { multiplier }
    }
}

impl Default for ExponentialReconnection {
    fn default() -> Self {
        Self { multiplier: 0.3 }
    }
}

impl ReconnectionPolicy for ExponentialReconnection {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        let seconds = self.multiplier * f64::from(attempt).exp();
        Some(Duration::from_secs_f64(seconds))
    }
}

/// Gives up after a fixed number of attempts, delegating delays to an inner
/// policy until then.
pub struct LimitedReconnection<P> {
    inner: P,
    max_attempts: u32,
}

impl<P: ReconnectionPolicy> LimitedReconnection<P> {
    pub fn new(inner: P, max_attempts: u32) -> Self {
        Self {
            inner,
            max_attempts,
        }
    }
}

impl<P: ReconnectionPolicy> ReconnectionPolicy for LimitedReconnection<P> {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            None
        } else {
            self.inner.next_delay(attempt)
        }
    }
}
