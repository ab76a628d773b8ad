//! Cancelable one-shot timer
//!
//! Arms a single deferred callback after a delay. Cancellation is by
//! generation token: arming or cancelling bumps the generation, and a fire
//! whose token no longer matches must be ignored by the consumer. The same
//! scheduler backs both the reconnection timer and the health-check timer.

use std::time::Duration;

/// A one-shot timer that hands its callback a generation token.
///
/// The timer itself never blocks; the armed callback runs on a spawned tokio
/// task after the delay. Consumers check the token against [`OneShot::is_current`]
/// before acting, which makes stale fires from superseded timers harmless.
#[derive(Debug, Default)]
pub(crate) struct OneShot {
    generation: u64,
}

impl OneShot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer. Any previously armed fire becomes stale.
    pub fn arm<F>(&mut self, delay: Duration, fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.generation += 1;
        let generation = self.generation;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire(generation);
        });
        generation
    }

    /// Invalidate any armed fire without scheduling a new one.
    pub fn cancel(&mut self) {
        self.generation += 1;
    }

    /// Whether a fired token still corresponds to the latest arming.
    pub fn is_current(&self, token: u64) -> bool {
        self.generation == token
    }
}
