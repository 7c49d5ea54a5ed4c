//! Evenly spaced rate limiting for outbound calls.
//!
//! Allows `rate` acquisitions per `period`, handed out one slot at a time.
//! Slots are tracked as instants, so the limiter never needs fractional
//! token counts.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};

/// Spaces callers `period / rate` apart.
#[derive(Debug)]
pub struct RateLimiter {
    spacing: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    /// Creates a limiter for `rate` calls per `period`. A zero rate is treated as one.
    #[must_use]
    pub fn new(rate: u32, period: Duration) -> Self {
        Self {
            spacing: period / rate.max(1),
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Time between two consecutive slots.
    #[must_use]
    pub const fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Waits for the next free slot.
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let slot = (*next).max(Instant::now());
            *next = slot + self.spacing;
            slot
        };
        sleep_until(slot).await;
    }
}
