//! Global admission pacing.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Leaky-bucket pacer shared by every request task.
///
/// Slots are spaced `1 / limit_per_second` apart, so bursts are smoothed by
/// delay instead of being rejected. Callers only ever wait; acquisition
/// cannot fail.
pub struct LeakyBucket {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl LeakyBucket {
    /// Create a pacer admitting `limit_per_second` requests per second.
    ///
    /// The limit must be nonzero; the configuration layer validates this
    /// before construction.
    pub fn new(limit_per_second: u32) -> Self {
        Self {
            interval: Duration::from_secs(1) / limit_per_second,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Wait until the bucket admits one more request.
    ///
    /// The lock is held only to claim a slot; the wait itself happens
    /// outside it, so concurrent tasks queue on evenly spaced slots.
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().expect("throttle mutex poisoned");
            let now = Instant::now();
            let slot = if *next > now { *next } else { now };
            *next = slot + self.interval;
            slot
        };
        tokio::time::sleep_until(slot.into()).await;
    }
}
