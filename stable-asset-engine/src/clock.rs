use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of the current time (unix seconds or block height) for amplification
/// ramps and quota windows.
pub trait Clock {
    fn now(&self) -> u64;
}

impl<C: Clock> Clock for Arc<C> {
    fn now(&self) -> u64 {
        self.as_ref().now()
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, delta: u64) {
        self.0.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}
