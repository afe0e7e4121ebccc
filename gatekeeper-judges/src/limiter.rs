// gatekeeper-judges/src/limiter.rs
// ============================================================================
// Module: Judge Concurrency Limiter
// Description: Hand-rolled counting semaphore bounding concurrent in-flight
//              requests to a single judge endpoint.
// Purpose: Prevent an evaluation surge from exhausting an upstream judge
//          endpoint's own concurrency budget.
// Dependencies: std::sync
// ============================================================================

//! ## Overview
//! No dedicated semaphore crate is introduced here; the shape mirrors the
//! teacher's `Mutex`-guarded-state rate limiter (`decision-gate-mcp::server::RateLimiter`)
//! generalized from a time-windowed bucket to a simple held-permit count.

use std::sync::Condvar;
use std::sync::Mutex;

/// A counting semaphore bounding concurrent in-flight requests.
pub struct ConcurrencyLimiter {
    /// Maximum number of permits that may be held at once.
    capacity: usize,
    /// Number of permits currently held.
    held: Mutex<usize>,
    /// Notified whenever a permit is released.
    released: Condvar,
}

impl ConcurrencyLimiter {
    /// Creates a limiter allowing up to `capacity` concurrent permits.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            held: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    /// Blocks until a permit is available, then returns a guard that
    /// releases it on drop.
    #[must_use]
    pub fn acquire(&self) -> LimiterPermit<'_> {
        let mut held = self.held.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        while *held >= self.capacity {
            held = self.released.wait(held).unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        *held += 1;
        LimiterPermit {
            limiter: self,
        }
    }
}

/// An acquired permit; releases automatically on drop.
pub struct LimiterPermit<'a> {
    /// The limiter this permit was acquired from.
    limiter: &'a ConcurrencyLimiter,
}

impl Drop for LimiterPermit<'_> {
    fn drop(&mut self) {
        if let Ok(mut held) = self.limiter.held.lock() {
            *held = held.saturating_sub(1);
        }
        self.limiter.released.notify_one();
    }
}
