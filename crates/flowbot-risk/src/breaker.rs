//! Consecutive-failure circuit breaker.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::Mutex;
use tracing::error;

/// Trips after `threshold` consecutive fatal execution failures.
///
/// A successful execution resets the streak. Once tripped the breaker stays
/// tripped until `reset`; the first trip reason is kept. A threshold of zero
/// disables the breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    streak: AtomicU32,
    tripped: AtomicBool,
    trip_reason: Mutex<Option<String>>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            streak: AtomicU32::new(0),
            tripped: AtomicBool::new(false),
            trip_reason: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.threshold > 0
    }

    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.streak.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn trip_reason(&self) -> Option<String> {
        self.trip_reason.lock().clone()
    }

    pub fn record_success(&self) {
        self.streak.store(0, Ordering::Release);
    }

    /// Record a fatal failure. Returns true if this call tripped the breaker.
    pub fn record_fatal(&self, reason: &str) -> bool {
        let streak = self.streak.fetch_add(1, Ordering::AcqRel) + 1;
        if !self.is_enabled() || streak < self.threshold {
            return false;
        }
        if self.tripped.swap(true, Ordering::AcqRel) {
            return false;
        }
        *self.trip_reason.lock() = Some(reason.to_string());
        error!(streak, reason, "Circuit breaker tripped");
        true
    }

    pub fn reset(&self) {
        self.streak.store(0, Ordering::Release);
        self.tripped.store(false, Ordering::Release);
        *self.trip_reason.lock() = None;
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trips_after_threshold() {
        let breaker = CircuitBreaker::new(3);

        assert!(!breaker.record_fatal("rejected"));
        assert!(!breaker.record_fatal("rejected"));
        assert!(breaker.record_fatal("insufficient balance"));
        assert!(breaker.is_tripped());
        assert_eq!(breaker.trip_reason().as_deref(), Some("insufficient balance"));
    }

    #[test]
    fn test_success_resets_streak() {
        let breaker = CircuitBreaker::new(2);

        breaker.record_fatal("a");
        breaker.record_success();
        assert!(!breaker.record_fatal("b"));
        assert!(!breaker.is_tripped());
        assert_eq!(breaker.consecutive_failures(), 1);
    }

    #[test]
    fn test_first_reason_is_kept() {
        let breaker = CircuitBreaker::new(1);

        assert!(breaker.record_fatal("first"));
        assert!(!breaker.record_fatal("second"));
        assert_eq!(breaker.trip_reason().as_deref(), Some("first"));
    }

    #[test]
    fn test_disabled_never_trips() {
        let breaker = CircuitBreaker::disabled();
        for _ in 0..100 {
            assert!(!breaker.record_fatal("x"));
        }
        assert!(!breaker.is_tripped());
    }

    #[test]
    fn test_reset() {
        let breaker = CircuitBreaker::new(1);
        breaker.record_fatal("x");
        breaker.reset();
        assert!(!breaker.is_tripped());
        assert!(breaker.trip_reason().is_none());
    }
}
