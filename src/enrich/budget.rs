//! Session budget for metered remote calls
//!
//! Every remote route lookup must take a unit from the [`BudgetGuard`]
//! before it is issued. The counter only ever grows; a new session (process)
//! starts from zero.

use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::warn;

/// Default ceiling for metered calls per session
pub const DEFAULT_MAX_API_CALLS: u32 = 200;

/// Point-in-time view of the budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BudgetStatus {
    pub ceiling: u32,
    pub consumed: u32,
    pub remaining: u32,
    /// Calls that were charged but did not produce a route
    pub failed_calls: u32,
}

/// Process-wide call counter with a fixed ceiling
///
/// Shared by reference between all enrichment workers; all mutation goes
/// through atomic read-modify-write operations.
#[derive(Debug)]
pub struct BudgetGuard {
    ceiling: u32,
    consumed: AtomicU32,
    failed_calls: AtomicU32,
}

impl BudgetGuard {
    pub fn new(ceiling: u32) -> Self {
        Self {
            ceiling,
            consumed: AtomicU32::new(0),
            failed_calls: AtomicU32::new(0),
        }
    }

    /// Take one unit of budget
    ///
    /// Returns `false` once `ceiling` units have been taken; from then on it
    /// keeps returning `false` for the rest of the session.
    pub fn try_consume(&self) -> bool {
        self.consumed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |consumed| {
                (consumed < self.ceiling).then_some(consumed + 1)
            })
            .is_ok()
    }

    /// Mark the whole budget as spent (the remote side told us to stop)
    pub fn exhaust(&self) {
        let before = self.consumed.fetch_max(self.ceiling, Ordering::AcqRel);
        if before < self.ceiling {
            warn!(
                "Remote budget exhausted early: {} of {} calls used",
                before, self.ceiling
            );
        }
    }

    /// Record that a charged call failed
    pub fn record_failure(&self) {
        self.failed_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn consumed(&self) -> u32 {
        self.consumed.load(Ordering::Acquire)
    }

    pub fn remaining(&self) -> u32 {
        self.ceiling.saturating_sub(self.consumed())
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    pub fn status(&self) -> BudgetStatus {
        let consumed = self.consumed();
        BudgetStatus {
            ceiling: self.ceiling,
            consumed,
            remaining: self.ceiling.saturating_sub(consumed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
        }
    }
}

impl Default for BudgetGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_API_CALLS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_consume_up_to_ceiling() {
        let budget = BudgetGuard::new(3);
        assert!(budget.try_consume());
        assert!(budget.try_consume());
        assert!(budget.try_consume());
        assert!(!budget.try_consume());
        assert!(!budget.try_consume());
        assert_eq!(budget.consumed(), 3);
        assert!(budget.is_exhausted());
    }

    #[test]
    fn test_zero_ceiling() {
        let budget = BudgetGuard::new(0);
        assert!(!budget.try_consume());
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn test_exhaust() {
        let budget = BudgetGuard::new(10);
        assert!(budget.try_consume());
        budget.exhaust();
        assert!(!budget.try_consume());
        assert_eq!(budget.consumed(), 10);
    }

    #[test]
    fn test_concurrent_consumers_never_exceed_ceiling() {
        let budget = Arc::new(BudgetGuard::new(100));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let budget = budget.clone();
                std::thread::spawn(move || (0..50).filter(|_| budget.try_consume()).count())
            })
            .collect();

        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 100);
        assert_eq!(budget.consumed(), 100);
    }

    #[test]
    fn test_status() {
        let budget = BudgetGuard::new(5);
        budget.try_consume();
        budget.record_failure();

        let status = budget.status();
        assert_eq!(status.consumed, 1);
        assert_eq!(status.remaining, 4);
        assert_eq!(status.failed_calls, 1);
    }
}
