//! A progress-bar collaborator the engine reports totals/increments to via
//! `incr(n)`/`add_total(n)`, mirroring `kiterunner/config.go`'s
//! `ProgressBar` interface.

use std::sync::atomic::{AtomicI64, Ordering};

pub trait ProgressBar: Send + Sync {
    fn incr(&self, n: i64);
    fn add_total(&self, n: i64);
}

/// A no-op implementation, used when no progress reporting is requested
/// (mirrors the original's `NullProgressBar`).
#[derive(Debug, Default)]
pub struct NullProgressBar;

impl ProgressBar for NullProgressBar {
    fn incr(&self, _n: i64) {}
    fn add_total(&self, _n: i64) {}
}

/// An in-memory counter implementation, useful for tests and for a simple
/// textual progress line.
#[derive(Debug, Default)]
pub struct CounterProgressBar {
    pub current: AtomicI64,
    pub total: AtomicI64,
}

impl ProgressBar for CounterProgressBar {
    fn incr(&self, n: i64) {
        self.current.fetch_add(n, Ordering::Relaxed);
    }

    fn add_total(&self, n: i64) {
        self.total.fetch_add(n, Ordering::Relaxed);
    }
}

impl CounterProgressBar {
    pub fn snapshot(&self) -> (i64, i64) {
        (
            self.current.load(Ordering::Relaxed),
            self.total.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates_incr_and_total() {
        let bar = CounterProgressBar::default();
        bar.add_total(10);
        bar.incr(3);
        bar.incr(2);
        assert_eq!(bar.snapshot(), (5, 10));
    }
}
