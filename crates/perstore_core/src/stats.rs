//! Factory statistics and telemetry.
//!
//! Counters for monitoring session, cache and lock behavior. All
//! counters are atomic and can be read while operations are in
//! progress; values are monotonically increasing.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics collected by a session factory.
#[derive(Debug, Default)]
pub struct FactoryStats {
    /// Sessions opened.
    sessions_opened: AtomicU64,
    /// Flush operations executed.
    flushes: AtomicU64,
    /// Entities inserted.
    entity_inserts: AtomicU64,
    /// Entities updated.
    entity_updates: AtomicU64,
    /// Entities deleted.
    entity_deletes: AtomicU64,
    /// Queries executed.
    queries: AtomicU64,
    /// Second-level cache hits.
    cache_hits: AtomicU64,
    /// Second-level cache misses.
    cache_misses: AtomicU64,
    /// Second-level cache puts.
    cache_puts: AtomicU64,
    /// Pessimistic lock acquisitions that timed out.
    lock_timeouts: AtomicU64,
    /// Commits that failed optimistic version verification.
    optimistic_failures: AtomicU64,
}

impl FactoryStats {
    /// Creates a zeroed stats instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self, inserts: u64, updates: u64, deletes: u64) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.entity_inserts.fetch_add(inserts, Ordering::Relaxed);
        self.entity_updates.fetch_add(updates, Ordering::Relaxed);
        self.entity_deletes.fetch_add(deletes, Ordering::Relaxed);
    }

    pub(crate) fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_put(&self) {
        self.cache_puts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lock_timeout(&self) {
        self.lock_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_optimistic_failure(&self) {
        self.optimistic_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            entity_inserts: self.entity_inserts.load(Ordering::Relaxed),
            entity_updates: self.entity_updates.load(Ordering::Relaxed),
            entity_deletes: self.entity_deletes.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_puts: self.cache_puts.load(Ordering::Relaxed),
            lock_timeouts: self.lock_timeouts.load(Ordering::Relaxed),
            optimistic_failures: self.optimistic_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time view of factory statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Sessions opened.
    pub sessions_opened: u64,
    /// Flush operations executed.
    pub flushes: u64,
    /// Entities inserted.
    pub entity_inserts: u64,
    /// Entities updated.
    pub entity_updates: u64,
    /// Entities deleted.
    pub entity_deletes: u64,
    /// Queries executed.
    pub queries: u64,
    /// Second-level cache hits.
    pub cache_hits: u64,
    /// Second-level cache misses.
    pub cache_misses: u64,
    /// Second-level cache puts.
    pub cache_puts: u64,
    /// Pessimistic lock acquisitions that timed out.
    pub lock_timeouts: u64,
    /// Commits that failed optimistic version verification.
    pub optimistic_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = FactoryStats::new();
        stats.record_session_opened();
        stats.record_flush(2, 1, 0);
        stats.record_flush(0, 0, 3);
        stats.record_cache_hit();
        stats.record_cache_miss();
        stats.record_cache_miss();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.sessions_opened, 1);
        assert_eq!(snapshot.flushes, 2);
        assert_eq!(snapshot.entity_inserts, 2);
        assert_eq!(snapshot.entity_updates, 1);
        assert_eq!(snapshot.entity_deletes, 3);
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.cache_misses, 2);
    }
}
