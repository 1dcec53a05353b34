//! Stress tests for perstore.
//!
//! These tests verify behavior under heavy load and concurrent
//! sessions.

use crate::fixtures::TestUser;
use perstore_core::SessionFactory;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations (version conflicts included).
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent threads.
    pub threads: usize,
    /// Sessions each thread runs.
    pub sessions_per_thread: usize,
    /// Entities each session touches.
    pub entities_per_session: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            sessions_per_thread: 25,
            entities_per_session: 10,
        }
    }
}

/// Runs concurrent insert-heavy sessions against one factory.
///
/// Each thread opens sessions in a loop, persists a batch of fresh
/// users and commits. All commits are expected to succeed since the
/// entity IDs never collide.
pub fn run_concurrent_inserts(factory: &Arc<SessionFactory>, config: &StressConfig) -> StressResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|_| {
            let factory = Arc::clone(factory);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let config = config.clone();
            thread::spawn(move || {
                for _ in 0..config.sessions_per_thread {
                    let run = factory.open_session().and_then(|mut session| {
                        for n in 0..config.entities_per_session {
                            session.persist(&TestUser::numbered(n))?;
                        }
                        session.commit()
                    });
                    match run {
                        Ok(()) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("stress thread panicked");
    }

    StressResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Runs concurrent sessions that all update the same entity.
///
/// Conflicting commits fail with stale-entity errors; the committed
/// version afterwards equals one plus the number of successful updates.
pub fn run_contended_updates(
    factory: &Arc<SessionFactory>,
    target: &TestUser,
    config: &StressConfig,
) -> StressResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|_| {
            let factory = Arc::clone(factory);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let sessions = config.sessions_per_thread;
            let target_id = target.id;
            thread::spawn(move || {
                for _ in 0..sessions {
                    let run = factory.open_session().and_then(|mut session| {
                        session.modify::<TestUser>(target_id, |u| u.admin = !u.admin)?;
                        session.commit()
                    });
                    match run {
                        Ok(()) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("stress thread panicked");
    }

    StressResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}
