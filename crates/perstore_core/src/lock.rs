//! Pessimistic lock table.
//!
//! Pessimistic lock modes are tracked in a factory-wide table; a lock
//! is held by exactly one session from acquisition until that session
//! commits, rolls back or is dropped. Optimistic modes never appear
//! here; they are verified against entity versions at commit.

use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use crate::types::{CollectionId, SessionId};
use parking_lot::{Condvar, Mutex};
use perstore_api::{LockMode, Timeout};
use std::collections::HashMap;
use std::time::Instant;
use tracing::trace;

/// The result of a lock acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// The lock was acquired (or upgraded in place).
    Acquired,
    /// The session already held a lock at least this strong; nothing
    /// was done.
    AlreadyHeld,
    /// The entity is locked by another session and the request asked
    /// to skip locked rows.
    Skipped,
}

/// A lock held by a session.
#[derive(Debug, Clone, Copy)]
struct HeldLock {
    owner: SessionId,
    mode: LockMode,
}

/// Factory-wide table of held pessimistic locks.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: Mutex<HashMap<(CollectionId, EntityId), HeldLock>>,
    released: Condvar,
}

impl LockTable {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires a lock on an entity for a session.
    ///
    /// If the session already holds a lock at least as strong, this is
    /// a no-op returning [`LockOutcome::AlreadyHeld`]; a weaker held
    /// lock is upgraded in place. Contention with another session is
    /// resolved by the timeout: `SKIP_LOCKED` returns
    /// [`LockOutcome::Skipped`], `NO_WAIT` fails immediately,
    /// `WAIT_FOREVER` blocks, and a real timeout waits at most that
    /// long before failing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LockTimeout`] when the wait is exhausted.
    pub fn acquire(
        &self,
        owner: SessionId,
        collection: &CollectionId,
        entity_id: EntityId,
        mode: LockMode,
        timeout: Timeout,
    ) -> CoreResult<LockOutcome> {
        debug_assert!(mode.is_pessimistic());

        let key = (collection.clone(), entity_id);
        let deadline = timeout.as_duration().map(|d| Instant::now() + d);
        let mut locks = self.locks.lock();

        loop {
            match locks.get_mut(&key) {
                None => {
                    locks.insert(key, HeldLock { owner, mode });
                    trace!(%owner, %collection, %entity_id, %mode, "lock acquired");
                    return Ok(LockOutcome::Acquired);
                }
                Some(held) if held.owner == owner => {
                    // Weaker request against a stronger held lock is a no-op.
                    if !mode.greater_than(held.mode) {
                        return Ok(LockOutcome::AlreadyHeld);
                    }
                    held.mode = mode;
                    trace!(%owner, %collection, %entity_id, %mode, "lock upgraded");
                    return Ok(LockOutcome::Acquired);
                }
                Some(_) => match timeout {
                    Timeout::SKIP_LOCKED => return Ok(LockOutcome::Skipped),
                    Timeout::NO_WAIT => {
                        return Err(CoreError::LockTimeout { mode, timeout });
                    }
                    Timeout::WAIT_FOREVER => {
                        self.released.wait(&mut locks);
                    }
                    _ => {
                        // Real timeout: wait until the deadline, then fail.
                        let deadline =
                            deadline.ok_or_else(|| CoreError::invalid_operation(format!(
                                "unusable lock timeout: {}",
                                timeout.milliseconds()
                            )))?;
                        if self.released.wait_until(&mut locks, deadline).timed_out() {
                            let still_held = locks
                                .get(&key)
                                .is_some_and(|held| held.owner != owner);
                            if still_held {
                                return Err(CoreError::LockTimeout { mode, timeout });
                            }
                        }
                    }
                },
            }
        }
    }

    /// Returns the lock mode a session holds on an entity, if any.
    #[must_use]
    pub fn held_mode(
        &self,
        owner: SessionId,
        collection: &CollectionId,
        entity_id: EntityId,
    ) -> Option<LockMode> {
        let locks = self.locks.lock();
        locks
            .get(&(collection.clone(), entity_id))
            .filter(|held| held.owner == owner)
            .map(|held| held.mode)
    }

    /// Checks if an entity is locked by a session other than `owner`.
    #[must_use]
    pub fn is_locked_by_other(
        &self,
        owner: SessionId,
        collection: &CollectionId,
        entity_id: EntityId,
    ) -> bool {
        let locks = self.locks.lock();
        locks
            .get(&(collection.clone(), entity_id))
            .is_some_and(|held| held.owner != owner)
    }

    /// Releases a single lock held by a session, waking waiters.
    ///
    /// A no-op when the lock is not held, or is held by another
    /// session.
    pub fn release(&self, owner: SessionId, collection: &CollectionId, entity_id: EntityId) {
        let mut locks = self.locks.lock();
        let key = (collection.clone(), entity_id);
        if locks.get(&key).is_some_and(|held| held.owner == owner) {
            locks.remove(&key);
            trace!(%owner, %collection, %entity_id, "lock released");
            self.released.notify_all();
        }
    }

    /// Releases every lock held by a session, waking waiters.
    pub fn release_all(&self, owner: SessionId) {
        let mut locks = self.locks.lock();
        let before = locks.len();
        locks.retain(|_, held| held.owner != owner);
        if locks.len() != before {
            trace!(%owner, released = before - locks.len(), "locks released");
            self.released.notify_all();
        }
    }

    /// Returns the number of held locks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// Checks if no locks are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}
