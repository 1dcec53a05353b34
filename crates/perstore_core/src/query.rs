//! Typed queries over a collection.
//!
//! Queries are expressed with host-language predicates and comparators
//! rather than a query string: filter with closures, order with a
//! comparator, paginate with first/max. A query scans the committed
//! records of one collection, overlaying the session's managed state so
//! unflushed changes and pending removals are reflected.
//!
//! Depending on the session's [`FlushMode`](perstore_api::FlushMode),
//! pending changes are flushed before the scan so the query sees them.

use crate::entity::{decode_entity, Entity, EntityId};
use crate::error::CoreResult;
use crate::lock::LockOutcome;
use crate::session::{EntityEntry, EntityStatus, Session};
use crate::types::CollectionId;
use perstore_api::{CacheMode, LockMode, LockOptions, QueryError};
use std::cmp::Ordering;

/// A typed query over the entities of one collection.
///
/// Built fluently from [`Session::query`]:
///
/// ```rust,ignore
/// let admins: Vec<User> = session
///     .query::<User>()
///     .filter(|u| u.is_admin)
///     .order_by_key(|u| u.name.clone())
///     .max_results(20)
///     .list()?;
/// ```
///
/// Entities returned by [`Query::list`] and [`Query::unique`] become
/// managed by the session; [`Query::count`] only counts.
pub struct Query<'s, T: Entity> {
    session: &'s mut Session,
    predicates: Vec<Box<dyn Fn(&T) -> bool>>,
    order: Option<Box<dyn Fn(&T, &T) -> Ordering>>,
    first_result: usize,
    max_results: Option<usize>,
    lock: LockOptions,
    cache_mode: Option<CacheMode>,
}

impl<'s, T: Entity> Query<'s, T> {
    pub(crate) fn new(session: &'s mut Session) -> Self {
        Self {
            session,
            predicates: Vec::new(),
            order: None,
            first_result: 0,
            max_results: None,
            lock: LockOptions::default(),
            cache_mode: None,
        }
    }

    /// Adds a filter predicate. Multiple predicates are conjoined.
    #[must_use]
    pub fn filter(mut self, predicate: impl Fn(&T) -> bool + 'static) -> Self {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// Orders results with a comparator.
    #[must_use]
    pub fn order_by(mut self, compare: impl Fn(&T, &T) -> Ordering + 'static) -> Self {
        self.order = Some(Box::new(compare));
        self
    }

    /// Orders results ascending by an extracted key.
    #[must_use]
    pub fn order_by_key<K: Ord>(self, key: impl Fn(&T) -> K + 'static) -> Self {
        self.order_by(move |a, b| key(a).cmp(&key(b)))
    }

    /// Skips the first `n` results.
    #[must_use]
    pub fn first_result(mut self, n: usize) -> Self {
        self.first_result = n;
        self
    }

    /// Caps the number of results returned.
    #[must_use]
    pub fn max_results(mut self, n: usize) -> Self {
        self.max_results = Some(n);
        self
    }

    /// Sets the lock to acquire on each returned entity.
    ///
    /// With a skip-locked mode, rows locked by other sessions are
    /// silently left out of the result.
    #[must_use]
    pub fn lock(mut self, lock: LockOptions) -> Self {
        self.lock = lock;
        self
    }

    /// Sets the lock mode, keeping the configured timeout.
    #[must_use]
    pub fn lock_mode(mut self, mode: LockMode) -> Self {
        self.lock = self.lock.mode(mode);
        self
    }

    /// Overrides the session's cache mode for this query.
    #[must_use]
    pub fn cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = Some(mode);
        self
    }

    /// Executes the query and returns all matching entities.
    ///
    /// Matches become managed by the session. Ordering is applied
    /// before pagination.
    pub fn list(mut self) -> CoreResult<Vec<T>> {
        let mut results = self.collect(true)?;
        if let Some(compare) = &self.order {
            results.sort_by(|a, b| compare(a, b));
        }
        let results = results
            .into_iter()
            .skip(self.first_result)
            .take(self.max_results.unwrap_or(usize::MAX))
            .collect();
        self.session.inner.stats.record_query();
        Ok(results)
    }

    /// Executes the query expecting at most one match.
    ///
    /// # Errors
    ///
    /// Fails with a query error if more than one entity matches.
    pub fn unique(self) -> CoreResult<Option<T>> {
        let mut results = self.list()?;
        if results.len() > 1 {
            return Err(QueryError::for_query(
                format!("query returned {} results, expected at most one", results.len()),
                T::COLLECTION,
            )
            .into());
        }
        Ok(results.pop())
    }

    /// Counts matching entities without managing or paginating them.
    pub fn count(mut self) -> CoreResult<usize> {
        let results = self.collect(false)?;
        self.session.inner.stats.record_query();
        Ok(results.len())
    }

    fn collect(&mut self, manage: bool) -> CoreResult<Vec<T>> {
        let collection = CollectionId::new(T::COLLECTION);
        self.session.auto_flush_before_query(&collection)?;
        let cache_mode = self.cache_mode.unwrap_or(self.session.cache_mode());

        let rows = self.session.inner.store.scan(&collection);
        let mut results = Vec::new();

        for (entity_id, record) in rows {
            // The session's managed state wins over the committed
            // record; pending removals drop out entirely.
            let (payload, from_store) = match self.session.context.get(&collection, entity_id) {
                Some(entry) if entry.status == EntityStatus::Removed => continue,
                Some(entry) => (entry.current.clone(), false),
                None => (record.payload.clone(), true),
            };
            let entity: T = decode_entity(&payload)?;
            if !self.predicates.iter().all(|matches| matches(&entity)) {
                continue;
            }

            if manage {
                if self.lock.mode.is_pessimistic()
                    && self.lock_row(&collection, entity_id)? == LockOutcome::Skipped
                {
                    continue;
                }
                if from_store {
                    if cache_mode.is_put_enabled() {
                        self.session.inner.cache.put(
                            &collection,
                            entity_id,
                            record.payload.clone(),
                            record.version,
                        );
                    }
                    let entry =
                        EntityEntry::loaded(record.payload, record.version, record.natural_id);
                    self.session.context.insert(collection.clone(), entity_id, entry);
                }
                self.session
                    .note_lock_flags(&collection, entity_id, self.lock.mode);
            }

            results.push(entity);
        }

        Ok(results)
    }

    fn lock_row(&self, collection: &CollectionId, entity_id: EntityId) -> CoreResult<LockOutcome> {
        self.session.acquire_table_lock(collection, entity_id, self.lock)
    }
}
