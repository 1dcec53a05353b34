//! Sessions: the unit of work.
//!
//! A [`Session`] tracks entities in a persistence context, batches
//! their changes and writes them to the shared store on flush. Each
//! session represents one unit of work: open it, load and change
//! entities, then either commit or roll back. Sessions are cheap to
//! open and are not meant to outlive the task that opened them.
//!
//! Writes become visible to other sessions at flush; pessimistic locks
//! and optimistic version checks (see [`LockMode`]) guard against
//! conflicting sessions in between.

mod context;

pub(crate) use context::{EntityEntry, EntityStatus, PersistenceContext};

use crate::entity::{decode_entity, encode_entity, Entity, EntityId};
use crate::error::{CoreError, CoreResult};
use crate::factory::FactoryInner;
use crate::lock::LockOutcome;
use crate::query::Query;
use crate::store::FlushAction;
use crate::types::{CollectionId, SessionId, Version};
use perstore_api::{CacheMode, FlushMode, LockMode, LockOptions};
use std::sync::Arc;
use tracing::debug;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Open and accepting operations.
    Active,
    /// Committed; all further operations fail.
    Committed,
    /// Rolled back or failed; all further operations fail.
    Aborted,
}

/// Options for a single [`Session::find_with`] call.
///
/// Overrides the session defaults for one lookup: a lock to acquire on
/// the loaded entity and a cache interaction mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct FindOptions {
    /// Lock to acquire on the found entity.
    pub lock: LockOptions,
    /// Cache mode for this lookup; `None` uses the session's mode.
    pub cache_mode: Option<CacheMode>,
}

impl FindOptions {
    /// Creates options with no lock and the session's cache mode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the lock request.
    #[must_use]
    pub const fn lock(mut self, lock: LockOptions) -> Self {
        self.lock = lock;
        self
    }

    /// Sets the lock mode, keeping the configured timeout.
    #[must_use]
    pub const fn lock_mode(mut self, mode: LockMode) -> Self {
        self.lock = self.lock.mode(mode);
        self
    }

    /// Overrides the cache mode for this lookup.
    #[must_use]
    pub const fn cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = Some(mode);
        self
    }
}

/// A unit of work against a session factory.
///
/// Entities loaded or persisted through a session become *managed*:
/// the session remembers the state it loaded, detects changes by
/// comparing encoded bytes, and writes inserts, updates and deletes to
/// the store when flushed. [`Session::commit`] flushes (subject to the
/// [`FlushMode`]), verifies optimistic locks and releases pessimistic
/// ones; [`Session::rollback`] discards everything.
///
/// A session is single-threaded. Dropping an active session releases
/// its locks without writing anything.
#[derive(Debug)]
pub struct Session {
    pub(crate) inner: Arc<FactoryInner>,
    pub(crate) id: SessionId,
    state: SessionState,
    flush_mode: FlushMode,
    cache_mode: CacheMode,
    pub(crate) context: PersistenceContext,
}

impl Session {
    pub(crate) fn new(inner: Arc<FactoryInner>, id: SessionId) -> Self {
        let flush_mode = inner.config.default_flush_mode;
        let cache_mode = inner.config.default_cache_mode;
        Self {
            inner,
            id,
            state: SessionState::Active,
            flush_mode,
            cache_mode,
            context: PersistenceContext::new(),
        }
    }

    /// Returns the session's unique ID.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the session's lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the session's flush mode.
    #[must_use]
    pub fn flush_mode(&self) -> FlushMode {
        self.flush_mode
    }

    /// Sets the session's flush mode.
    pub fn set_flush_mode(&mut self, mode: FlushMode) {
        self.flush_mode = mode;
    }

    /// Returns the session's cache mode.
    #[must_use]
    pub fn cache_mode(&self) -> CacheMode {
        self.cache_mode
    }

    /// Sets the session's cache mode.
    pub fn set_cache_mode(&mut self, mode: CacheMode) {
        self.cache_mode = mode;
    }

    fn ensure_active(&self) -> CoreResult<()> {
        self.inner.ensure_open()?;
        match self.state {
            SessionState::Active => Ok(()),
            state => Err(CoreError::invalid_operation(format!(
                "session {} is {state:?}",
                self.id
            ))),
        }
    }

    /// Makes a transient entity managed, scheduling it for insertion
    /// at the next flush.
    ///
    /// If the entity was scheduled for removal earlier in this session,
    /// the removal is cancelled and the given state takes over.
    ///
    /// # Errors
    ///
    /// Returns `EntityExists` if the entity is already managed or
    /// already committed to the store.
    pub fn persist<T: Entity>(&mut self, entity: &T) -> CoreResult<()> {
        self.ensure_active()?;
        let collection = CollectionId::new(T::COLLECTION);
        let entity_id = entity.entity_id();
        let payload = encode_entity(entity)?;
        let natural_id = entity.natural_id();

        if let Some(entry) = self.context.get_mut(&collection, entity_id) {
            if entry.status == EntityStatus::Removed {
                entry.status = if entry.loaded_version.is_some() {
                    EntityStatus::Managed
                } else {
                    EntityStatus::New
                };
                entry.current = payload;
                entry.natural_id = natural_id;
                return Ok(());
            }
            return Err(CoreError::entity_exists(collection, entity_id));
        }
        if self.inner.store.contains(&collection, entity_id) {
            return Err(CoreError::entity_exists(collection, entity_id));
        }
        self.context
            .insert(collection, entity_id, EntityEntry::new_entity(payload, natural_id));
        Ok(())
    }

    /// Finds an entity by ID.
    ///
    /// Resolution order: this session's context, then the second-level
    /// cache, then the committed store. Returns `None` when the entity
    /// doesn't exist or is scheduled for removal in this session.
    pub fn find<T: Entity>(&mut self, entity_id: EntityId) -> CoreResult<Option<T>> {
        self.find_with(entity_id, FindOptions::new())
    }

    /// Finds an entity by ID with an explicit lock request and cache
    /// mode.
    ///
    /// A pessimistic lock is acquired before the entity is read, so the
    /// returned state cannot be overwritten by another session while
    /// this one holds it. A skip-locked request that finds the entity
    /// locked elsewhere returns `None`.
    pub fn find_with<T: Entity>(
        &mut self,
        entity_id: EntityId,
        options: FindOptions,
    ) -> CoreResult<Option<T>> {
        self.ensure_active()?;
        let collection = CollectionId::new(T::COLLECTION);
        let cache_mode = options.cache_mode.unwrap_or(self.cache_mode);
        let lock = options.lock;

        if let Some(entry) = self.context.get(&collection, entity_id) {
            if entry.status == EntityStatus::Removed {
                return Ok(None);
            }
            let entity: T = decode_entity(&entry.current)?;
            if self.acquire_entry_lock(&collection, entity_id, lock)? == LockOutcome::Skipped {
                return Ok(None);
            }
            return Ok(Some(entity));
        }

        // Lock before reading, so the loaded state stays current for
        // as long as the lock is held. A lock taken here for an entity
        // that turns out not to exist must be handed back, or the id
        // stays locked against other sessions until this one ends.
        let mut lock_taken_here = false;
        if lock.mode.is_pessimistic() {
            let held_before = self
                .inner
                .locks
                .held_mode(self.id, &collection, entity_id)
                .is_some();
            if self.acquire_table_lock(&collection, entity_id, lock)? == LockOutcome::Skipped {
                return Ok(None);
            }
            lock_taken_here = !held_before;
        }

        if cache_mode.is_get_enabled() {
            if let Some(cached) = self.inner.cache.get(&collection, entity_id) {
                let entity: T = decode_entity(&cached.payload)?;
                let entry =
                    EntityEntry::loaded(cached.payload, cached.version, entity.natural_id());
                self.context.insert(collection.clone(), entity_id, entry);
                self.note_lock_flags(&collection, entity_id, lock.mode);
                return Ok(Some(entity));
            }
        }

        match self.inner.store.get(&collection, entity_id) {
            None => {
                if lock_taken_here {
                    self.inner.locks.release(self.id, &collection, entity_id);
                }
                Ok(None)
            }
            Some(record) => {
                if cache_mode.is_put_enabled() {
                    self.inner.cache.put(
                        &collection,
                        entity_id,
                        record.payload.clone(),
                        record.version,
                    );
                }
                let entity: T = decode_entity(&record.payload)?;
                let entry = EntityEntry::loaded(record.payload, record.version, record.natural_id);
                self.context.insert(collection.clone(), entity_id, entry);
                self.note_lock_flags(&collection, entity_id, lock.mode);
                Ok(Some(entity))
            }
        }
    }

    /// Like [`Session::find`], but failing when the entity doesn't
    /// exist.
    pub fn load<T: Entity>(&mut self, entity_id: EntityId) -> CoreResult<T> {
        self.find(entity_id)?.ok_or_else(|| {
            CoreError::entity_not_found(CollectionId::new(T::COLLECTION), entity_id)
        })
    }

    /// Finds an entity by its natural id.
    ///
    /// Pending state in this session wins over the committed index: an
    /// entity persisted or re-keyed but not yet flushed is found under
    /// its pending natural id, and one scheduled for removal is not
    /// found at all.
    pub fn find_by_natural_id<T: Entity>(&mut self, key: &str) -> CoreResult<Option<T>> {
        self.ensure_active()?;
        let collection = CollectionId::new(T::COLLECTION);

        let pending = self.context.iter().find_map(|((c, _), entry)| {
            (c == &collection
                && entry.status != EntityStatus::Removed
                && entry.natural_id.as_deref() == Some(key))
            .then(|| entry.current.clone())
        });
        if let Some(payload) = pending {
            return decode_entity(&payload).map(Some);
        }

        match self.inner.store.resolve_natural_id(&collection, key) {
            Some(entity_id) => {
                // The committed holder may be removed or re-keyed in
                // this session; the pending scan above already said no.
                if self.context.get(&collection, entity_id).is_some() {
                    return Ok(None);
                }
                self.find(entity_id)
            }
            None => Ok(None),
        }
    }

    /// Merges the state of a detached entity into this session.
    ///
    /// The entity's state replaces whatever the session currently
    /// manages for that ID; a transient entity is scheduled for
    /// insertion. Returns the now-managed state.
    pub fn merge<T: Entity>(&mut self, entity: &T) -> CoreResult<T> {
        self.ensure_active()?;
        let collection = CollectionId::new(T::COLLECTION);
        let entity_id = entity.entity_id();
        let payload = encode_entity(entity)?;
        let natural_id = entity.natural_id();

        if let Some(entry) = self.context.get_mut(&collection, entity_id) {
            if entry.status == EntityStatus::Removed {
                return Err(CoreError::invalid_operation(format!(
                    "cannot merge entity {entity_id} scheduled for removal"
                )));
            }
            entry.current = payload.clone();
            entry.natural_id = natural_id;
        } else if let Some(record) = self.inner.store.get(&collection, entity_id) {
            let mut entry = EntityEntry::loaded(record.payload, record.version, record.natural_id);
            entry.current = payload.clone();
            entry.natural_id = natural_id;
            self.context.insert(collection, entity_id, entry);
        } else {
            self.context
                .insert(collection, entity_id, EntityEntry::new_entity(payload.clone(), natural_id));
        }
        decode_entity(&payload)
    }

    /// Loads an entity, applies a mutation and records the new state.
    ///
    /// Returns the mutated entity. The mutation must not change the
    /// entity's ID.
    pub fn modify<T: Entity>(
        &mut self,
        entity_id: EntityId,
        mutate: impl FnOnce(&mut T),
    ) -> CoreResult<T> {
        let mut entity: T = self.load(entity_id)?;
        mutate(&mut entity);
        if entity.entity_id() != entity_id {
            return Err(CoreError::invalid_operation(format!(
                "mutation changed entity id {entity_id} to {}",
                entity.entity_id()
            )));
        }
        let payload = encode_entity(&entity)?;
        let collection = CollectionId::new(T::COLLECTION);
        if let Some(entry) = self.context.get_mut(&collection, entity_id) {
            entry.current = payload;
            entry.natural_id = entity.natural_id();
        }
        Ok(entity)
    }

    /// Schedules a managed entity for removal at the next flush.
    ///
    /// An unmanaged entity that exists in the store is loaded and
    /// scheduled in one step.
    pub fn remove<T: Entity>(&mut self, entity: &T) -> CoreResult<()> {
        self.ensure_active()?;
        let collection = CollectionId::new(T::COLLECTION);
        let entity_id = entity.entity_id();

        if let Some(entry) = self.context.get_mut(&collection, entity_id) {
            entry.status = EntityStatus::Removed;
            return Ok(());
        }
        match self.inner.store.get(&collection, entity_id) {
            Some(record) => {
                let mut entry =
                    EntityEntry::loaded(record.payload, record.version, record.natural_id);
                entry.status = EntityStatus::Removed;
                self.context.insert(collection, entity_id, entry);
                Ok(())
            }
            None => Err(CoreError::entity_not_found(collection, entity_id)),
        }
    }

    /// Re-reads an entity from the committed store, overwriting any
    /// unflushed changes this session made to it.
    ///
    /// Lock flags survive the refresh; the dirty-check snapshot is
    /// reset to the committed state.
    pub fn refresh<T: Entity>(&mut self, entity_id: EntityId) -> CoreResult<T> {
        self.ensure_active()?;
        let collection = CollectionId::new(T::COLLECTION);
        let record = self
            .inner
            .store
            .get(&collection, entity_id)
            .ok_or_else(|| CoreError::entity_not_found(collection.clone(), entity_id))?;

        // A stale cached copy must not outlive the refresh: re-fill it
        // when the session's cache mode allows puts, drop it otherwise.
        if self.cache_mode.is_put_enabled() {
            self.inner
                .cache
                .put(&collection, entity_id, record.payload.clone(), record.version);
        } else {
            self.inner.cache.evict_entity(&collection, entity_id);
        }

        let entity: T = decode_entity(&record.payload)?;
        let prior = self.context.remove(&collection, entity_id);
        let mut entry = EntityEntry::loaded(record.payload, record.version, record.natural_id);
        if let Some(prior) = prior {
            entry.held_lock = prior.held_lock;
            entry.verify_version = prior.verify_version;
            entry.force_increment = prior.force_increment;
        }
        self.context.insert(collection, entity_id, entry);
        Ok(entity)
    }

    /// Acquires a lock on a managed entity with the factory's default
    /// timeout.
    pub fn lock<T: Entity>(&mut self, entity: &T, mode: LockMode) -> CoreResult<LockOutcome> {
        let timeout = self.inner.config.default_lock_timeout;
        self.lock_with_options(entity, LockOptions::new(mode).timeout(timeout))
    }

    /// Acquires a lock on a managed entity.
    ///
    /// Requesting a mode no stronger than one already held is a no-op.
    /// Optimistic modes register a version check for commit time;
    /// pessimistic modes go through the factory's lock table and may
    /// block, fail or skip depending on the effective timeout.
    ///
    /// # Errors
    ///
    /// Returns `TransientInstance` if the entity is not managed by this
    /// session, or `LockTimeout` if a pessimistic wait is exhausted.
    pub fn lock_with_options<T: Entity>(
        &mut self,
        entity: &T,
        options: LockOptions,
    ) -> CoreResult<LockOutcome> {
        self.ensure_active()?;
        let collection = CollectionId::new(T::COLLECTION);
        let entity_id = entity.entity_id();

        let Some(entry) = self.context.get(&collection, entity_id) else {
            return Err(CoreError::TransientInstance {
                collection,
                entity_id,
            });
        };
        if !options.mode.greater_than(entry.held_lock) {
            return Ok(LockOutcome::AlreadyHeld);
        }
        self.acquire_entry_lock(&collection, entity_id, options)
    }

    /// Takes a pessimistic table lock if the mode calls for one, and
    /// records the lock flags on the context entry.
    pub(crate) fn acquire_entry_lock(
        &mut self,
        collection: &CollectionId,
        entity_id: EntityId,
        options: LockOptions,
    ) -> CoreResult<LockOutcome> {
        let outcome = if options.mode.is_pessimistic() {
            self.acquire_table_lock(collection, entity_id, options)?
        } else {
            LockOutcome::Acquired
        };
        if outcome != LockOutcome::Skipped {
            self.note_lock_flags(collection, entity_id, options.mode);
        }
        Ok(outcome)
    }

    pub(crate) fn acquire_table_lock(
        &self,
        collection: &CollectionId,
        entity_id: EntityId,
        options: LockOptions,
    ) -> CoreResult<LockOutcome> {
        let result = self.inner.locks.acquire(
            self.id,
            collection,
            entity_id,
            options.mode,
            options.effective_timeout(),
        );
        if matches!(result, Err(CoreError::LockTimeout { .. })) {
            self.inner.stats.record_lock_timeout();
        }
        result
    }

    pub(crate) fn note_lock_flags(
        &mut self,
        collection: &CollectionId,
        entity_id: EntityId,
        mode: LockMode,
    ) {
        if let Some(entry) = self.context.get_mut(collection, entity_id) {
            if mode.greater_than(entry.held_lock) {
                entry.held_lock = mode;
            }
            if matches!(
                mode,
                LockMode::Read | LockMode::Optimistic | LockMode::OptimisticForceIncrement
            ) {
                entry.verify_version = true;
            }
            if mode.requires_version_increment() {
                entry.force_increment = true;
            }
        }
    }

    /// Returns the lock mode this session holds on a managed entity.
    #[must_use]
    pub fn held_lock_mode<T: Entity>(&self, entity: &T) -> LockMode {
        let collection = CollectionId::new(T::COLLECTION);
        self.context
            .get(&collection, entity.entity_id())
            .map_or(LockMode::None, |entry| entry.held_lock)
    }

    /// Writes all pending changes to the store.
    ///
    /// Inserts are applied first, then updates, then deletes. The batch
    /// is atomic: a version conflict anywhere fails the whole flush and
    /// leaves the store untouched.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.ensure_active()?;
        let (actions, counts) = self.context.build_flush_plan();
        if actions.is_empty() {
            return Ok(());
        }

        if let Err(err) = self.inner.store.apply(&actions) {
            if matches!(err, CoreError::StaleEntity { .. }) {
                self.inner.stats.record_optimistic_failure();
            }
            return Err(err);
        }

        for action in &actions {
            let collection = action.collection();
            let entity_id = action.entity_id();
            match action {
                FlushAction::Insert { payload, .. } => {
                    if self.cache_mode.is_put_enabled() {
                        self.inner
                            .cache
                            .put(collection, entity_id, payload.clone(), Version::INITIAL);
                    } else {
                        self.inner.cache.evict_entity(collection, entity_id);
                    }
                }
                FlushAction::Update {
                    payload,
                    expected_version,
                    ..
                } => {
                    if self.cache_mode.is_put_enabled() {
                        self.inner.cache.put(
                            collection,
                            entity_id,
                            payload.clone(),
                            expected_version.next(),
                        );
                    } else {
                        self.inner.cache.evict_entity(collection, entity_id);
                    }
                }
                FlushAction::Delete { .. } => {
                    self.inner.cache.evict_entity(collection, entity_id);
                }
            }
        }

        self.context.mark_flushed();
        self.inner
            .stats
            .record_flush(counts.inserts, counts.updates, counts.deletes);
        debug!(
            session = %self.id,
            inserts = counts.inserts,
            updates = counts.updates,
            deletes = counts.deletes,
            "flushed"
        );
        Ok(())
    }

    /// Commits the unit of work.
    ///
    /// Unless the flush mode is `Manual`, pending changes are flushed
    /// first; in `Manual` mode anything not explicitly flushed is
    /// discarded. Optimistic locks are then verified against the store
    /// and force-increment locks bump their entities' versions. All
    /// pessimistic locks are released and the session ends.
    ///
    /// On any error the session is aborted: locks are released and the
    /// context is discarded.
    pub fn commit(&mut self) -> CoreResult<()> {
        self.ensure_active()?;
        match self.try_commit() {
            Ok(()) => {
                self.finish(SessionState::Committed);
                Ok(())
            }
            Err(err) => {
                self.finish(SessionState::Aborted);
                Err(err)
            }
        }
    }

    fn try_commit(&mut self) -> CoreResult<()> {
        if self.flush_mode != FlushMode::Manual {
            self.flush()?;
        }

        for ((collection, entity_id), entry) in self.context.iter() {
            if !entry.verify_version {
                continue;
            }
            let loaded = entry.loaded_version.unwrap_or(Version::INITIAL);
            let actual = self.inner.store.version_of(collection, *entity_id);
            if actual != Some(loaded) {
                self.inner.stats.record_optimistic_failure();
                return Err(CoreError::StaleEntity {
                    collection: collection.clone(),
                    expected: loaded,
                    actual: actual.unwrap_or(Version::new(0)),
                });
            }
        }

        for ((collection, entity_id), entry) in self.context.iter() {
            if entry.force_increment {
                self.inner.store.force_increment(collection, *entity_id)?;
                self.inner.cache.evict_entity(collection, *entity_id);
            }
        }

        if self.inner.config.save_on_commit {
            self.inner.save_snapshot()?;
        }
        Ok(())
    }

    /// Rolls back the unit of work, discarding all pending changes and
    /// releasing all locks.
    pub fn rollback(&mut self) -> CoreResult<()> {
        self.ensure_active()?;
        self.finish(SessionState::Aborted);
        Ok(())
    }

    fn finish(&mut self, state: SessionState) {
        self.inner.locks.release_all(self.id);
        self.context.clear();
        self.state = state;
        debug!(session = %self.id, ?state, "session finished");
    }

    /// Flushes pending changes for one collection ahead of a query,
    /// according to the flush mode.
    pub(crate) fn auto_flush_before_query(&mut self, collection: &CollectionId) -> CoreResult<()> {
        match self.flush_mode {
            FlushMode::Always => self.flush(),
            FlushMode::Auto if self.context.has_pending_changes(Some(collection)) => self.flush(),
            _ => Ok(()),
        }
    }

    /// Opens a query over a collection.
    pub fn query<T: Entity>(&mut self) -> Query<'_, T> {
        Query::new(self)
    }

    /// Checks whether an entity is managed by this session.
    #[must_use]
    pub fn contains<T: Entity>(&self, entity: &T) -> bool {
        let collection = CollectionId::new(T::COLLECTION);
        self.context
            .get(&collection, entity.entity_id())
            .is_some_and(|entry| entry.status != EntityStatus::Removed)
    }

    /// Checks whether this session has unflushed changes.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.context.has_pending_changes(None)
    }

    /// Detaches one entity from the session. Unflushed changes to it
    /// are lost; held locks stay until the session ends.
    pub fn detach<T: Entity>(&mut self, entity: &T) {
        let collection = CollectionId::new(T::COLLECTION);
        self.context.remove(&collection, entity.entity_id());
    }

    /// Detaches every managed entity, discarding unflushed changes.
    pub fn clear(&mut self) {
        self.context.clear();
    }

    /// Returns the number of entities this session manages.
    #[must_use]
    pub fn managed_count(&self) -> usize {
        self.context.len()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state == SessionState::Active {
            self.inner.locks.release_all(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::factory::SessionFactory;
    use perstore_api::Timeout;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        id: EntityId,
        email: String,
        name: String,
    }

    impl Entity for User {
        const COLLECTION: &'static str = "users";

        fn entity_id(&self) -> EntityId {
            self.id
        }

        fn natural_id(&self) -> Option<String> {
            Some(self.email.clone())
        }
    }

    fn user(email: &str, name: &str) -> User {
        User {
            id: EntityId::new(),
            email: email.to_string(),
            name: name.to_string(),
        }
    }

    fn factory() -> SessionFactory {
        SessionFactory::open_in_memory().unwrap()
    }

    #[test]
    fn persist_flush_find() {
        let factory = factory();
        let mut session = factory.open_session().unwrap();
        let alice = user("alice@example.com", "Alice");

        session.persist(&alice).unwrap();
        assert!(session.contains(&alice));
        assert!(session.is_dirty());

        session.flush().unwrap();
        assert!(!session.is_dirty());

        let found: User = session.find(alice.id).unwrap().unwrap();
        assert_eq!(found, alice);
    }

    #[test]
    fn commit_makes_changes_visible_to_other_sessions() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut s1 = factory.open_session().unwrap();
        s1.persist(&alice).unwrap();
        s1.commit().unwrap();
        assert_eq!(s1.state(), SessionState::Committed);

        let mut s2 = factory.open_session().unwrap();
        let found: User = s2.find(alice.id).unwrap().unwrap();
        assert_eq!(found, alice);
    }

    #[test]
    fn duplicate_persist_fails() {
        let factory = factory();
        let mut session = factory.open_session().unwrap();
        let alice = user("alice@example.com", "Alice");

        session.persist(&alice).unwrap();
        let result = session.persist(&alice);
        assert!(matches!(result, Err(CoreError::EntityExists { .. })));
    }

    #[test]
    fn modify_updates_and_bumps_version() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut s1 = factory.open_session().unwrap();
        s1.persist(&alice).unwrap();
        s1.commit().unwrap();

        let mut s2 = factory.open_session().unwrap();
        let updated = s2
            .modify::<User>(alice.id, |u| u.name = "Alice B".to_string())
            .unwrap();
        assert_eq!(updated.name, "Alice B");
        assert!(s2.is_dirty());
        s2.commit().unwrap();

        let mut s3 = factory.open_session().unwrap();
        let found: User = s3.find(alice.id).unwrap().unwrap();
        assert_eq!(found.name, "Alice B");
        assert_eq!(factory.stats().entity_updates, 1);
    }

    #[test]
    fn remove_lifecycle() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut s1 = factory.open_session().unwrap();
        s1.persist(&alice).unwrap();
        s1.commit().unwrap();

        let mut s2 = factory.open_session().unwrap();
        s2.remove(&alice).unwrap();
        // removed in this session, invisible before flush
        assert!(s2.find::<User>(alice.id).unwrap().is_none());
        s2.commit().unwrap();

        let mut s3 = factory.open_session().unwrap();
        assert!(s3.find::<User>(alice.id).unwrap().is_none());
        assert!(matches!(
            s3.remove(&alice),
            Err(CoreError::EntityNotFound { .. })
        ));
    }

    #[test]
    fn persist_after_remove_cancels_removal() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut s1 = factory.open_session().unwrap();
        s1.persist(&alice).unwrap();
        s1.commit().unwrap();

        let mut s2 = factory.open_session().unwrap();
        s2.remove(&alice).unwrap();
        let renamed = User {
            name: "Alice B".to_string(),
            ..alice.clone()
        };
        s2.persist(&renamed).unwrap();
        s2.commit().unwrap();

        let mut s3 = factory.open_session().unwrap();
        let found: User = s3.find(alice.id).unwrap().unwrap();
        assert_eq!(found.name, "Alice B");
    }

    #[test]
    fn rollback_discards_changes() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut s1 = factory.open_session().unwrap();
        s1.persist(&alice).unwrap();
        s1.rollback().unwrap();
        assert_eq!(s1.state(), SessionState::Aborted);

        let mut s2 = factory.open_session().unwrap();
        assert!(s2.find::<User>(alice.id).unwrap().is_none());
    }

    #[test]
    fn finished_session_rejects_operations() {
        let factory = factory();
        let mut session = factory.open_session().unwrap();
        session.commit().unwrap();

        let result = session.persist(&user("a@example.com", "A"));
        assert!(matches!(result, Err(CoreError::InvalidOperation { .. })));
    }

    #[test]
    fn manual_flush_mode_discards_unflushed_work_on_commit() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut s1 = factory.open_session().unwrap();
        s1.set_flush_mode(FlushMode::Manual);
        s1.persist(&alice).unwrap();
        s1.commit().unwrap();

        let mut s2 = factory.open_session().unwrap();
        assert!(s2.find::<User>(alice.id).unwrap().is_none());
    }

    #[test]
    fn manual_flush_mode_persists_when_flushed_explicitly() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut s1 = factory.open_session().unwrap();
        s1.set_flush_mode(FlushMode::Manual);
        s1.persist(&alice).unwrap();
        s1.flush().unwrap();
        s1.commit().unwrap();

        let mut s2 = factory.open_session().unwrap();
        assert!(s2.find::<User>(alice.id).unwrap().is_some());
    }

    #[test]
    fn find_by_natural_id_sees_pending_state() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut session = factory.open_session().unwrap();
        session.persist(&alice).unwrap();

        // unflushed entity is found by its natural id
        let found: User = session
            .find_by_natural_id("alice@example.com")
            .unwrap()
            .unwrap();
        assert_eq!(found, alice);

        session.remove(&alice).unwrap();
        assert!(session
            .find_by_natural_id::<User>("alice@example.com")
            .unwrap()
            .is_none());
    }

    #[test]
    fn find_by_natural_id_hits_committed_index() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut s1 = factory.open_session().unwrap();
        s1.persist(&alice).unwrap();
        s1.commit().unwrap();

        let mut s2 = factory.open_session().unwrap();
        let found: User = s2
            .find_by_natural_id("alice@example.com")
            .unwrap()
            .unwrap();
        assert_eq!(found.id, alice.id);
        assert!(s2.find_by_natural_id::<User>("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn merge_detached_state() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut s1 = factory.open_session().unwrap();
        s1.persist(&alice).unwrap();
        s1.commit().unwrap();

        // detached copy, modified outside any session
        let detached = User {
            name: "Alice B".to_string(),
            ..alice.clone()
        };

        let mut s2 = factory.open_session().unwrap();
        let managed = s2.merge(&detached).unwrap();
        assert_eq!(managed.name, "Alice B");
        assert!(s2.is_dirty());
        s2.commit().unwrap();

        let mut s3 = factory.open_session().unwrap();
        let found: User = s3.find(alice.id).unwrap().unwrap();
        assert_eq!(found.name, "Alice B");
    }

    #[test]
    fn merge_transient_schedules_insert() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut session = factory.open_session().unwrap();
        session.merge(&alice).unwrap();
        session.commit().unwrap();

        let mut s2 = factory.open_session().unwrap();
        assert!(s2.find::<User>(alice.id).unwrap().is_some());
    }

    #[test]
    fn refresh_overwrites_unflushed_changes() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut s1 = factory.open_session().unwrap();
        s1.persist(&alice).unwrap();
        s1.commit().unwrap();

        let mut s2 = factory.open_session().unwrap();
        s2.modify::<User>(alice.id, |u| u.name = "scratch".to_string())
            .unwrap();
        let refreshed: User = s2.refresh(alice.id).unwrap();
        assert_eq!(refreshed.name, "Alice");
        assert!(!s2.is_dirty());
    }

    #[test]
    fn lock_requires_managed_entity() {
        let factory = factory();
        let mut session = factory.open_session().unwrap();
        let alice = user("alice@example.com", "Alice");

        let result = session.lock(&alice, LockMode::PessimisticWrite);
        assert!(matches!(result, Err(CoreError::TransientInstance { .. })));
    }

    #[test]
    fn weaker_lock_request_is_noop() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut s1 = factory.open_session().unwrap();
        s1.persist(&alice).unwrap();
        s1.commit().unwrap();

        let mut s2 = factory.open_session().unwrap();
        let loaded: User = s2.find(alice.id).unwrap().unwrap();
        s2.lock(&loaded, LockMode::PessimisticWrite).unwrap();
        assert_eq!(s2.held_lock_mode(&loaded), LockMode::PessimisticWrite);

        let outcome = s2.lock(&loaded, LockMode::PessimisticRead).unwrap();
        assert_eq!(outcome, LockOutcome::AlreadyHeld);
        assert_eq!(s2.held_lock_mode(&loaded), LockMode::PessimisticWrite);
    }

    #[test]
    fn pessimistic_lock_blocks_other_sessions() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut s1 = factory.open_session().unwrap();
        s1.persist(&alice).unwrap();
        s1.commit().unwrap();

        let mut s2 = factory.open_session().unwrap();
        let loaded: User = s2.find(alice.id).unwrap().unwrap();
        s2.lock_with_options(&loaded, LockOptions::new(LockMode::PessimisticWrite))
            .unwrap();

        let mut s3 = factory.open_session().unwrap();
        let result = s3.find_with::<User>(
            alice.id,
            FindOptions::new().lock(
                LockOptions::new(LockMode::PessimisticWrite).timeout(Timeout::NO_WAIT),
            ),
        );
        assert!(matches!(result, Err(CoreError::LockTimeout { .. })));
        assert_eq!(factory.stats().lock_timeouts, 1);

        // skip-locked reports the row as absent instead of failing
        let skipped = s3
            .find_with::<User>(
                alice.id,
                FindOptions::new().lock_mode(LockMode::UpgradeSkiplocked),
            )
            .unwrap();
        assert!(skipped.is_none());

        // released at commit
        s2.commit().unwrap();
        let found = s3
            .find_with::<User>(
                alice.id,
                FindOptions::new().lock(
                    LockOptions::new(LockMode::PessimisticWrite).timeout(Timeout::NO_WAIT),
                ),
            )
            .unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn pessimistic_find_of_missing_entity_leaves_no_lock() {
        let factory = factory();
        let missing = EntityId::new();

        let mut s1 = factory.open_session().unwrap();
        let found = s1
            .find_with::<User>(
                missing,
                FindOptions::new().lock_mode(LockMode::PessimisticWrite),
            )
            .unwrap();
        assert!(found.is_none());
        assert!(s1.inner.locks.is_empty());

        // The id must stay free for other sessions.
        let mut s2 = factory.open_session().unwrap();
        let found = s2
            .find_with::<User>(
                missing,
                FindOptions::new().lock(
                    LockOptions::new(LockMode::PessimisticWrite).timeout(Timeout::NO_WAIT),
                ),
            )
            .unwrap();
        assert!(found.is_none());
        assert_eq!(factory.stats().lock_timeouts, 0);
    }

    #[test]
    fn optimistic_lock_fails_commit_after_concurrent_update() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut setup = factory.open_session().unwrap();
        setup.persist(&alice).unwrap();
        setup.commit().unwrap();

        let mut s1 = factory.open_session().unwrap();
        let loaded: User = s1
            .find_with(alice.id, FindOptions::new().lock_mode(LockMode::Optimistic))
            .unwrap()
            .unwrap();
        let _ = loaded;

        let mut s2 = factory.open_session().unwrap();
        s2.modify::<User>(alice.id, |u| u.name = "Updated".to_string())
            .unwrap();
        s2.commit().unwrap();

        let result = s1.commit();
        assert!(matches!(result, Err(CoreError::StaleEntity { .. })));
        assert_eq!(s1.state(), SessionState::Aborted);
        assert_eq!(factory.stats().optimistic_failures, 1);
    }

    #[test]
    fn force_increment_bumps_version_at_commit() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut setup = factory.open_session().unwrap();
        setup.persist(&alice).unwrap();
        setup.commit().unwrap();

        let mut s1 = factory.open_session().unwrap();
        let loaded: User = s1.find(alice.id).unwrap().unwrap();
        s1.lock(&loaded, LockMode::OptimisticForceIncrement).unwrap();
        s1.commit().unwrap();

        // another session that loaded the old version now fails
        let mut s2 = factory.open_session().unwrap();
        let mut s3 = factory.open_session().unwrap();
        let _: User = s2.find(alice.id).unwrap().unwrap();
        let _: User = s3
            .find_with(alice.id, FindOptions::new().lock_mode(LockMode::Optimistic))
            .unwrap()
            .unwrap();
        s2.modify::<User>(alice.id, |u| u.name = "B".to_string())
            .unwrap();
        s2.commit().unwrap();
        assert!(matches!(s3.commit(), Err(CoreError::StaleEntity { .. })));
    }

    #[test]
    fn stale_flush_is_detected() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut setup = factory.open_session().unwrap();
        setup.persist(&alice).unwrap();
        setup.commit().unwrap();

        let mut s1 = factory.open_session().unwrap();
        let mut s2 = factory.open_session().unwrap();
        s1.modify::<User>(alice.id, |u| u.name = "One".to_string())
            .unwrap();
        s2.modify::<User>(alice.id, |u| u.name = "Two".to_string())
            .unwrap();

        s1.commit().unwrap();
        let result = s2.commit();
        assert!(matches!(result, Err(CoreError::StaleEntity { .. })));
    }

    #[test]
    fn cache_serves_second_find() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut s1 = factory.open_session().unwrap();
        s1.persist(&alice).unwrap();
        s1.commit().unwrap();

        // flush put the entity into the cache
        let mut s2 = factory.open_session().unwrap();
        let _: User = s2.find(alice.id).unwrap().unwrap();
        assert!(factory.stats().cache_hits >= 1);
    }

    #[test]
    fn cache_ignore_mode_bypasses_cache() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut s1 = factory.open_session().unwrap();
        s1.set_cache_mode(CacheMode::Ignore);
        s1.persist(&alice).unwrap();
        s1.commit().unwrap();
        assert_eq!(factory.cache().region_len(&CollectionId::new("users")), 0);

        let mut s2 = factory.open_session().unwrap();
        s2.set_cache_mode(CacheMode::Ignore);
        let _: User = s2.find(alice.id).unwrap().unwrap();
        assert_eq!(factory.stats().cache_hits, 0);
        assert_eq!(factory.stats().cache_misses, 0);
    }

    #[test]
    fn refresh_drops_stale_cached_entry_when_puts_are_disabled() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut setup = factory.open_session().unwrap();
        setup.persist(&alice).unwrap();
        setup.commit().unwrap();

        // Plant a doctored copy in the cache.
        let mut stale = alice.clone();
        stale.name = "Old Alice".to_string();
        let payload = encode_entity(&stale).unwrap();
        factory
            .cache()
            .put(&CollectionId::new("users"), alice.id, payload, Version::INITIAL);

        let mut session = factory.open_session().unwrap();
        session.set_cache_mode(CacheMode::Get);
        let refreshed: User = session.refresh(alice.id).unwrap();
        assert_eq!(refreshed.name, "Alice");
        assert!(factory
            .cache()
            .get(&CollectionId::new("users"), alice.id)
            .is_none());
    }

    #[test]
    fn delete_evicts_cached_entry() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut s1 = factory.open_session().unwrap();
        s1.persist(&alice).unwrap();
        s1.commit().unwrap();
        assert_eq!(factory.cache().region_len(&CollectionId::new("users")), 1);

        let mut s2 = factory.open_session().unwrap();
        s2.remove(&alice).unwrap();
        s2.commit().unwrap();
        assert_eq!(factory.cache().region_len(&CollectionId::new("users")), 0);
    }

    #[test]
    fn dropped_session_releases_its_locks() {
        let factory = factory();
        let alice = user("alice@example.com", "Alice");

        let mut setup = factory.open_session().unwrap();
        setup.persist(&alice).unwrap();
        setup.commit().unwrap();

        {
            let mut s1 = factory.open_session().unwrap();
            let loaded: User = s1.find(alice.id).unwrap().unwrap();
            s1.lock(&loaded, LockMode::PessimisticWrite).unwrap();
        }

        let mut s2 = factory.open_session().unwrap();
        let found = s2
            .find_with::<User>(
                alice.id,
                FindOptions::new().lock(
                    LockOptions::new(LockMode::PessimisticWrite).timeout(Timeout::NO_WAIT),
                ),
            )
            .unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn disabled_second_level_cache() {
        let config = Config::new().use_second_level_cache(false);
        let factory = SessionFactory::open_in_memory_with_config(config).unwrap();
        let alice = user("alice@example.com", "Alice");

        let mut s1 = factory.open_session().unwrap();
        s1.persist(&alice).unwrap();
        s1.commit().unwrap();

        let mut s2 = factory.open_session().unwrap();
        let _: User = s2.find(alice.id).unwrap().unwrap();
        assert_eq!(factory.stats().cache_hits, 0);
        assert_eq!(factory.stats().cache_puts, 0);
    }
}
