//! Persistence context.
//!
//! The set of entity instances currently managed by a session, tracked
//! as encoded payloads. Each entry remembers the payload loaded from
//! the store (the snapshot); dirty checking is a byte comparison of
//! the current payload against that snapshot.

use crate::entity::EntityId;
use crate::store::FlushAction;
use crate::types::{CollectionId, Version};
use perstore_api::LockMode;
use std::collections::HashMap;

/// Lifecycle status of a context entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntityStatus {
    /// Scheduled for insertion; not yet in the store.
    New,
    /// Loaded from the store (or cache) and tracked for changes.
    Managed,
    /// Scheduled for deletion.
    Removed,
}

/// A managed entity within the persistence context.
#[derive(Debug, Clone)]
pub(crate) struct EntityEntry {
    /// Lifecycle status.
    pub status: EntityStatus,
    /// Current entity payload.
    pub current: Vec<u8>,
    /// Payload as loaded from the store; `None` for new entities.
    pub snapshot: Option<Vec<u8>>,
    /// Version as loaded from the store; `None` for new entities.
    pub loaded_version: Option<Version>,
    /// Natural id of the current state, if any.
    pub natural_id: Option<String>,
    /// Strongest lock mode requested for this entity.
    pub held_lock: LockMode,
    /// Verify the store version at commit (optimistic lock modes).
    pub verify_version: bool,
    /// Increment the store version at commit (force-increment modes).
    pub force_increment: bool,
}

impl EntityEntry {
    /// Creates an entry for a transient entity scheduled for insert.
    pub fn new_entity(current: Vec<u8>, natural_id: Option<String>) -> Self {
        Self {
            status: EntityStatus::New,
            current,
            snapshot: None,
            loaded_version: None,
            natural_id,
            held_lock: LockMode::None,
            verify_version: false,
            force_increment: false,
        }
    }

    /// Creates an entry for an entity loaded from the store or cache.
    pub fn loaded(payload: Vec<u8>, version: Version, natural_id: Option<String>) -> Self {
        Self {
            status: EntityStatus::Managed,
            current: payload.clone(),
            snapshot: Some(payload),
            loaded_version: Some(version),
            natural_id,
            held_lock: LockMode::None,
            verify_version: false,
            force_increment: false,
        }
    }

    /// Checks if the current payload differs from the loaded snapshot.
    ///
    /// New entities are always dirty; managed entities are dirty iff
    /// their bytes changed.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        match (&self.status, &self.snapshot) {
            (EntityStatus::New, _) => true,
            (EntityStatus::Removed, _) => true,
            (EntityStatus::Managed, Some(snapshot)) => *snapshot != self.current,
            (EntityStatus::Managed, None) => true,
        }
    }
}

/// Counts of the actions in a flush plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FlushCounts {
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
}

/// The persistence context: all entities managed by one session.
#[derive(Debug, Default)]
pub(crate) struct PersistenceContext {
    entries: HashMap<(CollectionId, EntityId), EntityEntry>,
}

impl PersistenceContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, collection: &CollectionId, entity_id: EntityId) -> Option<&EntityEntry> {
        self.entries.get(&(collection.clone(), entity_id))
    }

    pub fn get_mut(
        &mut self,
        collection: &CollectionId,
        entity_id: EntityId,
    ) -> Option<&mut EntityEntry> {
        self.entries.get_mut(&(collection.clone(), entity_id))
    }

    pub fn insert(&mut self, collection: CollectionId, entity_id: EntityId, entry: EntityEntry) {
        self.entries.insert((collection, entity_id), entry);
    }

    pub fn remove(
        &mut self,
        collection: &CollectionId,
        entity_id: EntityId,
    ) -> Option<EntityEntry> {
        self.entries.remove(&(collection.clone(), entity_id))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(CollectionId, EntityId), &EntityEntry)> {
        self.entries.iter()
    }

    pub fn entries_mut(
        &mut self,
    ) -> impl Iterator<Item = (&(CollectionId, EntityId), &mut EntityEntry)> {
        self.entries.iter_mut()
    }

    /// Checks for pending changes, optionally scoped to one collection.
    pub fn has_pending_changes(&self, collection: Option<&CollectionId>) -> bool {
        self.entries
            .iter()
            .filter(|((c, _), _)| collection.is_none_or(|wanted| c == wanted))
            .any(|(_, entry)| entry.is_dirty())
    }

    /// Builds the ordered flush plan: inserts, then updates, then
    /// deletes. Within each class actions are ordered by
    /// (collection, entity id) so a flush is deterministic.
    ///
    /// Entities that were created and removed within the same session
    /// produce no action at all.
    pub fn build_flush_plan(&self) -> (Vec<FlushAction>, FlushCounts) {
        let mut inserts = Vec::new();
        let mut updates = Vec::new();
        let mut deletes = Vec::new();

        let mut keys: Vec<&(CollectionId, EntityId)> = self.entries.keys().collect();
        keys.sort();

        for key in keys {
            let entry = &self.entries[key];
            let (collection, entity_id) = (key.0.clone(), key.1);
            match entry.status {
                EntityStatus::New => inserts.push(FlushAction::Insert {
                    collection,
                    entity_id,
                    payload: entry.current.clone(),
                    natural_id: entry.natural_id.clone(),
                }),
                EntityStatus::Managed => {
                    if entry.is_dirty() {
                        // Managed entries always carry a loaded version.
                        let expected_version = entry.loaded_version.unwrap_or(Version::INITIAL);
                        updates.push(FlushAction::Update {
                            collection,
                            entity_id,
                            payload: entry.current.clone(),
                            expected_version,
                            natural_id: entry.natural_id.clone(),
                        });
                    }
                }
                EntityStatus::Removed => {
                    // A new entity removed before its first flush never
                    // reached the store; drop it silently.
                    if let Some(expected_version) = entry.loaded_version {
                        deletes.push(FlushAction::Delete {
                            collection,
                            entity_id,
                            expected_version,
                        });
                    }
                }
            }
        }

        let counts = FlushCounts {
            inserts: inserts.len() as u64,
            updates: updates.len() as u64,
            deletes: deletes.len() as u64,
        };

        let mut actions = inserts;
        actions.append(&mut updates);
        actions.append(&mut deletes);
        (actions, counts)
    }

    /// Transitions entries after a successful flush: new entities
    /// become managed at the initial version, dirty entities get a
    /// fresh snapshot and a bumped version, removed entries leave the
    /// context.
    pub fn mark_flushed(&mut self) {
        self.entries.retain(|_, entry| match entry.status {
            EntityStatus::Removed => false,
            EntityStatus::New => {
                entry.status = EntityStatus::Managed;
                entry.snapshot = Some(entry.current.clone());
                entry.loaded_version = Some(Version::INITIAL);
                true
            }
            EntityStatus::Managed => {
                if entry.is_dirty() {
                    entry.snapshot = Some(entry.current.clone());
                    entry.loaded_version = entry.loaded_version.map(Version::next);
                }
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> (CollectionId, EntityId) {
        (CollectionId::new("users"), EntityId::new())
    }

    #[test]
    fn loaded_entry_is_clean_until_modified() {
        let mut entry = EntityEntry::loaded(vec![1, 2], Version::INITIAL, None);
        assert!(!entry.is_dirty());

        entry.current = vec![1, 3];
        assert!(entry.is_dirty());

        entry.current = vec![1, 2];
        assert!(!entry.is_dirty());
    }

    #[test]
    fn plan_orders_inserts_updates_deletes() {
        let mut context = PersistenceContext::new();

        let (c, id_removed) = key();
        let mut removed = EntityEntry::loaded(vec![1], Version::INITIAL, None);
        removed.status = EntityStatus::Removed;
        context.insert(c.clone(), id_removed, removed);

        let id_new = EntityId::new();
        context.insert(c.clone(), id_new, EntityEntry::new_entity(vec![2], None));

        let id_dirty = EntityId::new();
        let mut dirty = EntityEntry::loaded(vec![3], Version::new(4), None);
        dirty.current = vec![4];
        context.insert(c.clone(), id_dirty, dirty);

        let (actions, counts) = context.build_flush_plan();
        assert_eq!(counts, FlushCounts { inserts: 1, updates: 1, deletes: 1 });
        assert!(matches!(actions[0], FlushAction::Insert { .. }));
        assert!(matches!(actions[1], FlushAction::Update { .. }));
        assert!(matches!(actions[2], FlushAction::Delete { .. }));
    }

    #[test]
    fn clean_entries_produce_no_actions() {
        let mut context = PersistenceContext::new();
        let (c, id) = key();
        context.insert(c, id, EntityEntry::loaded(vec![1], Version::INITIAL, None));

        let (actions, counts) = context.build_flush_plan();
        assert!(actions.is_empty());
        assert_eq!(counts, FlushCounts::default());
    }

    #[test]
    fn new_then_removed_produces_nothing() {
        let mut context = PersistenceContext::new();
        let (c, id) = key();
        let mut entry = EntityEntry::new_entity(vec![1], None);
        entry.status = EntityStatus::Removed;
        // loaded_version stays None: the entity never reached the store.
        context.insert(c, id, entry);

        let (actions, _) = context.build_flush_plan();
        assert!(actions.is_empty());
    }

    #[test]
    fn mark_flushed_transitions_entries() {
        let mut context = PersistenceContext::new();
        let (c, id_new) = key();
        context.insert(c.clone(), id_new, EntityEntry::new_entity(vec![1], None));

        let id_dirty = EntityId::new();
        let mut dirty = EntityEntry::loaded(vec![2], Version::new(3), None);
        dirty.current = vec![9];
        context.insert(c.clone(), id_dirty, dirty);

        let id_removed = EntityId::new();
        let mut removed = EntityEntry::loaded(vec![3], Version::INITIAL, None);
        removed.status = EntityStatus::Removed;
        context.insert(c.clone(), id_removed, removed);

        context.mark_flushed();

        let new_entry = context.get(&c, id_new).unwrap();
        assert_eq!(new_entry.status, EntityStatus::Managed);
        assert_eq!(new_entry.loaded_version, Some(Version::INITIAL));
        assert!(!new_entry.is_dirty());

        let dirty_entry = context.get(&c, id_dirty).unwrap();
        assert_eq!(dirty_entry.loaded_version, Some(Version::new(4)));
        assert!(!dirty_entry.is_dirty());

        assert!(context.get(&c, id_removed).is_none());
    }

    #[test]
    fn pending_changes_scoped_by_collection() {
        let mut context = PersistenceContext::new();
        let users = CollectionId::new("users");
        let orders = CollectionId::new("orders");

        context.insert(users.clone(), EntityId::new(), EntityEntry::new_entity(vec![1], None));
        context.insert(
            orders.clone(),
            EntityId::new(),
            EntityEntry::loaded(vec![2], Version::INITIAL, None),
        );

        assert!(context.has_pending_changes(None));
        assert!(context.has_pending_changes(Some(&users)));
        assert!(!context.has_pending_changes(Some(&orders)));
    }
}
