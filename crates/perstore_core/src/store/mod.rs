//! Committed entity store.
//!
//! The store holds the committed state shared by all sessions: one
//! versioned record per entity plus a natural-id index per collection.
//! Sessions never mutate it directly; they apply ordered batches of
//! [`FlushAction`]s produced by a flush, which either succeed as a
//! whole or leave the store untouched.

mod dir;
mod snapshot;

pub use dir::StoreDir;
pub use snapshot::{SnapshotFile, SnapshotRecord};

use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use crate::types::{CollectionId, Version};
use parking_lot::RwLock;
use std::collections::HashMap;

/// A committed entity record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Entity payload (CBOR bytes).
    pub payload: Vec<u8>,
    /// Current version, incremented on every update.
    pub version: Version,
    /// Natural id of the entity, if it has one.
    pub natural_id: Option<String>,
}

/// One write produced by a session flush.
///
/// Updates and deletes carry the version the session loaded; the store
/// verifies it before applying anything, so a concurrent update fails
/// the whole batch as stale.
#[derive(Debug, Clone)]
pub enum FlushAction {
    /// Insert a new entity.
    Insert {
        /// Target collection.
        collection: CollectionId,
        /// Entity ID.
        entity_id: EntityId,
        /// Entity payload.
        payload: Vec<u8>,
        /// Natural id, if any.
        natural_id: Option<String>,
    },
    /// Update an existing entity.
    Update {
        /// Target collection.
        collection: CollectionId,
        /// Entity ID.
        entity_id: EntityId,
        /// New entity payload.
        payload: Vec<u8>,
        /// The version this session loaded.
        expected_version: Version,
        /// Natural id, if any.
        natural_id: Option<String>,
    },
    /// Delete an entity.
    Delete {
        /// Target collection.
        collection: CollectionId,
        /// Entity ID.
        entity_id: EntityId,
        /// The version this session loaded.
        expected_version: Version,
    },
}

impl FlushAction {
    /// Returns the collection this action targets.
    #[must_use]
    pub fn collection(&self) -> &CollectionId {
        match self {
            FlushAction::Insert { collection, .. }
            | FlushAction::Update { collection, .. }
            | FlushAction::Delete { collection, .. } => collection,
        }
    }

    /// Returns the entity this action targets.
    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        match self {
            FlushAction::Insert { entity_id, .. }
            | FlushAction::Update { entity_id, .. }
            | FlushAction::Delete { entity_id, .. } => *entity_id,
        }
    }
}

/// In-memory committed state with versioning and a natural-id index.
#[derive(Debug, Default)]
pub struct EntityStore {
    /// Committed records keyed by (collection, entity).
    records: RwLock<HashMap<(CollectionId, EntityId), StoredRecord>>,
    /// Natural-id index: (collection, natural id) -> entity.
    natural_ids: RwLock<HashMap<(CollectionId, String), EntityId>>,
}

impl EntityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a committed record.
    #[must_use]
    pub fn get(&self, collection: &CollectionId, entity_id: EntityId) -> Option<StoredRecord> {
        self.records
            .read()
            .get(&(collection.clone(), entity_id))
            .cloned()
    }

    /// Returns the committed version of an entity, if present.
    #[must_use]
    pub fn version_of(&self, collection: &CollectionId, entity_id: EntityId) -> Option<Version> {
        self.records
            .read()
            .get(&(collection.clone(), entity_id))
            .map(|r| r.version)
    }

    /// Checks if an entity exists.
    #[must_use]
    pub fn contains(&self, collection: &CollectionId, entity_id: EntityId) -> bool {
        self.records
            .read()
            .contains_key(&(collection.clone(), entity_id))
    }

    /// Resolves a natural id to an entity id.
    #[must_use]
    pub fn resolve_natural_id(&self, collection: &CollectionId, key: &str) -> Option<EntityId> {
        self.natural_ids
            .read()
            .get(&(collection.clone(), key.to_string()))
            .copied()
    }

    /// Scans all committed records of a collection.
    ///
    /// **Warning**: full scan; queries are expected to filter the
    /// result with host-language predicates.
    #[must_use]
    pub fn scan(&self, collection: &CollectionId) -> Vec<(EntityId, StoredRecord)> {
        let records = self.records.read();
        let mut rows: Vec<(EntityId, StoredRecord)> = records
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|((_, id), record)| (*id, record.clone()))
            .collect();
        // Stable result order for callers that paginate.
        rows.sort_by_key(|(id, _)| *id);
        rows
    }

    /// Returns the total number of committed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Checks if the store holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Applies a batch of flush actions atomically.
    ///
    /// All version preconditions are validated before any mutation, so
    /// a failed batch leaves the store unchanged. Actions must already
    /// be ordered inserts, then updates, then deletes.
    pub fn apply(&self, actions: &[FlushAction]) -> CoreResult<()> {
        let mut records = self.records.write();
        let mut natural_ids = self.natural_ids.write();

        // Validation pass, no mutation.
        for action in actions {
            let key = (action.collection().clone(), action.entity_id());
            match action {
                FlushAction::Insert { .. } => {
                    if records.contains_key(&key) {
                        return Err(CoreError::entity_exists(key.0, key.1));
                    }
                }
                FlushAction::Update {
                    expected_version, ..
                }
                | FlushAction::Delete {
                    expected_version, ..
                } => match records.get(&key) {
                    None => return Err(CoreError::entity_not_found(key.0, key.1)),
                    Some(record) if record.version != *expected_version => {
                        return Err(CoreError::StaleEntity {
                            collection: key.0,
                            expected: *expected_version,
                            actual: record.version,
                        });
                    }
                    Some(_) => {}
                },
            }
        }

        // Mutation pass.
        for action in actions {
            let key = (action.collection().clone(), action.entity_id());
            match action {
                FlushAction::Insert {
                    payload,
                    natural_id,
                    ..
                } => {
                    if let Some(nid) = natural_id {
                        natural_ids.insert((key.0.clone(), nid.clone()), key.1);
                    }
                    records.insert(
                        key,
                        StoredRecord {
                            payload: payload.clone(),
                            version: Version::INITIAL,
                            natural_id: natural_id.clone(),
                        },
                    );
                }
                FlushAction::Update {
                    payload,
                    expected_version,
                    natural_id,
                    ..
                } => {
                    let old = records.get(&key).and_then(|r| r.natural_id.clone());
                    if old != *natural_id {
                        if let Some(old_nid) = old {
                            natural_ids.remove(&(key.0.clone(), old_nid));
                        }
                        if let Some(nid) = natural_id {
                            natural_ids.insert((key.0.clone(), nid.clone()), key.1);
                        }
                    }
                    records.insert(
                        key,
                        StoredRecord {
                            payload: payload.clone(),
                            version: expected_version.next(),
                            natural_id: natural_id.clone(),
                        },
                    );
                }
                FlushAction::Delete { .. } => {
                    if let Some(record) = records.remove(&key) {
                        if let Some(nid) = record.natural_id {
                            natural_ids.remove(&(key.0, nid));
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Increments an entity's version without changing its payload.
    ///
    /// Used by force-increment lock modes at commit. Returns the new
    /// version.
    pub fn force_increment(
        &self,
        collection: &CollectionId,
        entity_id: EntityId,
    ) -> CoreResult<Version> {
        let mut records = self.records.write();
        let record = records
            .get_mut(&(collection.clone(), entity_id))
            .ok_or_else(|| CoreError::entity_not_found(collection.clone(), entity_id))?;
        record.version = record.version.next();
        Ok(record.version)
    }

    /// Exports all committed records for snapshot persistence.
    #[must_use]
    pub fn export(&self) -> Vec<SnapshotRecord> {
        let records = self.records.read();
        let mut out: Vec<SnapshotRecord> = records
            .iter()
            .map(|((collection, entity_id), record)| SnapshotRecord {
                collection: collection.as_str().to_string(),
                entity_id: *entity_id,
                version: record.version.as_u64(),
                natural_id: record.natural_id.clone(),
                payload: record.payload.clone(),
            })
            .collect();
        out.sort_by(|a, b| (&a.collection, a.entity_id).cmp(&(&b.collection, b.entity_id)));
        out
    }

    /// Replaces the store contents from snapshot records.
    pub fn import(&self, snapshot_records: Vec<SnapshotRecord>) -> CoreResult<()> {
        let mut records = self.records.write();
        let mut natural_ids = self.natural_ids.write();
        records.clear();
        natural_ids.clear();

        for rec in snapshot_records {
            if rec.version == 0 {
                return Err(CoreError::invalid_snapshot(format!(
                    "record {} has version 0",
                    rec.entity_id
                )));
            }
            let collection = CollectionId::new(rec.collection);
            if let Some(nid) = &rec.natural_id {
                natural_ids.insert((collection.clone(), nid.clone()), rec.entity_id);
            }
            records.insert(
                (collection, rec.entity_id),
                StoredRecord {
                    payload: rec.payload,
                    version: Version::new(rec.version),
                    natural_id: rec.natural_id,
                },
            );
        }

        Ok(())
    }
}
