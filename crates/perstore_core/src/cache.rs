//! Second-level cache.
//!
//! A cache shared across sessions, keyed by collection region and
//! entity id. Whether a particular session reads from or writes to it
//! is governed by its [`CacheMode`](perstore_api::CacheMode); the cache
//! itself only stores, retrieves and evicts.

use crate::entity::EntityId;
use crate::stats::FactoryStats;
use crate::types::{CollectionId, Version};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// A cached entity payload with the version it was cached at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    /// Entity payload (CBOR bytes).
    pub payload: Vec<u8>,
    /// Version of the entity when it was cached.
    pub version: Version,
}

/// Shared second-level cache with per-collection regions.
#[derive(Debug)]
pub struct SecondLevelCache {
    regions: RwLock<HashMap<CollectionId, HashMap<EntityId, CachedEntry>>>,
    stats: Arc<FactoryStats>,
    enabled: bool,
}

impl SecondLevelCache {
    /// Creates a cache. A disabled cache ignores all puts and misses
    /// all gets.
    #[must_use]
    pub fn new(stats: Arc<FactoryStats>, enabled: bool) -> Self {
        Self {
            regions: RwLock::new(HashMap::new()),
            stats,
            enabled,
        }
    }

    /// Checks if the cache is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Looks up a cached entry, recording a hit or miss.
    #[must_use]
    pub fn get(&self, collection: &CollectionId, entity_id: EntityId) -> Option<CachedEntry> {
        if !self.enabled {
            return None;
        }
        let regions = self.regions.read();
        let entry = regions
            .get(collection)
            .and_then(|region| region.get(&entity_id))
            .cloned();
        if entry.is_some() {
            self.stats.record_cache_hit();
        } else {
            self.stats.record_cache_miss();
        }
        entry
    }

    /// Stores an entry, replacing any existing one.
    pub fn put(
        &self,
        collection: &CollectionId,
        entity_id: EntityId,
        payload: Vec<u8>,
        version: Version,
    ) {
        if !self.enabled {
            return;
        }
        let mut regions = self.regions.write();
        regions
            .entry(collection.clone())
            .or_default()
            .insert(entity_id, CachedEntry { payload, version });
        self.stats.record_cache_put();
        trace!(%collection, %entity_id, %version, "cache put");
    }

    /// Evicts a single entity.
    pub fn evict_entity(&self, collection: &CollectionId, entity_id: EntityId) {
        let mut regions = self.regions.write();
        if let Some(region) = regions.get_mut(collection) {
            region.remove(&entity_id);
        }
    }

    /// Evicts an entire collection region.
    pub fn evict_collection(&self, collection: &CollectionId) {
        self.regions.write().remove(collection);
    }

    /// Evicts everything.
    pub fn evict_all(&self) {
        self.regions.write().clear();
    }

    /// Returns the number of entries cached for a collection.
    #[must_use]
    pub fn region_len(&self, collection: &CollectionId) -> usize {
        self.regions
            .read()
            .get(collection)
            .map_or(0, HashMap::len)
    }
}
