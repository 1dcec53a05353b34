//! Session factory and store recovery.

use crate::cache::SecondLevelCache;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::lock::LockTable;
use crate::session::Session;
use crate::stats::{FactoryStats, StatsSnapshot};
use crate::store::{EntityStore, SnapshotFile, StoreDir};
use crate::types::SessionId;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Shared factory state, referenced by the factory and every session
/// it opens.
#[derive(Debug)]
pub(crate) struct FactoryInner {
    /// Configuration.
    pub config: Config,
    /// Store directory (holds the lock). `None` for in-memory stores.
    pub dir: Option<StoreDir>,
    /// Committed entity state.
    pub store: EntityStore,
    /// Second-level cache.
    pub cache: SecondLevelCache,
    /// Pessimistic lock table.
    pub locks: LockTable,
    /// Statistics counters.
    pub stats: Arc<FactoryStats>,
    /// Whether the factory is open.
    is_open: RwLock<bool>,
}

impl FactoryInner {
    /// Ensures the factory is open.
    pub fn ensure_open(&self) -> CoreResult<()> {
        if *self.is_open.read() {
            Ok(())
        } else {
            Err(CoreError::FactoryClosed)
        }
    }

    /// Persists a snapshot of committed state, if the store is backed
    /// by a directory.
    pub fn save_snapshot(&self) -> CoreResult<()> {
        if let Some(dir) = &self.dir {
            let snapshot = SnapshotFile::new(self.store.export());
            dir.save_snapshot(&snapshot)?;
        }
        Ok(())
    }
}

/// The entry point for working with a perstore store.
///
/// A `SessionFactory` owns the committed entity state, the second-level
/// cache and the lock table shared by all sessions. The factory itself
/// is thread-safe; the [`Session`]s it opens are not, and each must be
/// confined to one unit of work.
///
/// # Opening a factory
///
/// ```rust,ignore
/// use perstore_core::SessionFactory;
/// use std::path::Path;
///
/// let factory = SessionFactory::open(Path::new("my_store"))?;
///
/// let mut session = factory.open_session()?;
/// session.persist(&user)?;
/// session.commit()?;
///
/// factory.close()?;
/// ```
///
/// For tests, use [`SessionFactory::open_in_memory`].
pub struct SessionFactory {
    inner: Arc<FactoryInner>,
    next_session_id: AtomicU64,
}

impl SessionFactory {
    /// Opens a factory over a store directory.
    ///
    /// Creates the directory if it doesn't exist (subject to
    /// [`Config::create_if_missing`]), acquires the exclusive directory
    /// lock and loads the committed snapshot if one is present.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another process has the store locked (`StoreLocked`)
    /// - The snapshot format is incompatible (`InvalidSnapshot`)
    /// - I/O errors occur
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a factory over a store directory with custom configuration.
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing)?;

        let store = EntityStore::new();
        if let Some(snapshot) = dir.load_snapshot()? {
            if !snapshot.is_compatible() {
                return Err(CoreError::invalid_snapshot(format!(
                    "incompatible snapshot format: store is v{}.{}",
                    snapshot.format_version.0, snapshot.format_version.1
                )));
            }
            store.import(snapshot.records)?;
        }

        debug!(path = %path.display(), entities = store.len(), "store opened");
        Ok(Self::from_parts(config, Some(dir), store))
    }

    /// Opens a fresh in-memory factory for testing.
    ///
    /// Nothing is persisted; state is lost when the factory is dropped.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_in_memory_with_config(Config::default())
    }

    /// Opens an in-memory factory with custom configuration.
    pub fn open_in_memory_with_config(config: Config) -> CoreResult<Self> {
        Ok(Self::from_parts(config, None, EntityStore::new()))
    }

    fn from_parts(config: Config, dir: Option<StoreDir>, store: EntityStore) -> Self {
        let stats = Arc::new(FactoryStats::new());
        let cache = SecondLevelCache::new(Arc::clone(&stats), config.use_second_level_cache);
        Self {
            inner: Arc::new(FactoryInner {
                config,
                dir,
                store,
                cache,
                locks: LockTable::new(),
                stats,
                is_open: RwLock::new(true),
            }),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Opens a new session.
    pub fn open_session(&self) -> CoreResult<Session> {
        self.inner.ensure_open()?;
        let id = SessionId::new(self.next_session_id.fetch_add(1, Ordering::SeqCst));
        self.inner.stats.record_session_opened();
        Ok(Session::new(Arc::clone(&self.inner), id))
    }

    /// Returns the second-level cache, for eviction and inspection.
    #[must_use]
    pub fn cache(&self) -> &SecondLevelCache {
        &self.inner.cache
    }

    /// Takes a snapshot of the factory statistics.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Returns the total number of committed entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.inner.store.len()
    }

    /// Persists a snapshot of committed state.
    pub fn checkpoint(&self) -> CoreResult<()> {
        self.inner.ensure_open()?;
        self.inner.save_snapshot()
    }

    /// Closes the factory.
    ///
    /// Persists a final snapshot if the store is directory-backed.
    /// Sessions opened from this factory fail on their next operation.
    pub fn close(&self) -> CoreResult<()> {
        let mut is_open = self.inner.is_open.write();
        if !*is_open {
            return Ok(());
        }
        self.inner.save_snapshot()?;
        *is_open = false;
        Ok(())
    }

    /// Checks if the factory is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.inner.is_open.read()
    }

    /// Returns the factory configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}

impl std::fmt::Debug for SessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFactory")
            .field("is_open", &self.is_open())
            .field("entity_count", &self.entity_count())
            .finish_non_exhaustive()
    }
}

impl Drop for SessionFactory {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
