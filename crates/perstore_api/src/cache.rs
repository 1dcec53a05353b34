//! Cache interaction modes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a session reads from the second-level cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheRetrieveMode {
    /// Read entity data from the cache.
    Use,
    /// Never read from the cache.
    Bypass,
}

/// How a session writes to the second-level cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStoreMode {
    /// Write entity data to the cache when it is loaded or changed.
    Use,
    /// Never write to the cache.
    Bypass,
    /// Write to the cache on every read, refreshing entries that are
    /// already present. Refresh always implies bypass on retrieve.
    Refresh,
}

/// How a session interacts with the second-level cache.
///
/// A cache mode is a combination of a [`CacheStoreMode`] and a
/// [`CacheRetrieveMode`]. The set is deliberately closed at five
/// combinations: `(Refresh, Use)` is not a distinct mode because
/// refreshing always bypasses the cache on retrieve, so
/// [`CacheMode::from_modes`] collapses it to [`CacheMode::Refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Read from and write to the cache. The default.
    Normal,
    /// Neither read from nor write to the cache.
    Ignore,
    /// Read from the cache, but never write.
    Get,
    /// Write to the cache, but never read.
    Put,
    /// Write to the cache on every read, never reading back.
    Refresh,
}

impl CacheMode {
    /// All cache modes.
    pub const ALL: [CacheMode; 5] = [
        CacheMode::Normal,
        CacheMode::Ignore,
        CacheMode::Get,
        CacheMode::Put,
        CacheMode::Refresh,
    ];

    /// Returns the retrieve half of this mode.
    #[must_use]
    pub const fn retrieve_mode(self) -> CacheRetrieveMode {
        match self {
            CacheMode::Normal | CacheMode::Get => CacheRetrieveMode::Use,
            CacheMode::Ignore | CacheMode::Put | CacheMode::Refresh => CacheRetrieveMode::Bypass,
        }
    }

    /// Returns the store half of this mode.
    #[must_use]
    pub const fn store_mode(self) -> CacheStoreMode {
        match self {
            CacheMode::Normal | CacheMode::Put => CacheStoreMode::Use,
            CacheMode::Ignore | CacheMode::Get => CacheStoreMode::Bypass,
            CacheMode::Refresh => CacheStoreMode::Refresh,
        }
    }

    /// Builds a cache mode from its two halves.
    ///
    /// `(Use, Refresh)` collapses to [`CacheMode::Refresh`]: there is no
    /// "use retrieve + refresh store" mode, because refreshing implies
    /// bypassing the cache on reads.
    #[must_use]
    pub const fn from_modes(retrieve: CacheRetrieveMode, store: CacheStoreMode) -> CacheMode {
        match (retrieve, store) {
            (CacheRetrieveMode::Use, CacheStoreMode::Use) => CacheMode::Normal,
            (CacheRetrieveMode::Use, CacheStoreMode::Bypass) => CacheMode::Get,
            (CacheRetrieveMode::Bypass, CacheStoreMode::Use) => CacheMode::Put,
            (CacheRetrieveMode::Bypass, CacheStoreMode::Bypass) => CacheMode::Ignore,
            (_, CacheStoreMode::Refresh) => CacheMode::Refresh,
        }
    }

    /// Checks if this mode reads from the cache.
    #[must_use]
    pub const fn is_get_enabled(self) -> bool {
        matches!(self.retrieve_mode(), CacheRetrieveMode::Use)
    }

    /// Checks if this mode writes to the cache.
    #[must_use]
    pub const fn is_put_enabled(self) -> bool {
        !matches!(self.store_mode(), CacheStoreMode::Bypass)
    }
}

impl Default for CacheMode {
    fn default() -> Self {
        CacheMode::Normal
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheMode::Normal => "normal",
            CacheMode::Ignore => "ignore",
            CacheMode::Get => "get",
            CacheMode::Put => "put",
            CacheMode::Refresh => "refresh",
        };
        f.write_str(name)
    }
}
