//! Lock modes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The level of lock to be obtained or held for an entity.
///
/// Lock modes form a total order by exclusivity, exposed through
/// [`LockMode::level`]. A request for a weaker lock on an entity that
/// already holds a stronger one is a no-op; the engine enforces this by
/// comparing levels before touching the lock table.
///
/// Several variants share a level: `UpgradeNowait`, `UpgradeSkiplocked`
/// and `PessimisticWrite` all request an exclusive lock and differ only
/// in how long they are prepared to wait for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// No locking at all. The absence of a lock.
    None,
    /// A shared lock obtained implicitly by reading an entity.
    Read,
    /// An optimistic lock: the entity version is verified at commit.
    Optimistic,
    /// An optimistic lock that also increments the entity version at
    /// commit, even if the entity was never modified.
    OptimisticForceIncrement,
    /// A pessimistic shared lock, acquired immediately.
    PessimisticRead,
    /// An exclusive lock acquired without waiting: fails immediately if
    /// the entity is locked by another session.
    UpgradeNowait,
    /// An exclusive lock that skips rows locked by other sessions
    /// instead of waiting for them.
    UpgradeSkiplocked,
    /// A pessimistic exclusive lock, acquired immediately.
    PessimisticWrite,
    /// A pessimistic exclusive lock that also increments the entity
    /// version at commit.
    PessimisticForceIncrement,
    /// An exclusive lock obtained implicitly by writing an entity.
    Write,
}

impl LockMode {
    /// All lock modes, in declaration order.
    pub const ALL: [LockMode; 10] = [
        LockMode::None,
        LockMode::Read,
        LockMode::Optimistic,
        LockMode::OptimisticForceIncrement,
        LockMode::PessimisticRead,
        LockMode::UpgradeNowait,
        LockMode::UpgradeSkiplocked,
        LockMode::PessimisticWrite,
        LockMode::PessimisticForceIncrement,
        LockMode::Write,
    ];

    /// Returns the exclusivity ranking of this mode.
    ///
    /// Higher levels are more exclusive. Modes sharing a level request
    /// the same lock strength with different waiting behavior.
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            LockMode::None => 0,
            LockMode::Read => 1,
            LockMode::Optimistic => 2,
            LockMode::OptimisticForceIncrement => 3,
            LockMode::PessimisticRead => 4,
            LockMode::UpgradeNowait | LockMode::UpgradeSkiplocked | LockMode::PessimisticWrite => 5,
            LockMode::PessimisticForceIncrement | LockMode::Write => 6,
        }
    }

    /// Checks if this mode is more exclusive than `other`.
    #[must_use]
    pub const fn greater_than(self, other: LockMode) -> bool {
        self.level() > other.level()
    }

    /// Checks if this mode is less exclusive than `other`.
    #[must_use]
    pub const fn less_than(self, other: LockMode) -> bool {
        self.level() < other.level()
    }

    /// Checks if this mode requires a lock in the shared lock table.
    ///
    /// Optimistic modes never touch the lock table; they are verified
    /// against the entity version at commit instead.
    #[must_use]
    pub const fn is_pessimistic(self) -> bool {
        self.level() >= LockMode::PessimisticRead.level()
    }

    /// Checks if this mode forces a version increment at commit.
    #[must_use]
    pub const fn requires_version_increment(self) -> bool {
        matches!(
            self,
            LockMode::OptimisticForceIncrement
                | LockMode::PessimisticForceIncrement
                | LockMode::Write
        )
    }

    /// Returns the stable external form of this mode.
    ///
    /// External forms are the lower-snake spelling of the variant name
    /// and are used in configuration files.
    #[must_use]
    pub const fn external_form(self) -> &'static str {
        match self {
            LockMode::None => "none",
            LockMode::Read => "read",
            LockMode::Optimistic => "optimistic",
            LockMode::OptimisticForceIncrement => "optimistic_force_increment",
            LockMode::PessimisticRead => "pessimistic_read",
            LockMode::UpgradeNowait => "upgrade_nowait",
            LockMode::UpgradeSkiplocked => "upgrade_skiplocked",
            LockMode::PessimisticWrite => "pessimistic_write",
            LockMode::PessimisticForceIncrement => "pessimistic_force_increment",
            LockMode::Write => "write",
        }
    }

    /// Parses a lock mode from its external form.
    ///
    /// Matching is case-insensitive. The legacy alias `"upgrade"` maps
    /// to [`LockMode::PessimisticWrite`] for compatibility with old
    /// configuration files.
    #[must_use]
    pub fn from_external_form(value: &str) -> Option<LockMode> {
        let lowered = value.to_ascii_lowercase();
        // Legacy spelling predating the pessimistic_* names.
        if lowered == "upgrade" {
            return Some(LockMode::PessimisticWrite);
        }
        LockMode::ALL
            .into_iter()
            .find(|mode| mode.external_form() == lowered)
    }
}

impl Default for LockMode {
    fn default() -> Self {
        LockMode::None
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.external_form())
    }
}
