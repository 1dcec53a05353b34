//! Flush modes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How aggressively a session synchronizes its in-memory entity state
/// with the store.
///
/// Flush modes are totally ordered by aggressiveness through
/// [`FlushMode::level`]. The levels are spaced out so that intermediate
/// modes can be introduced without renumbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
    /// Flush only when [`flush`] is called explicitly.
    ///
    /// [`flush`]: FlushMode::Manual
    Manual,
    /// Flush when the session commits.
    Commit,
    /// Flush at commit, and before queries whose results would
    /// otherwise miss pending changes. The default.
    Auto,
    /// Flush before every query.
    Always,
}

impl FlushMode {
    /// All flush modes, weakest first.
    pub const ALL: [FlushMode; 4] = [
        FlushMode::Manual,
        FlushMode::Commit,
        FlushMode::Auto,
        FlushMode::Always,
    ];

    /// Returns the aggressiveness level of this mode.
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            FlushMode::Manual => 0,
            FlushMode::Commit => 5,
            FlushMode::Auto => 10,
            FlushMode::Always => 20,
        }
    }

    /// Checks if this mode flushes less aggressively than `other`.
    #[must_use]
    pub const fn less_than(self, other: FlushMode) -> bool {
        self.level() < other.level()
    }
}

impl Default for FlushMode {
    fn default() -> Self {
        FlushMode::Auto
    }
}

impl fmt::Display for FlushMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlushMode::Manual => "manual",
            FlushMode::Commit => "commit",
            FlushMode::Auto => "auto",
            FlushMode::Always => "always",
        };
        f.write_str(name)
    }
}
