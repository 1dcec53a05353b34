//! Lock timeouts and lock options.

use crate::lock::LockMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A lock wait timeout in milliseconds.
///
/// Non-positive values are sentinels, preserved exactly for
/// configuration compatibility:
///
/// - `0` ([`Timeout::NO_WAIT`]): fail immediately if the lock is held
/// - `-1` ([`Timeout::WAIT_FOREVER`]): wait indefinitely
/// - `-2` ([`Timeout::SKIP_LOCKED`]): skip locked rows instead of waiting
///
/// Positive values are real timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeout(i32);

/// Millisecond value of [`Timeout::NO_WAIT`].
pub const NO_WAIT_MILLI: i32 = 0;
/// Millisecond value of [`Timeout::WAIT_FOREVER`].
pub const WAIT_FOREVER_MILLI: i32 = -1;
/// Millisecond value of [`Timeout::SKIP_LOCKED`].
pub const SKIP_LOCKED_MILLI: i32 = -2;

impl Timeout {
    /// Fail immediately if the lock is held by another session.
    pub const NO_WAIT: Timeout = Timeout(NO_WAIT_MILLI);
    /// Wait indefinitely for the lock.
    pub const WAIT_FOREVER: Timeout = Timeout(WAIT_FOREVER_MILLI);
    /// Skip rows whose locks are held by other sessions.
    pub const SKIP_LOCKED: Timeout = Timeout(SKIP_LOCKED_MILLI);

    /// Creates a timeout from raw milliseconds, sentinels included.
    #[must_use]
    pub const fn from_millis(millis: i32) -> Self {
        Self(millis)
    }

    /// Returns the raw millisecond value.
    #[must_use]
    pub const fn milliseconds(self) -> i32 {
        self.0
    }

    /// Checks if a raw millisecond value is one of the sentinel
    /// encodings rather than a real wait time.
    #[must_use]
    pub const fn is_magic_value(millis: i32) -> bool {
        millis <= 0
    }

    /// Checks if this timeout is a real wait time.
    #[must_use]
    pub const fn is_real(self) -> bool {
        self.0 > 0
    }

    /// Converts a real timeout to a [`Duration`].
    ///
    /// Returns `None` for sentinel values.
    #[must_use]
    pub fn as_duration(self) -> Option<Duration> {
        if self.is_real() {
            Some(Duration::from_millis(self.0 as u64))
        } else {
            None
        }
    }

    /// Creates a timeout from a [`Duration`], saturating at `i32::MAX`
    /// milliseconds.
    #[must_use]
    pub fn from_duration(duration: Duration) -> Self {
        let millis = duration.as_millis().min(i32::MAX as u128) as i32;
        Self(millis)
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Timeout::WAIT_FOREVER
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Timeout::NO_WAIT => f.write_str("no-wait"),
            Timeout::WAIT_FOREVER => f.write_str("wait-forever"),
            Timeout::SKIP_LOCKED => f.write_str("skip-locked"),
            Timeout(ms) => write!(f, "{ms}ms"),
        }
    }
}

/// A lock request: the mode to acquire and how long to wait for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOptions {
    /// The lock mode to acquire.
    pub mode: LockMode,
    /// How long to wait for a contended lock.
    pub timeout: Timeout,
}

impl LockOptions {
    /// Creates lock options for a mode with the default timeout.
    #[must_use]
    pub const fn new(mode: LockMode) -> Self {
        Self {
            mode,
            timeout: Timeout::WAIT_FOREVER,
        }
    }

    /// Sets the lock mode.
    #[must_use]
    pub const fn mode(mut self, mode: LockMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the wait timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the effective timeout, resolving the waiting behavior
    /// implied by the mode itself.
    ///
    /// `UpgradeNowait` and `UpgradeSkiplocked` carry their waiting
    /// policy in the mode name; this overrides any configured timeout.
    #[must_use]
    pub const fn effective_timeout(self) -> Timeout {
        match self.mode {
            LockMode::UpgradeNowait => Timeout::NO_WAIT,
            LockMode::UpgradeSkiplocked => Timeout::SKIP_LOCKED,
            _ => self.timeout,
        }
    }
}

impl Default for LockOptions {
    fn default() -> Self {
        Self::new(LockMode::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_values() {
        assert_eq!(Timeout::NO_WAIT.milliseconds(), 0);
        assert_eq!(Timeout::WAIT_FOREVER.milliseconds(), -1);
        assert_eq!(Timeout::SKIP_LOCKED.milliseconds(), -2);
    }

    #[test]
    fn magic_iff_non_positive() {
        for ms in [-2, -1, 0] {
            assert!(Timeout::is_magic_value(ms));
        }
        for ms in [1, 50, i32::MAX] {
            assert!(!Timeout::is_magic_value(ms));
        }
    }

    #[test]
    fn real_timeouts_convert_to_duration() {
        assert_eq!(
            Timeout::from_millis(250).as_duration(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(Timeout::NO_WAIT.as_duration(), None);
        assert_eq!(Timeout::WAIT_FOREVER.as_duration(), None);
        assert_eq!(Timeout::SKIP_LOCKED.as_duration(), None);
    }

    #[test]
    fn duration_round_trip_saturates() {
        let t = Timeout::from_duration(Duration::from_millis(1500));
        assert_eq!(t.milliseconds(), 1500);

        let huge = Timeout::from_duration(Duration::from_secs(u64::MAX / 2000));
        assert_eq!(huge.milliseconds(), i32::MAX);
    }

    #[test]
    fn display_forms() {
        assert_eq!(Timeout::NO_WAIT.to_string(), "no-wait");
        assert_eq!(Timeout::WAIT_FOREVER.to_string(), "wait-forever");
        assert_eq!(Timeout::SKIP_LOCKED.to_string(), "skip-locked");
        assert_eq!(Timeout::from_millis(30).to_string(), "30ms");
    }

    #[test]
    fn nowait_and_skiplocked_modes_force_their_timeout() {
        let nowait = LockOptions::new(LockMode::UpgradeNowait).timeout(Timeout::from_millis(100));
        assert_eq!(nowait.effective_timeout(), Timeout::NO_WAIT);

        let skip = LockOptions::new(LockMode::UpgradeSkiplocked);
        assert_eq!(skip.effective_timeout(), Timeout::SKIP_LOCKED);

        let plain = LockOptions::new(LockMode::PessimisticWrite).timeout(Timeout::from_millis(100));
        assert_eq!(plain.effective_timeout(), Timeout::from_millis(100));
    }
}
