//! Factory configuration.

use perstore_api::{CacheMode, FlushMode, Timeout};

/// Configuration for opening a session factory.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Flush mode new sessions start with.
    pub default_flush_mode: FlushMode,

    /// Cache mode new sessions start with.
    pub default_cache_mode: CacheMode,

    /// Lock wait timeout used when a lock request doesn't specify one.
    pub default_lock_timeout: Timeout,

    /// Whether the second-level cache is enabled at all.
    pub use_second_level_cache: bool,

    /// Whether to persist a store snapshot on every session commit
    /// (safer but slower; a snapshot is always written on close).
    pub save_on_commit: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            default_flush_mode: FlushMode::Auto,
            default_cache_mode: CacheMode::Normal,
            default_lock_timeout: Timeout::WAIT_FOREVER,
            use_second_level_cache: true,
            save_on_commit: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the flush mode new sessions start with.
    #[must_use]
    pub const fn default_flush_mode(mut self, mode: FlushMode) -> Self {
        self.default_flush_mode = mode;
        self
    }

    /// Sets the cache mode new sessions start with.
    #[must_use]
    pub const fn default_cache_mode(mut self, mode: CacheMode) -> Self {
        self.default_cache_mode = mode;
        self
    }

    /// Sets the default lock wait timeout.
    #[must_use]
    pub const fn default_lock_timeout(mut self, timeout: Timeout) -> Self {
        self.default_lock_timeout = timeout;
        self
    }

    /// Enables or disables the second-level cache.
    #[must_use]
    pub const fn use_second_level_cache(mut self, value: bool) -> Self {
        self.use_second_level_cache = value;
        self
    }

    /// Sets whether to persist a snapshot on every commit.
    #[must_use]
    pub const fn save_on_commit(mut self, value: bool) -> Self {
        self.save_on_commit = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert_eq!(config.default_flush_mode, FlushMode::Auto);
        assert_eq!(config.default_cache_mode, CacheMode::Normal);
        assert_eq!(config.default_lock_timeout, Timeout::WAIT_FOREVER);
        assert!(config.use_second_level_cache);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .default_flush_mode(FlushMode::Commit)
            .use_second_level_cache(false)
            .default_lock_timeout(Timeout::NO_WAIT);

        assert_eq!(config.default_flush_mode, FlushMode::Commit);
        assert!(!config.use_second_level_cache);
        assert_eq!(config.default_lock_timeout, Timeout::NO_WAIT);
    }
}
