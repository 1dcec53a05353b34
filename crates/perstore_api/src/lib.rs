//! # perstore API
//!
//! Public contracts shared between applications and the perstore engine.
//!
//! This crate defines the mode enumerations that govern how a session
//! interacts with locks, caches and flushing, the millisecond timeout
//! sentinels, and the thin error types surfaced by query execution:
//!
//! - [`LockMode`]: lock levels, totally ordered by exclusivity
//! - [`CacheMode`]: the closed set of store-mode x retrieve-mode combinations
//! - [`FlushMode`]: flushing aggressiveness levels
//! - [`Timeout`]: millisecond timeouts with sentinel encodings
//! - [`LockOptions`]: a lock mode paired with a timeout
//!
//! Everything here is a plain value type with table-lookup semantics;
//! the engine that interprets them lives in `perstore_core`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod error;
mod flush;
mod lock;
mod timeout;

pub use cache::{CacheMode, CacheRetrieveMode, CacheStoreMode};
pub use error::{QueryError, TypeMismatchError};
pub use flush::FlushMode;
pub use lock::LockMode;
pub use timeout::{LockOptions, Timeout};
