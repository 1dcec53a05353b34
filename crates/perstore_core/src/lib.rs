//! perstore-core: an embedded, session-oriented entity store.
//!
//! Entities are plain Rust structs implementing [`Entity`]; a
//! [`SessionFactory`] owns the committed state and hands out
//! [`Session`]s, each a unit of work with its own persistence context.
//! Sessions track loaded entities, detect changes by comparing encoded
//! bytes and write ordered batches to the store on flush. Optimistic
//! versioning, pessimistic locks and a shared second-level cache guard
//! concurrent sessions; directory-backed stores persist snapshots
//! across restarts.
//!
//! ```rust,ignore
//! use perstore_core::{Config, SessionFactory};
//!
//! let factory = SessionFactory::open_in_memory()?;
//! let mut session = factory.open_session()?;
//!
//! session.persist(&user)?;
//! let found: Option<User> = session.find(user.id)?;
//! session.commit()?;
//! ```
//!
//! The session and query vocabulary (lock modes, cache modes, flush
//! modes, timeouts) lives in the `perstore_api` crate and is re-exported
//! here.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod entity;
mod error;
mod factory;
mod lock;
mod query;
mod session;
mod stats;
mod store;
mod types;

pub use cache::{CachedEntry, SecondLevelCache};
pub use config::Config;
pub use entity::{decode_entity, encode_entity, Entity, EntityId};
pub use error::{CoreError, CoreResult};
pub use factory::SessionFactory;
pub use lock::{LockOutcome, LockTable};
pub use query::Query;
pub use session::{FindOptions, Session, SessionState};
pub use stats::{FactoryStats, StatsSnapshot};
pub use store::{EntityStore, FlushAction, SnapshotFile, SnapshotRecord, StoreDir, StoredRecord};
pub use types::{CollectionId, SessionId, Version};

pub use perstore_api::{
    CacheMode, CacheRetrieveMode, CacheStoreMode, FlushMode, LockMode, LockOptions, QueryError,
    Timeout, TypeMismatchError,
};
