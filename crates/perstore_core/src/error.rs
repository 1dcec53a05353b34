//! Error types for the perstore engine.

use crate::entity::EntityId;
use crate::types::{CollectionId, Version};
use perstore_api::{LockMode, QueryError, Timeout, TypeMismatchError};
use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in perstore engine operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Entity payload could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },

    /// Query execution failed.
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// A value had an unexpected type.
    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatchError),

    /// Entity not found.
    #[error("entity not found: {entity_id} in collection {collection}")]
    EntityNotFound {
        /// The collection searched.
        collection: CollectionId,
        /// The entity ID that was not found.
        entity_id: EntityId,
    },

    /// An entity with the same ID already exists.
    #[error("entity already exists: {entity_id} in collection {collection}")]
    EntityExists {
        /// The collection holding the conflicting entity.
        collection: CollectionId,
        /// The conflicting entity ID.
        entity_id: EntityId,
    },

    /// The entity version changed underneath this session.
    #[error("stale entity in {collection}: loaded {expected}, store has {actual}")]
    StaleEntity {
        /// The collection holding the entity.
        collection: CollectionId,
        /// The version this session loaded.
        expected: Version,
        /// The version found in the store.
        actual: Version,
    },

    /// A pessimistic lock could not be acquired in time.
    #[error("lock timeout acquiring {mode} lock (waited {timeout})")]
    LockTimeout {
        /// The lock mode that was requested.
        mode: LockMode,
        /// The timeout that elapsed.
        timeout: Timeout,
    },

    /// Operation requires a managed entity but got a transient one.
    #[error("transient instance: entity {entity_id} in {collection} is not associated with this session")]
    TransientInstance {
        /// The collection of the transient entity.
        collection: CollectionId,
        /// The entity ID.
        entity_id: EntityId,
    },

    /// The session factory has been closed.
    #[error("session factory is closed")]
    FactoryClosed,

    /// Another process holds the store directory lock.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// The on-disk snapshot is corrupted or has an incompatible format.
    #[error("invalid snapshot: {message}")]
    InvalidSnapshot {
        /// Description of the problem.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates an invalid snapshot error.
    pub fn invalid_snapshot(message: impl Into<String>) -> Self {
        Self::InvalidSnapshot {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an entity-not-found error.
    pub fn entity_not_found(collection: CollectionId, entity_id: EntityId) -> Self {
        Self::EntityNotFound {
            collection,
            entity_id,
        }
    }

    /// Creates an entity-exists error.
    pub fn entity_exists(collection: CollectionId, entity_id: EntityId) -> Self {
        Self::EntityExists {
            collection,
            entity_id,
        }
    }
}
