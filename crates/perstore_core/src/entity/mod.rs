//! Entity contract and payload codec.

mod codec;
mod id;

pub use codec::{decode_entity, encode_entity};
pub use id::EntityId;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Trait for types that can be persisted as entities.
///
/// Entity state is serialized to CBOR through serde; the byte encoding
/// of a struct is deterministic (fields serialize in declaration
/// order), which is what makes snapshot byte comparison a sound dirty
/// check.
///
/// # Example
///
/// ```rust,ignore
/// use perstore_core::{Entity, EntityId};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct User {
///     id: EntityId,
///     email: String,
///     name: String,
/// }
///
/// impl Entity for User {
///     const COLLECTION: &'static str = "users";
///
///     fn entity_id(&self) -> EntityId {
///         self.id
///     }
///
///     fn natural_id(&self) -> Option<String> {
///         Some(self.email.clone())
///     }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned {
    /// The collection this entity type is stored in.
    ///
    /// The name doubles as the second-level cache region key.
    const COLLECTION: &'static str;

    /// Returns the entity's stable, immutable identifier.
    ///
    /// This ID must not change over the entity's lifetime.
    fn entity_id(&self) -> EntityId;

    /// Returns the entity's natural id, a business-meaningful alternate
    /// key distinct from the surrogate `entity_id`.
    ///
    /// Entities without a natural key return `None` (the default).
    fn natural_id(&self) -> Option<String> {
        None
    }
}
