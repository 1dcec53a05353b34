//! CBOR encoding of entity payloads.

use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};

/// Encodes an entity to CBOR bytes.
///
/// Serde struct encoding is deterministic: identical state produces
/// identical bytes. Dirty checking relies on this.
pub fn encode_entity<T: Entity>(entity: &T) -> CoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(entity, &mut bytes).map_err(|e| CoreError::codec(e.to_string()))?;
    Ok(bytes)
}

/// Decodes an entity from CBOR bytes.
pub fn decode_entity<T: Entity>(bytes: &[u8]) -> CoreResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| CoreError::codec(e.to_string()))
}
