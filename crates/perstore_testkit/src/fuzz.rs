//! Fuzz testing harnesses for perstore.
//!
//! This module provides fuzz targets that can be used with cargo-fuzz
//! or other fuzzing frameworks.

use crate::fixtures::TestUser;
use perstore_core::{decode_entity, EntityId, SessionFactory};

/// Fuzz target for entity payload decoding.
///
/// Tests that arbitrary byte sequences either decode to a valid entity
/// or return a proper error (no panics).
pub fn fuzz_entity_decode(data: &[u8]) {
    let _ = decode_entity::<TestUser>(data);
}

/// Fuzz target for lock mode external-form parsing.
///
/// Arbitrary strings must either resolve to a mode or to `None`,
/// never panic.
pub fn fuzz_external_form_parse(data: &[u8]) {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = perstore_api::LockMode::from_external_form(text);
    }
}

/// Fuzz target for session operations.
///
/// Drives a session with a byte-encoded operation sequence; no
/// sequence may cause a panic.
pub fn fuzz_session_operations(data: &[u8]) {
    let factory = match SessionFactory::open_in_memory() {
        Ok(factory) => factory,
        Err(_) => return,
    };
    let mut session = match factory.open_session() {
        Ok(session) => session,
        Err(_) => return,
    };

    // A tiny pool of IDs so operations collide with each other.
    let ids: Vec<EntityId> = (0u8..4)
        .map(|n| EntityId::from_bytes([n; 16]))
        .collect();

    let mut offset = 0;
    while offset + 2 <= data.len() {
        let op = data[offset];
        let id = ids[(data[offset + 1] % 4) as usize];
        offset += 2;

        let user = TestUser {
            id,
            email: format!("{id}@example.com"),
            name: "fuzz".to_string(),
            admin: op % 2 == 0,
        };

        match op % 6 {
            0 => {
                let _ = session.persist(&user);
            }
            1 => {
                let _ = session.find::<TestUser>(id);
            }
            2 => {
                let _ = session.remove(&user);
            }
            3 => {
                let _ = session.merge(&user);
            }
            4 => {
                let _ = session.flush();
            }
            _ => {
                let _ = session.refresh::<TestUser>(id);
            }
        }
    }

    let _ = session.commit();
}
