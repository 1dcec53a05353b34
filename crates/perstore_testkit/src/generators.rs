//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data that maintains
//! required invariants.

use crate::fixtures::TestUser;
use perstore_api::{CacheMode, FlushMode, LockMode, Timeout};
use perstore_core::EntityId;
use proptest::prelude::*;

/// Strategy for generating valid entity IDs.
pub fn entity_id_strategy() -> impl Strategy<Value = EntityId> {
    prop::array::uniform16(any::<u8>()).prop_map(EntityId::from_bytes)
}

/// Strategy for generating any lock mode.
pub fn lock_mode_strategy() -> impl Strategy<Value = LockMode> {
    prop::sample::select(LockMode::ALL.to_vec())
}

/// Strategy for generating any cache mode.
pub fn cache_mode_strategy() -> impl Strategy<Value = CacheMode> {
    prop::sample::select(CacheMode::ALL.to_vec())
}

/// Strategy for generating any flush mode.
pub fn flush_mode_strategy() -> impl Strategy<Value = FlushMode> {
    prop::sample::select(FlushMode::ALL.to_vec())
}

/// Strategy for generating timeouts: the three sentinels plus real
/// waits.
pub fn timeout_strategy() -> impl Strategy<Value = Timeout> {
    prop_oneof![
        Just(Timeout::NO_WAIT),
        Just(Timeout::WAIT_FOREVER),
        Just(Timeout::SKIP_LOCKED),
        (1..=i32::MAX).prop_map(Timeout::from_millis),
    ]
}

/// Strategy for generating valid collection names.
pub fn collection_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,31}").expect("Invalid regex")
}

/// Strategy for generating test users.
pub fn user_strategy() -> impl Strategy<Value = TestUser> {
    (
        entity_id_strategy(),
        prop::string::string_regex("[a-z]{1,12}").expect("Invalid regex"),
        prop::string::string_regex("[A-Z][a-z]{1,12}").expect("Invalid regex"),
        any::<bool>(),
    )
        .prop_map(|(id, local, name, admin)| TestUser {
            id,
            email: format!("{local}@example.com"),
            name,
            admin,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn entity_ids_round_trip_through_bytes(id in entity_id_strategy()) {
            prop_assert_eq!(EntityId::from_bytes(id.into_bytes()), id);
        }

        #[test]
        fn generated_users_have_an_email_natural_id(user in user_strategy()) {
            use perstore_core::Entity;
            prop_assert_eq!(user.natural_id(), Some(user.email.clone()));
        }

        #[test]
        fn generated_timeouts_are_sentinel_or_real(timeout in timeout_strategy()) {
            let millis = timeout.milliseconds();
            prop_assert_eq!(Timeout::is_magic_value(millis), millis <= 0);
        }
    }
}
