//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use perstore_core::EntityId;
use perstore_testkit::fixtures::TestUser;

/// Generate a batch of entity IDs.
pub fn generate_ids(count: usize) -> Vec<EntityId> {
    (0..count).map(|_| EntityId::new()).collect()
}

/// Generate a batch of users with distinct IDs.
pub fn generate_users(count: usize) -> Vec<TestUser> {
    (0..count).map(TestUser::numbered).collect()
}
