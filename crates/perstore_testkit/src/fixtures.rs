//! Test fixtures and factory helpers.
//!
//! Provides sample entity types and convenience functions for setting
//! up session factories in tests.

use perstore_core::{Config, Entity, EntityId, SessionFactory};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tempfile::TempDir;

/// A sample user entity with a natural id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestUser {
    /// Entity ID.
    pub id: EntityId,
    /// Email address, used as the natural id.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Whether the user can administer things.
    pub admin: bool,
}

impl Entity for TestUser {
    const COLLECTION: &'static str = "test_users";

    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn natural_id(&self) -> Option<String> {
        Some(self.email.clone())
    }
}

impl TestUser {
    /// Creates a user with a derived email and name.
    pub fn numbered(n: usize) -> Self {
        Self {
            id: EntityId::new(),
            email: format!("user{n}@example.com"),
            name: format!("User {n}"),
            admin: n % 10 == 0,
        }
    }
}

/// A sample order entity without a natural id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOrder {
    /// Entity ID.
    pub id: EntityId,
    /// Owning user.
    pub user_id: EntityId,
    /// Order total in cents.
    pub total_cents: u64,
}

impl Entity for TestOrder {
    const COLLECTION: &'static str = "test_orders";

    fn entity_id(&self) -> EntityId {
        self.id
    }
}

/// A session factory for tests with automatic cleanup.
pub struct TestFactory {
    /// The factory instance.
    pub factory: SessionFactory,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestFactory {
    /// Creates a new in-memory test factory.
    pub fn memory() -> Self {
        Self::memory_with_config(Config::default())
    }

    /// Creates an in-memory test factory with custom configuration.
    pub fn memory_with_config(config: Config) -> Self {
        Self {
            factory: SessionFactory::open_in_memory_with_config(config)
                .expect("Failed to open in-memory factory"),
            _temp_dir: None,
        }
    }

    /// Creates a new directory-backed test factory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let factory = SessionFactory::open(temp_dir.path()).expect("Failed to open store");
        Self {
            factory,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the store path if directory-backed, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().to_path_buf())
    }
}

impl std::ops::Deref for TestFactory {
    type Target = SessionFactory;

    fn deref(&self) -> &Self::Target {
        &self.factory
    }
}

/// Runs a test with a temporary in-memory factory.
///
/// # Example
///
/// ```rust,ignore
/// use perstore_testkit::with_factory;
///
/// #[test]
/// fn my_test() {
///     with_factory(|factory| {
///         let mut session = factory.open_session().unwrap();
///         // ... test operations
///     });
/// }
/// ```
pub fn with_factory<F, R>(f: F) -> R
where
    F: FnOnce(&SessionFactory) -> R,
{
    let test = TestFactory::memory();
    f(&test.factory)
}

/// Runs a test with a temporary directory-backed factory.
pub fn with_file_factory<F, R>(f: F) -> R
where
    F: FnOnce(&SessionFactory, &std::path::Path) -> R,
{
    let test = TestFactory::file();
    let path = test.path().expect("File factory should have a path");
    f(&test.factory, &path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a factory pre-populated with committed users.
    pub fn populated_factory(user_count: usize) -> (TestFactory, Vec<TestUser>) {
        let test = TestFactory::memory();
        let mut session = test.open_session().expect("Failed to open session");
        let users: Vec<TestUser> = (0..user_count).map(TestUser::numbered).collect();
        for user in &users {
            session.persist(user).expect("Failed to persist user");
        }
        session.commit().expect("Failed to commit");
        (test, users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_factory_opens() {
        with_factory(|factory| {
            assert!(factory.is_open());
            assert_eq!(factory.entity_count(), 0);
        });
    }

    #[test]
    fn file_factory_has_a_path() {
        with_file_factory(|factory, path| {
            assert!(factory.is_open());
            assert!(path.exists());
        });
    }

    #[test]
    fn populated_factory_commits_users() {
        let (factory, users) = scenarios::populated_factory(25);
        assert_eq!(factory.entity_count(), 25);
        assert_eq!(users.len(), 25);

        let mut session = factory.open_session().unwrap();
        let found: TestUser = session.find(users[3].id).unwrap().unwrap();
        assert_eq!(found, users[3]);
    }
}
