//! # perstore Testkit
//!
//! Test utilities for perstore.
//!
//! This crate provides:
//! - Test fixtures and factory helpers
//! - Sample entity types used across the workspace's tests
//! - Property-based test generators using proptest
//! - Fuzz testing harnesses
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust,ignore
//! use perstore_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_factory() {
//!     with_factory(|factory| {
//!         let mut session = factory.open_session().unwrap();
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod fuzz;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::fuzz::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use fuzz::*;
pub use generators::*;
pub use stress::*;
