//! API-level error types.

use thiserror::Error;

/// A problem executing a query, carrying the offending query
/// description when one is available.
#[derive(Debug, Clone, Error)]
pub struct QueryError {
    /// What went wrong.
    message: String,
    /// The query that failed, if known.
    query: Option<String>,
}

impl QueryError {
    /// Creates a query error without an associated query string.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            query: None,
        }
    }

    /// Creates a query error for a specific query.
    pub fn for_query(message: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            query: Some(query.into()),
        }
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the offending query, if known.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.query {
            Some(query) => write!(f, "{} [{}]", self.message, query),
            None => f.write_str(&self.message),
        }
    }
}

/// A value had a different type than the operation expected.
#[derive(Debug, Clone, Error)]
#[error("type mismatch: expected {expected}, got {actual}")]
pub struct TypeMismatchError {
    /// The expected type name.
    expected: String,
    /// The actual type name.
    actual: String,
}

impl TypeMismatchError {
    /// Creates a type mismatch error.
    pub fn new(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Returns the expected type name.
    #[must_use]
    pub fn expected(&self) -> &str {
        &self.expected
    }

    /// Returns the actual type name.
    #[must_use]
    pub fn actual(&self) -> &str {
        &self.actual
    }
}
