//! Error types for the pagekit document engine
//!
//! Path operations are permissive by default, so the only failures are an
//! unusable path, a list index that does not exist, and (under the strict
//! coercion policy) a node whose shape does not match the operation.

use thiserror::Error;

/// Errors produced by path-addressed document operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Index {index} out of range for list at '{path}' (length {len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("Expected {expected} at '{path}', found {found}")]
    ShapeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl PathError {
    pub(crate) fn invalid<S: AsRef<str>>(path: &[S], reason: impl Into<String>) -> Self {
        PathError::InvalidPath {
            path: display_path(path),
            reason: reason.into(),
        }
    }
}

/// Shorthand result type for document operations
pub type Result<T> = std::result::Result<T, PathError>;

/// Render a path as dotted text for error messages and logs
pub fn display_path<S: AsRef<str>>(path: &[S]) -> String {
    if path.is_empty() {
        return "<root>".to_string();
    }
    path.iter()
        .map(|segment| segment.as_ref())
        .collect::<Vec<_>>()
        .join(".")
}
