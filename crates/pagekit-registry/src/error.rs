//! Error types for the pagekit registry

use thiserror::Error;

use crate::storage::StorageError;
use crate::validation::TemplateValidationError;

/// Registry-specific errors
///
/// Each failure a UI needs to explain differently has its own variant.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Template validation failed: {0}")]
    Validation(#[from] TemplateValidationError),

    #[error("Cannot modify built-in template {0}")]
    CannotModifyBuiltin(String),

    #[error("Failed to load templates from {source_name}: {reason}")]
    Load { source_name: String, reason: String },

    #[error("Unsupported backup version: {0}")]
    UnsupportedBackupVersion(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RegistryError {
    pub fn not_found(id: impl AsRef<str>) -> Self {
        Self::TemplateNotFound(id.as_ref().to_string())
    }

    pub fn builtin(id: impl AsRef<str>) -> Self {
        Self::CannotModifyBuiltin(id.as_ref().to_string())
    }
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
