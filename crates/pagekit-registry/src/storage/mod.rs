//! Storage collaborators for template sources and persistence

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::template::{Template, TemplateId};

pub mod memory;

pub use memory::MemoryStorage;

// Directory-backed implementation
#[cfg(feature = "fs")]
pub mod file;

#[cfg(feature = "fs")]
pub use file::FileStorage;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Whose custom templates are being read or written
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerContext {
    pub owner: String,
}

impl OwnerContext {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
        }
    }
}

impl Default for OwnerContext {
    fn default() -> Self {
        Self::new("local")
    }
}

impl fmt::Display for OwnerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.owner)
    }
}

/// Source of bundled templates and store for custom ones.
///
/// Fetches return raw JSON blobs; the registry validates them.
#[async_trait]
pub trait TemplateStorage: Send + Sync {
    /// Short name used in load errors and logs
    fn name(&self) -> &str;

    /// Raw definitions of every bundled template
    async fn fetch_builtin_templates(&self) -> Result<Vec<serde_json::Value>, StorageError>;

    /// Raw definitions of the custom templates belonging to `owner`
    async fn fetch_custom_templates(
        &self,
        owner: &OwnerContext,
    ) -> Result<Vec<serde_json::Value>, StorageError>;

    /// Create or overwrite a custom template
    async fn persist_template(
        &self,
        owner: &OwnerContext,
        template: &Template,
    ) -> Result<(), StorageError>;

    /// Remove a custom template; removing a missing one succeeds
    async fn delete_template(&self, owner: &OwnerContext, id: &TemplateId) -> Result<(), StorageError>;
}
