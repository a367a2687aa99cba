//! Directory-backed template storage
//!
//! Layout under the root directory:
//!
//! ```text
//! builtin/<id>.json            bundled templates, read only
//! custom/<owner>/<id>.json     custom templates per owner
//! ```

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

use super::{OwnerContext, StorageError, TemplateStorage};
use crate::template::{Template, TemplateId};

/// File-based storage implementation
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new file storage with the given base path
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn builtin_dir(&self) -> PathBuf {
        self.base_path.join("builtin")
    }

    fn owner_dir(&self, owner: &OwnerContext) -> Result<PathBuf, StorageError> {
        Ok(self.base_path.join("custom").join(safe_component(&owner.owner)?))
    }

    fn template_file(&self, owner: &OwnerContext, id: &TemplateId) -> Result<PathBuf, StorageError> {
        Ok(self
            .owner_dir(owner)?
            .join(format!("{}.json", safe_component(id.as_ref())?)))
    }

    /// Read every `*.json` file of a directory in name order.
    ///
    /// Files that are not valid JSON are skipped with a warning.
    async fn read_json_dir(&self, dir: &Path) -> Result<Vec<serde_json::Value>, StorageError> {
        let mut entries = fs::read_dir(dir).await?;
        let mut paths = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut templates = Vec::with_capacity(paths.len());
        for path in paths {
            let text = fs::read_to_string(&path).await?;
            match serde_json::from_str(&text) {
                Ok(value) => templates.push(value),
                Err(e) => warn!("Skipping unreadable template file {}: {}", path.display(), e),
            }
        }

        Ok(templates)
    }
}

/// Reject names that would escape their directory
fn safe_component(name: &str) -> Result<&str, StorageError> {
    let unsafe_name = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');

    if unsafe_name {
        return Err(StorageError::Backend(format!("Invalid storage key: {:?}", name)));
    }
    Ok(name)
}

#[async_trait]
impl TemplateStorage for FileStorage {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch_builtin_templates(&self) -> Result<Vec<serde_json::Value>, StorageError> {
        let dir = self.builtin_dir();
        match self.read_json_dir(&dir).await {
            Err(StorageError::Io(e)) if e.kind() == ErrorKind::NotFound => Err(
                StorageError::Unavailable(format!("Missing built-in directory {}", dir.display())),
            ),
            other => other,
        }
    }

    async fn fetch_custom_templates(
        &self,
        owner: &OwnerContext,
    ) -> Result<Vec<serde_json::Value>, StorageError> {
        let dir = self.owner_dir(owner)?;
        match self.read_json_dir(&dir).await {
            // An owner without saved templates
            Err(StorageError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            other => other,
        }
    }

    async fn persist_template(
        &self,
        owner: &OwnerContext,
        template: &Template,
    ) -> Result<(), StorageError> {
        let file = self.template_file(owner, &template.id)?;
        fs::create_dir_all(self.owner_dir(owner)?).await?;

        let json = serde_json::to_string_pretty(template)
            .map_err(|e| StorageError::Backend(format!("Failed to serialize template: {}", e)))?;

        // Stage next to the target, then rename into place
        let staging = file.with_extension("json.tmp");
        fs::write(&staging, json).await?;
        fs::rename(&staging, &file).await?;

        Ok(())
    }

    async fn delete_template(&self, owner: &OwnerContext, id: &TemplateId) -> Result<(), StorageError> {
        let file = self.template_file(owner, id)?;

        match fs::remove_file(&file).await {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            other => other.map_err(StorageError::from),
        }
    }
}
