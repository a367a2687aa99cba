//! Export envelopes and whole-registry backups

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::error::{RegistryError, Result};
use crate::store::TemplateCategory;
use crate::template::{Template, TemplateId};
use crate::validation::TemplateValidationError;

/// `format` marker of a single-template export
pub const EXPORT_FORMAT: &str = "pagekit-template";

pub const EXPORT_VERSION: &str = "1.0";

pub const BACKUP_VERSION: &str = "1.0";

/// Content checksum of a JSON value, `sha256:<hex>`.
///
/// Object keys serialize in sorted order, so equal values hash equally
/// regardless of how they were produced.
pub fn checksum(value: &Value) -> String {
    format!("sha256:{:x}", Sha256::digest(value.to_string().as_bytes()))
}

/// A self-describing snapshot of one template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope {
    pub format: String,
    pub version: String,
    #[serde(with = "time::serde::rfc3339")]
    pub exported_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub template: Value,
}

impl ExportEnvelope {
    pub fn new(template: &Template, exported_at: OffsetDateTime) -> serde_json::Result<Self> {
        let template = serde_json::to_value(template)?;
        Ok(Self {
            format: EXPORT_FORMAT.to_string(),
            version: EXPORT_VERSION.to_string(),
            exported_at,
            checksum: Some(checksum(&template)),
            template,
        })
    }

    /// Check the format version and, when present, the checksum
    pub fn verify(&self) -> std::result::Result<(), TemplateValidationError> {
        if self.version != EXPORT_VERSION {
            return Err(TemplateValidationError::InvalidPayload(format!(
                "unsupported export version {}",
                self.version
            )));
        }

        match &self.checksum {
            Some(expected) if *expected != checksum(&self.template) => Err(
                TemplateValidationError::InvalidPayload("export checksum mismatch".into()),
            ),
            _ => Ok(()),
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// Every template and category of a registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupDocument {
    pub version: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub templates: Vec<Template>,
    pub categories: Vec<TemplateCategory>,
}

impl BackupDocument {
    pub fn new(
        templates: Vec<Template>,
        categories: Vec<TemplateCategory>,
        timestamp: OffsetDateTime,
    ) -> Self {
        Self {
            version: BACKUP_VERSION.to_string(),
            timestamp,
            templates,
            categories,
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}

/// Backup contents read leniently, one template at a time
#[derive(Deserialize)]
struct RawBackup {
    version: String,
    #[serde(default)]
    templates: Vec<Value>,
}

/// Parse backup bytes into raw template entries.
///
/// The document itself must be well formed and of a known version; the
/// entries are returned unparsed so a caller can count failures one by one.
pub fn read_backup(bytes: &[u8]) -> Result<Vec<Value>> {
    let backup: RawBackup = serde_json::from_slice(bytes)?;
    if backup.version != BACKUP_VERSION {
        return Err(RegistryError::UnsupportedBackupVersion(backup.version));
    }
    Ok(backup.templates)
}

/// Outcome of restoring a backup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub restored_count: usize,
    pub failed_count: usize,
    /// Ids given to the restored templates
    pub restored_ids: Vec<TemplateId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateDraft;
    use serde_json::json;

    fn template() -> Template {
        Template::from_draft(
            TemplateId::from("custom-1"),
            TemplateDraft::new("Mine", "personal").tag("dark"),
            OffsetDateTime::UNIX_EPOCH,
            true,
        )
    }

    #[test]
    fn test_checksum_ignores_key_order() {
        let a = json!({ "b": 1, "a": [1, 2] });
        let b: Value = serde_json::from_str(r#"{"a":[1,2],"b":1}"#).unwrap();

        assert_eq!(checksum(&a), checksum(&b));
        assert!(checksum(&a).starts_with("sha256:"));
        assert_eq!(checksum(&a).len(), "sha256:".len() + 64);
    }

    #[test]
    fn test_export_envelope_verifies() {
        let envelope = ExportEnvelope::new(&template(), OffsetDateTime::UNIX_EPOCH).unwrap();
        let bytes = envelope.to_bytes().unwrap();
        let parsed = ExportEnvelope::from_slice(&bytes).unwrap();

        assert_eq!(parsed.format, EXPORT_FORMAT);
        assert!(parsed.verify().is_ok());

        let mut tampered = parsed.clone();
        tampered.template["name"] = json!("Theirs");
        assert!(matches!(
            tampered.verify(),
            Err(TemplateValidationError::InvalidPayload(_))
        ));

        let mut unsigned = tampered;
        unsigned.checksum = None;
        assert!(unsigned.verify().is_ok());
    }

    #[test]
    fn test_read_backup_checks_version() {
        let backup = BackupDocument::new(vec![template()], vec![], OffsetDateTime::UNIX_EPOCH);
        let entries = read_backup(&backup.to_bytes().unwrap()).unwrap();
        assert_eq!(entries.len(), 1);

        let future = json!({ "version": "2.0", "templates": [] }).to_string();
        assert!(matches!(
            read_backup(future.as_bytes()),
            Err(RegistryError::UnsupportedBackupVersion(v)) if v == "2.0"
        ));

        assert!(matches!(
            read_backup(b"not json"),
            Err(RegistryError::Serialization(_))
        ));
    }
}
