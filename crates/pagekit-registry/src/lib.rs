//! # Pagekit Registry
//!
//! A catalog of reusable page templates for the pagekit builder:
//! - Built-in templates loaded from a storage source, immutable at runtime
//! - Custom templates created, updated and deleted through the registry
//! - A single-flight cache with TTL, so concurrent loads share one fetch
//! - Search, filtering, sorting and a category index kept in step
//! - Change events, import from other builders, export and backups
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use pagekit_registry::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let storage = Arc::new(FileStorage::new("./templates"));
//! let registry = Registry::new(storage, RegistryConfig::from_env()?);
//!
//! let _created = registry.subscribe(EventKind::Created, |event| {
//!     println!("new template {}", event.template_id);
//! });
//!
//! let template = registry
//!     .create_custom(TemplateDraft::new("Bakery", "food").tag("bread"))
//!     .await?;
//!
//! let found = registry
//!     .search(Some("bake"), &SearchFilters::new().sort(SortKey::Rating, SortOrder::Desc))
//!     .await?;
//! assert!(found.iter().any(|t| t.id == template.id));
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod backup;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod import;
pub mod registry;
pub mod search;
pub mod storage;
pub mod store;
pub mod template;
pub mod validation;
pub mod version;

pub use analytics::TemplateAnalytics;
pub use backup::{BackupDocument, ExportEnvelope, RestoreReport};
pub use cache::{CacheStatus, LoadFailure};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LoadPolicy, RegistryConfig};
pub use error::{RegistryError, Result};
pub use events::{EventChannel, EventKind, Subscription, TemplateEvent};
pub use import::{Importers, TemplateImporter};
pub use registry::{Registry, VariantChanges};
pub use search::{SearchFilters, SortKey, SortOrder};
pub use storage::{MemoryStorage, OwnerContext, StorageError, TemplateStorage};
pub use store::{TemplateCategory, TemplateStore};
pub use template::{Template, TemplateDraft, TemplateId, TemplatePatch};
pub use validation::TemplateValidationError;
pub use version::{compare_versions, is_compatible, parse_version};

#[cfg(feature = "fs")]
pub use storage::FileStorage;
