//! The template registry
//!
//! A [`Registry`] is an explicitly constructed catalog with injected storage,
//! clock and importers. It loads lazily through a single-flight cache, keeps
//! the category index in step with every mutation and announces changes on
//! its [`EventChannel`].

use futures::FutureExt;
use pagekit::{Mapping, PageDocument, SectionValue, Styles};
use serde_json::{Value, json};
use std::cmp::Ordering;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::analytics::TemplateAnalytics;
use crate::backup::{BackupDocument, ExportEnvelope, RestoreReport, read_backup};
use crate::cache::{CacheController, CacheStatus, LoadFailure};
use crate::clock::{Clock, SystemClock};
use crate::config::{LoadPolicy, RegistryConfig};
use crate::error::{RegistryError, Result};
use crate::events::{EventChannel, EventKind, Subscription, TemplateEvent};
use crate::import::{Importers, TemplateImporter};
use crate::search::{self, SearchFilters};
use crate::storage::{OwnerContext, TemplateStorage};
use crate::store::{TemplateCategory, TemplateStore};
use crate::template::{
    IMPORT_TAG_PREFIX, Template, TemplateDraft, TemplateId, TemplatePatch, VARIANT_TAG_PREFIX,
};
use crate::validation::{TemplateValidationError, validate_draft, validate_template};
use crate::version;

/// Style and element overrides for [`Registry::create_variant`].
///
/// Both are merged one level deep: a listed style or section replaces the
/// base template's entry of the same name, everything else is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantChanges {
    pub styles: Styles,
    pub elements: Mapping,
}

impl VariantChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn style(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.styles.insert(key.into(), value.into());
        self
    }

    pub fn section(mut self, name: impl Into<String>, value: impl Into<SectionValue>) -> Self {
        self.elements.insert(name.into(), value.into());
        self
    }

    fn apply(&self, document: &PageDocument) -> PageDocument {
        let mut styles = document.styles().clone();
        styles.extend(self.styles.iter().map(|(k, v)| (k.clone(), v.clone())));
        let mut elements = document.elements().clone();
        elements.extend(self.elements.iter().map(|(k, v)| (k.clone(), v.clone())));
        PageDocument::new(styles, elements)
    }
}

/// Tag marking a variant's base template
pub fn variant_tag(base: &TemplateId) -> String {
    format!("{}{}", VARIANT_TAG_PREFIX, base)
}

/// Tag marking a template imported from `format`
pub fn import_tag(format: &str) -> String {
    format!("{}{}", IMPORT_TAG_PREFIX, format.trim().to_lowercase())
}

pub struct Registry {
    storage: Arc<dyn TemplateStorage>,
    config: RegistryConfig,
    clock: Arc<dyn Clock>,
    importers: Importers,
    cache: CacheController<Arc<TemplateStore>>,
    store: RwLock<TemplateStore>,
    events: EventChannel,
}

impl Registry {
    pub fn new(storage: Arc<dyn TemplateStorage>, config: RegistryConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            storage,
            cache: CacheController::new(config.cache_ttl, Arc::clone(&clock)),
            config,
            clock,
            importers: Importers::default(),
            store: RwLock::new(TemplateStore::new()),
            events: EventChannel::new(),
        }
    }

    /// Use `clock` for timestamps and cache expiry
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.cache.set_clock(Arc::clone(&clock));
        self.clock = clock;
        self
    }

    /// Add or replace an import format
    pub fn with_importer(mut self, importer: impl TemplateImporter + 'static) -> Self {
        self.importers.register(importer);
        self
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn importers(&self) -> &Importers {
        &self.importers
    }

    pub fn events(&self) -> &EventChannel {
        &self.events
    }

    fn owner(&self) -> &OwnerContext {
        &self.config.owner
    }

    fn read_store(&self) -> RwLockReadGuard<'_, TemplateStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_store(&self) -> RwLockWriteGuard<'_, TemplateStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, kind: EventKind, id: &TemplateId, metadata: Option<Value>) {
        let mut event = TemplateEvent::new(kind, id.clone(), self.clock.now());
        event.metadata = metadata;
        self.events.emit(event);
    }

    // Lifecycle

    /// Warm the cache
    pub async fn init(&self) -> Result<()> {
        self.ensure_loaded().await
    }

    /// Forget every template and return to the empty state.
    ///
    /// A load that is still running completes for its callers but is not
    /// installed.
    pub fn clear(&self) {
        self.cache.clear(|| *self.write_store() = TemplateStore::new());
        info!("Template cache cleared");
    }

    pub fn cache_status(&self) -> CacheStatus {
        self.cache.status()
    }

    /// Load (or join the running load of) the catalog.
    ///
    /// Returns the loaded store, or `None` when a fresh cache was reused.
    async fn warm(&self, force: bool) -> Result<Option<Arc<TemplateStore>>> {
        let storage = Arc::clone(&self.storage);
        let owner = self.owner().clone();
        let policy = self.config.load_policy;
        let max_tags = self.config.max_tags;

        let loaded = self
            .cache
            .load(
                force,
                move || fetch_store(storage, owner, policy, max_tags).boxed(),
                |store| {
                    let mut next = TemplateStore::clone(&store);
                    let mut current = self.write_store();
                    next.carry_usage(&current);
                    *current = next;
                },
            )
            .await?;

        Ok(loaded)
    }

    async fn ensure_loaded(&self) -> Result<()> {
        self.warm(false).await.map(|_| ())
    }

    /// Every template, reloading first when the cache is empty, stale or
    /// `force` is set. Concurrent callers share a single reload.
    pub async fn load_all(&self, force: bool) -> Result<Vec<Template>> {
        match self.warm(force).await? {
            Some(store) => {
                let mut loaded = TemplateStore::clone(&store);
                loaded.carry_usage(&self.read_store());
                Ok(loaded.snapshot())
            }
            None => Ok(self.read_store().snapshot()),
        }
    }

    /// Every template from a warm cache
    pub async fn list(&self) -> Result<Vec<Template>> {
        self.load_all(false).await
    }

    // Queries

    /// Look up a template; `track_usage` counts the access and emits `used`
    pub async fn get_by_id(&self, id: &TemplateId, track_usage: bool) -> Result<Template> {
        self.ensure_loaded().await?;

        let template = {
            let mut store = self.write_store();
            let template = store.get_mut(id).ok_or_else(|| RegistryError::not_found(id))?;
            if track_usage {
                template.usage_count = template.usage_count.saturating_add(1);
            }
            template.clone()
        };

        if track_usage {
            debug!("Template {} used ({} times)", id, template.usage_count);
            self.emit(
                EventKind::Used,
                id,
                Some(json!({ "usageCount": template.usage_count })),
            );
        }

        Ok(template)
    }

    pub async fn search(&self, query: Option<&str>, filters: &SearchFilters) -> Result<Vec<Template>> {
        self.ensure_loaded().await?;
        let store = self.read_store();
        Ok(search::search(store.iter(), query, filters))
    }

    pub async fn categories(&self) -> Result<Vec<TemplateCategory>> {
        self.ensure_loaded().await?;
        Ok(self.read_store().categories())
    }

    pub async fn templates_by_category(&self, category: &str) -> Result<Vec<Template>> {
        self.search(None, &SearchFilters::new().category(category)).await
    }

    pub async fn analytics(&self) -> Result<TemplateAnalytics> {
        self.ensure_loaded().await?;
        Ok(TemplateAnalytics::from_store(&self.read_store()))
    }

    /// The blank landing page used when no template is chosen
    pub fn default_document(&self) -> PageDocument {
        PageDocument::starter()
    }

    /// Whether a stored template can be opened by a builder of `target_version`
    pub async fn is_compatible(&self, id: &TemplateId, target_version: &str) -> Result<bool> {
        let template = self.get_by_id(id, false).await?;
        Ok(version::is_compatible(&template, target_version))
    }

    pub fn compare_versions(&self, a: &str, b: &str) -> Ordering {
        version::compare_versions(a, b)
    }

    // Mutations: persist first, then commit to the store, then announce

    pub async fn create_custom(&self, draft: TemplateDraft) -> Result<Template> {
        self.ensure_loaded().await?;
        validate_draft(&draft, self.config.max_tags)?;

        let template = Template::from_draft(TemplateId::new_custom(), draft, self.clock.now(), true);

        if let Err(e) = self.storage.persist_template(self.owner(), &template).await {
            error!("Failed to persist template {}: {}", template.id, e);
            return Err(e.into());
        }

        self.write_store().upsert(template.clone());
        info!("Created custom template {} ({})", template.id, template.name);
        self.emit(EventKind::Created, &template.id, None);

        Ok(template)
    }

    pub async fn update(&self, id: &TemplateId, patch: TemplatePatch) -> Result<Template> {
        self.ensure_loaded().await?;

        let current = self
            .read_store()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(id))?;
        if current.is_builtin() {
            warn!("Refusing to update built-in template {}", id);
            return Err(RegistryError::builtin(id));
        }

        let mut updated = patch.apply_to(&current);
        updated.updated_at = self.clock.now();
        validate_template(&updated, self.config.max_tags)?;

        if let Err(e) = self.storage.persist_template(self.owner(), &updated).await {
            error!("Failed to persist template {}: {}", id, e);
            return Err(e.into());
        }

        let committed = {
            let mut store = self.write_store();
            // Usage may have been counted while persisting
            match store.get(id).map(|latest| latest.usage_count) {
                Some(usage_count) => {
                    updated.usage_count = usage_count;
                    store.upsert(updated.clone());
                    true
                }
                None => false,
            }
        };

        if !committed {
            // Deleted while persisting: drop the copy just written
            warn!("Template {} was deleted during update", id);
            if let Err(e) = self.storage.delete_template(self.owner(), id).await {
                error!("Failed to remove persisted copy of deleted template {}: {}", id, e);
            }
            return Err(RegistryError::not_found(id));
        }

        let metadata = (current.category != updated.category)
            .then(|| json!({ "previousCategory": current.category }));
        info!("Updated custom template {}", id);
        self.emit(EventKind::Updated, id, metadata);

        Ok(updated)
    }

    /// Remove a custom template; `false` when no such template exists
    pub async fn delete(&self, id: &TemplateId) -> Result<bool> {
        self.ensure_loaded().await?;

        let is_custom = self.read_store().get(id).map(|template| template.is_custom);
        match is_custom {
            None => return Ok(false),
            Some(false) => {
                warn!("Refusing to delete built-in template {}", id);
                return Err(RegistryError::builtin(id));
            }
            Some(true) => {}
        }

        if let Err(e) = self.storage.delete_template(self.owner(), id).await {
            error!("Failed to delete persisted template {}: {}", id, e);
            return Err(e.into());
        }

        let removed = self.write_store().remove(id).is_some();
        if removed {
            info!("Deleted custom template {}", id);
            self.emit(EventKind::Deleted, id, None);
        }

        Ok(removed)
    }

    /// Copy a template into a new custom one named `<name> (Copy)` unless
    /// `overrides` says otherwise. Reading the source does not count as use.
    pub async fn clone_template(&self, id: &TemplateId, overrides: TemplatePatch) -> Result<Template> {
        let source = self.get_by_id(id, false).await?;

        let mut draft = source.to_draft();
        draft.name = format!("{} (Copy)", source.name);
        overrides.apply_to_draft(&mut draft);

        self.create_custom(draft).await
    }

    /// Derive a custom template from `base_id` with merged overrides
    pub async fn create_variant(
        &self,
        base_id: &TemplateId,
        variant_name: impl Into<String>,
        changes: VariantChanges,
    ) -> Result<Template> {
        let base = self.get_by_id(base_id, false).await?;

        let mut draft = base.to_draft();
        draft.name = variant_name.into();
        draft.document = changes.apply(&base.document);
        draft.tags.insert(variant_tag(base_id));

        self.create_custom(draft).await
    }

    /// Normalize external template data and store it as a custom template.
    ///
    /// Unknown formats go through the generic importer.
    pub async fn import_external(&self, data: &Value, format: &str) -> Result<Template> {
        let importer = self.importers.resolve(format);
        debug!("Importing template as {} using the {} importer", format, importer.format());

        let mut draft = importer.normalize(data)?;
        draft.tags.insert(import_tag(format));

        self.create_custom(draft).await
    }

    /// Serialized [`ExportEnvelope`] of one template
    pub async fn export_as_document(&self, id: &TemplateId) -> Result<Vec<u8>> {
        let template = self.get_by_id(id, false).await?;
        let envelope = ExportEnvelope::new(&template, self.clock.now())?;
        Ok(envelope.to_bytes()?)
    }

    /// Serialized [`BackupDocument`] of the whole catalog
    pub async fn backup_all(&self) -> Result<Vec<u8>> {
        self.ensure_loaded().await?;

        let backup = {
            let store = self.read_store();
            BackupDocument::new(store.snapshot(), store.categories(), self.clock.now())
        };
        info!("Backed up {} templates", backup.templates.len());

        Ok(backup.to_bytes()?)
    }

    /// Re-create the custom templates of a backup under fresh ids.
    ///
    /// Built-ins in the backup are ignored. Entries that fail to parse,
    /// validate or persist are counted and skipped.
    pub async fn restore_from_backup(&self, bytes: &[u8]) -> Result<RestoreReport> {
        let entries = read_backup(bytes)?;
        let mut report = RestoreReport::default();

        for entry in entries {
            let template: Template = match serde_json::from_value(entry) {
                Ok(template) => template,
                Err(e) => {
                    warn!("Skipping unreadable backup entry: {}", e);
                    report.failed_count += 1;
                    continue;
                }
            };
            if template.is_builtin() {
                continue;
            }

            match self.create_custom(template.to_draft()).await {
                Ok(restored) => {
                    report.restored_count += 1;
                    report.restored_ids.push(restored.id);
                }
                Err(e) => {
                    warn!("Failed to restore template {}: {}", template.id, e);
                    report.failed_count += 1;
                }
            }
        }

        info!(
            "Restore finished: {} restored, {} failed",
            report.restored_count, report.failed_count
        );
        Ok(report)
    }

    // Events

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&TemplateEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(kind, handler)
    }

    pub fn subscribe_all<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&TemplateEvent) + Send + Sync + 'static,
    {
        self.events.subscribe_all(handler)
    }

    pub fn listen(&self) -> broadcast::Receiver<TemplateEvent> {
        self.events.listen()
    }
}

/// Parse and validate one raw template from a source
fn parse_template(
    raw: Value,
    is_custom: bool,
    max_tags: usize,
) -> std::result::Result<Template, TemplateValidationError> {
    let mut template: Template = serde_json::from_value(raw)
        .map_err(|e| TemplateValidationError::InvalidPayload(e.to_string()))?;
    // The source decides mutability, not the payload
    template.is_custom = is_custom;
    validate_template(&template, max_tags)?;
    Ok(template)
}

/// Fetch both sources and build a complete store
async fn fetch_store(
    storage: Arc<dyn TemplateStorage>,
    owner: OwnerContext,
    policy: LoadPolicy,
    max_tags: usize,
) -> std::result::Result<Arc<TemplateStore>, LoadFailure> {
    let source = storage.name().to_string();
    info!("Loading templates from {} storage", source);

    let (builtin, custom) = futures::try_join!(
        storage.fetch_builtin_templates(),
        storage.fetch_custom_templates(&owner),
    )
    .map_err(|e| {
        error!("Template source {} unreachable: {}", source, e);
        LoadFailure::new(&source, e)
    })?;

    let raw = builtin
        .into_iter()
        .map(|value| (value, false))
        .chain(custom.into_iter().map(|value| (value, true)));

    let mut templates = Vec::new();
    let mut skipped = 0;
    for (value, is_custom) in raw {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("<missing id>")
            .to_string();

        match parse_template(value, is_custom, max_tags) {
            Ok(template) => templates.push(template),
            Err(e) => match policy {
                LoadPolicy::BestEffort => {
                    warn!("Skipping malformed template {}: {}", id, e);
                    skipped += 1;
                }
                LoadPolicy::Strict => {
                    error!("Aborting load on malformed template {}: {}", id, e);
                    return Err(LoadFailure::new(&source, format!("template {}: {}", id, e)));
                }
            },
        }
    }

    let store = TemplateStore::from_templates(templates);
    info!(
        "Loaded {} templates in {} categories ({} skipped)",
        store.len(),
        store.index().len(),
        skipped
    );

    Ok(Arc::new(store))
}
