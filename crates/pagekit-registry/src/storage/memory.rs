//! In-memory storage for tests, demos and embedding

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{OwnerContext, StorageError, TemplateStorage};
use crate::template::{Template, TemplateId};

/// Keeps built-in sources and custom templates in process memory.
///
/// Fetch counters, an outage switch and an artificial latency make it
/// useful for exercising the registry's caching behaviour.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    builtin: Mutex<Vec<serde_json::Value>>,
    custom: Mutex<HashMap<String, BTreeMap<TemplateId, serde_json::Value>>>,
    builtin_fetches: AtomicUsize,
    custom_fetches: AtomicUsize,
    offline: AtomicBool,
    latency: Option<Duration>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage seeded with built-in template definitions
    pub fn with_builtin(templates: impl IntoIterator<Item = serde_json::Value>) -> Self {
        Self {
            builtin: Mutex::new(templates.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Delay every fetch, so concurrent loads overlap
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn add_builtin(&self, template: serde_json::Value) {
        self.builtin.lock().unwrap_or_else(PoisonError::into_inner).push(template);
    }

    /// Insert a raw custom definition as if an earlier session saved it
    pub fn add_custom(&self, owner: &OwnerContext, id: impl Into<TemplateId>, template: serde_json::Value) {
        self.custom
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(owner.owner.clone())
            .or_default()
            .insert(id.into(), template);
    }

    /// Simulate an unreachable backend
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of built-in fetches served so far
    pub fn builtin_fetches(&self) -> usize {
        self.builtin_fetches.load(Ordering::SeqCst)
    }

    pub fn custom_fetches(&self) -> usize {
        self.custom_fetches.load(Ordering::SeqCst)
    }

    /// Ids of the persisted custom templates of `owner`
    pub fn custom_ids(&self, owner: &OwnerContext) -> Vec<TemplateId> {
        self.custom
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&owner.owner)
            .map(|templates| templates.keys().cloned().collect())
            .unwrap_or_default()
    }

    async fn round_trip(&self) -> Result<(), StorageError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory storage is offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TemplateStorage for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_builtin_templates(&self) -> Result<Vec<serde_json::Value>, StorageError> {
        self.builtin_fetches.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await?;

        let builtin = self
            .builtin
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;
        Ok(builtin.clone())
    }

    async fn fetch_custom_templates(
        &self,
        owner: &OwnerContext,
    ) -> Result<Vec<serde_json::Value>, StorageError> {
        self.custom_fetches.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await?;

        let custom = self
            .custom
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;
        Ok(custom
            .get(&owner.owner)
            .map(|templates| templates.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn persist_template(
        &self,
        owner: &OwnerContext,
        template: &Template,
    ) -> Result<(), StorageError> {
        self.round_trip().await?;
        let value = serde_json::to_value(template)
            .map_err(|e| StorageError::Backend(format!("Failed to serialize template: {}", e)))?;

        let mut custom = self
            .custom
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;
        custom
            .entry(owner.owner.clone())
            .or_default()
            .insert(template.id.clone(), value);
        Ok(())
    }

    async fn delete_template(&self, owner: &OwnerContext, id: &TemplateId) -> Result<(), StorageError> {
        self.round_trip().await?;

        let mut custom = self
            .custom
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;
        if let Some(templates) = custom.get_mut(&owner.owner) {
            templates.remove(id);
        }
        Ok(())
    }
}
