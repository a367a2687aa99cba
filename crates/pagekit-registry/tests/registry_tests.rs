use pagekit::SectionValue;
use pagekit_registry::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;
use time::{Duration, OffsetDateTime};

fn builtin_sources() -> Vec<serde_json::Value> {
    vec![
        json!({
            "id": "restaurant",
            "name": "Restaurant",
            "description": "Menus and reservations",
            "category": "food",
            "tags": ["menu"],
            "rating": 4.5,
            "styles": { "primaryColor": "#b91c1c" },
            "elements": { "header": { "heading": "Fresh food" } }
        }),
        json!({
            "id": "tech-startup",
            "name": "Tech Startup",
            "description": "Launch your product",
            "category": "tech-startup",
            "tags": ["saas", "launch"],
            "isPremium": true,
            "rating": 4.8,
            "styles": { "primaryColor": "#3b82f6" },
            "elements": {}
        }),
    ]
}

struct Fixture {
    storage: Arc<MemoryStorage>,
    clock: Arc<ManualClock>,
    registry: Registry,
}

fn fixture_with(storage: MemoryStorage) -> Fixture {
    let storage = Arc::new(storage);
    let clock = Arc::new(ManualClock::new(OffsetDateTime::UNIX_EPOCH + Duration::days(365)));
    let registry = Registry::new(storage.clone(), RegistryConfig::default()).with_clock(clock.clone());
    Fixture {
        storage,
        clock,
        registry,
    }
}

fn fixture() -> Fixture {
    fixture_with(MemoryStorage::with_builtin(builtin_sources()))
}

fn assert_counts_match_recount(templates: &[Template], categories: &[TemplateCategory]) {
    for category in categories {
        let recount = templates.iter().filter(|t| t.category == category.id).count();
        assert_eq!(category.template_count, recount, "category {}", category.id);
    }
    let total: usize = categories.iter().map(|c| c.template_count).sum();
    assert_eq!(total, templates.len());
}

#[tokio::test]
async fn test_concurrent_loads_fetch_once() {
    let f = fixture_with(
        MemoryStorage::with_builtin(builtin_sources()).with_latency(StdDuration::from_millis(20)),
    );

    let (a, b, c) = tokio::join!(
        f.registry.load_all(false),
        f.registry.load_all(false),
        f.registry.load_all(true),
    );

    assert_eq!(a.unwrap().len(), 2);
    assert_eq!(b.unwrap().len(), 2);
    assert_eq!(c.unwrap().len(), 2);
    assert_eq!(f.storage.builtin_fetches(), 1);
    assert_eq!(f.storage.custom_fetches(), 1);
}

#[tokio::test]
async fn test_warm_cache_and_ttl() {
    let f = fixture();

    f.registry.init().await.unwrap();
    f.registry.list().await.unwrap();
    assert_eq!(f.storage.builtin_fetches(), 1);
    assert!(matches!(
        f.registry.cache_status(),
        CacheStatus::Warm { expired: false, .. }
    ));

    f.clock.advance(Duration::minutes(5));
    f.registry.list().await.unwrap();
    assert_eq!(f.storage.builtin_fetches(), 2);

    f.registry.load_all(true).await.unwrap();
    assert_eq!(f.storage.builtin_fetches(), 3);
}

#[tokio::test]
async fn test_clear_empties_and_reloads() {
    let f = fixture();
    f.registry.init().await.unwrap();

    f.registry.clear();
    assert_eq!(f.registry.cache_status(), CacheStatus::Empty);

    let templates = f.registry.list().await.unwrap();
    assert_eq!(templates.len(), 2);
    assert_eq!(f.storage.builtin_fetches(), 2);
}

#[tokio::test]
async fn test_unreachable_source_fails_load() {
    let f = fixture();
    f.storage.set_offline(true);

    let err = f.registry.load_all(false).await.unwrap_err();
    assert!(matches!(err, RegistryError::Load { .. }));

    f.storage.set_offline(false);
    assert_eq!(f.registry.load_all(false).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_malformed_templates_are_skipped() {
    let mut sources = builtin_sources();
    sources.push(json!({ "id": "no-name", "category": "food" }));
    sources.push(json!({
        "id": "bad-color",
        "name": "Bad",
        "category": "food",
        "styles": { "primaryColor": "not a color" }
    }));
    let f = fixture_with(MemoryStorage::with_builtin(sources));

    let templates = f.registry.load_all(false).await.unwrap();

    assert_eq!(templates.len(), 2);
}

#[tokio::test]
async fn test_get_by_id_tracks_usage() {
    let f = fixture();
    let used = Arc::new(AtomicUsize::new(0));
    let counter = used.clone();
    let _subscription = f.registry.subscribe(EventKind::Used, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let id = TemplateId::from("restaurant");

    let first = f.registry.get_by_id(&id, true).await.unwrap();
    let second = f.registry.get_by_id(&id, true).await.unwrap();
    let peek = f.registry.get_by_id(&id, false).await.unwrap();

    assert_eq!(first.usage_count, 1);
    assert_eq!(second.usage_count, 2);
    assert_eq!(peek.usage_count, 2);
    assert_eq!(used.load(Ordering::SeqCst), 2);

    let missing = f.registry.get_by_id(&TemplateId::from("nope"), true).await;
    assert!(matches!(missing, Err(RegistryError::TemplateNotFound(id)) if id == "nope"));
}

#[tokio::test]
async fn test_usage_survives_reload() {
    let f = fixture();
    let id = TemplateId::from("restaurant");

    f.registry.get_by_id(&id, true).await.unwrap();
    f.registry.get_by_id(&id, true).await.unwrap();

    f.clock.advance(Duration::minutes(6));
    let reloaded = f.registry.get_by_id(&id, false).await.unwrap();
    assert_eq!(f.storage.builtin_fetches(), 2);
    assert_eq!(reloaded.usage_count, 2);

    let forced = f.registry.load_all(true).await.unwrap();
    let restaurant = forced.iter().find(|t| t.id == id).unwrap();
    assert_eq!(restaurant.usage_count, 2);

    // Customs persisted before they were used keep their in-memory count too
    let custom = f
        .registry
        .create_custom(TemplateDraft::new("Cafe", "food"))
        .await
        .unwrap();
    f.registry.get_by_id(&custom.id, true).await.unwrap();
    f.registry.load_all(true).await.unwrap();
    assert_eq!(f.registry.get_by_id(&custom.id, false).await.unwrap().usage_count, 1);
}

#[tokio::test]
async fn test_returned_templates_are_copies() {
    let f = fixture();
    let id = TemplateId::from("restaurant");

    let mut copy = f.registry.get_by_id(&id, false).await.unwrap();
    copy.name = "Changed".into();
    copy.document = copy.document.set(&["styles", "primaryColor"], "#000000").unwrap();

    let stored = f.registry.get_by_id(&id, false).await.unwrap();
    assert_eq!(stored.name, "Restaurant");
    assert_eq!(stored.document.style("primaryColor"), Some("#b91c1c"));
}

#[tokio::test]
async fn test_search_rating_desc_scenario() {
    let f = fixture_with(MemoryStorage::with_builtin([
        json!({ "id": "a", "name": "A", "category": "biz", "rating": 4 }),
        json!({ "id": "b", "name": "B", "category": "biz", "rating": 5 }),
    ]));

    let filters = SearchFilters::new()
        .category("biz")
        .sort(SortKey::Rating, SortOrder::Desc);
    let results = f.registry.search(None, &filters).await.unwrap();

    let ids: Vec<&str> = results.iter().map(|t| t.id.as_ref()).collect();
    assert_eq!(ids, vec!["b", "a"]);

    let all = f.registry.search(None, &SearchFilters::new()).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_search_query_and_category_views() {
    let f = fixture();

    let saas = f.registry.search(Some("SAAS"), &SearchFilters::new()).await.unwrap();
    assert_eq!(saas.len(), 1);
    assert_eq!(saas[0].id, TemplateId::from("tech-startup"));

    let food = f.registry.templates_by_category("food").await.unwrap();
    assert_eq!(food.len(), 1);

    let categories = f.registry.categories().await.unwrap();
    let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Food", "Tech Startup"]);
}

#[tokio::test]
async fn test_custom_lifecycle_keeps_category_counts() {
    let f = fixture();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let _all = f.registry.subscribe_all(move |event| {
        sink.lock().unwrap().push(event.kind);
    });

    let created = f
        .registry
        .create_custom(TemplateDraft::new("Bistro", "food").tag("menu"))
        .await
        .unwrap();
    assert!(created.is_custom);
    assert_eq!(created.usage_count, 0);
    assert!(created.id.as_ref().starts_with("custom-"));
    assert_eq!(f.storage.custom_ids(&OwnerContext::default()), vec![created.id.clone()]);

    let templates = f.registry.list().await.unwrap();
    let categories = f.registry.categories().await.unwrap();
    assert_counts_match_recount(&templates, &categories);
    assert_eq!(categories[0].template_count, 2);

    f.clock.advance(Duration::seconds(30));
    let moved = f
        .registry
        .update(&created.id, TemplatePatch::new().category("cafe").name("Cafe"))
        .await
        .unwrap();
    assert_eq!(moved.name, "Cafe");
    assert_eq!(moved.id, created.id);
    assert!(moved.updated_at > created.updated_at);
    assert_eq!(moved.created_at, created.created_at);

    let templates = f.registry.list().await.unwrap();
    let categories = f.registry.categories().await.unwrap();
    assert_counts_match_recount(&templates, &categories);
    assert!(categories.iter().any(|c| c.id == "cafe" && c.template_count == 1));

    assert!(f.registry.delete(&created.id).await.unwrap());
    assert!(!f.registry.delete(&created.id).await.unwrap());

    let templates = f.registry.list().await.unwrap();
    let categories = f.registry.categories().await.unwrap();
    assert_counts_match_recount(&templates, &categories);
    assert!(categories.iter().all(|c| c.id != "cafe"));
    assert!(f.storage.custom_ids(&OwnerContext::default()).is_empty());

    assert_eq!(
        *events.lock().unwrap(),
        vec![EventKind::Created, EventKind::Updated, EventKind::Deleted]
    );
}

#[tokio::test]
async fn test_update_ignores_identity_fields() {
    let f = fixture();
    let created = f
        .registry
        .create_custom(TemplateDraft::new("Mine", "personal"))
        .await
        .unwrap();

    let patch: TemplatePatch = serde_json::from_value(json!({
        "id": "stolen",
        "isCustom": false,
        "description": "updated"
    }))
    .unwrap();
    let updated = f.registry.update(&created.id, patch).await.unwrap();

    assert_eq!(updated.id, created.id);
    assert!(updated.is_custom);
    assert_eq!(updated.description, "updated");
    assert!(f.registry.get_by_id(&TemplateId::from("stolen"), false).await.is_err());
}

#[tokio::test]
async fn test_builtins_are_immutable() {
    let f = fixture();
    let id = TemplateId::from("restaurant");
    let before = f.registry.list().await.unwrap();

    let update = f.registry.update(&id, TemplatePatch::new().name("Hacked")).await;
    assert!(matches!(update, Err(RegistryError::CannotModifyBuiltin(_))));

    let delete = f.registry.delete(&id).await;
    assert!(matches!(delete, Err(RegistryError::CannotModifyBuiltin(_))));

    assert_eq!(f.registry.list().await.unwrap(), before);
}

#[tokio::test]
async fn test_validation_errors_surface() {
    let f = fixture();

    let err = f
        .registry
        .create_custom(TemplateDraft::new("", "food"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Validation(TemplateValidationError::MissingField("name"))
    ));

    let created = f
        .registry
        .create_custom(TemplateDraft::new("Ok", "food"))
        .await
        .unwrap();
    let err = f
        .registry
        .update(&created.id, TemplatePatch::new().rating(9.0))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Validation(TemplateValidationError::InvalidRating(_))
    ));
    // The failed update left the stored template alone
    let stored = f.registry.get_by_id(&created.id, false).await.unwrap();
    assert_eq!(stored.rating, 0.0);
}

#[tokio::test]
async fn test_failed_persist_leaves_store_untouched() {
    let f = fixture();
    f.registry.init().await.unwrap();
    f.storage.set_offline(true);

    let err = f
        .registry
        .create_custom(TemplateDraft::new("Offline", "food"))
        .await
        .unwrap_err();

    assert!(matches!(err, RegistryError::Storage(StorageError::Unavailable(_))));
    assert_eq!(f.registry.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_custom_templates_load_from_storage() {
    let storage = MemoryStorage::with_builtin(builtin_sources());
    storage.add_custom(
        &OwnerContext::default(),
        "custom-saved",
        json!({ "id": "custom-saved", "name": "Saved", "category": "personal" }),
    );
    let f = fixture_with(storage);

    let saved = f
        .registry
        .get_by_id(&TemplateId::from("custom-saved"), false)
        .await
        .unwrap();
    assert!(saved.is_custom);
}

#[tokio::test]
async fn test_clone_and_variant() {
    let f = fixture();
    let base = TemplateId::from("restaurant");

    let copy = f
        .registry
        .clone_template(&base, TemplatePatch::new())
        .await
        .unwrap();
    assert_eq!(copy.name, "Restaurant (Copy)");
    assert_ne!(copy.id, base);
    assert!(copy.is_custom);
    assert_eq!(copy.usage_count, 0);
    assert_eq!(copy.document.style("primaryColor"), Some("#b91c1c"));

    let renamed = f
        .registry
        .clone_template(&base, TemplatePatch::new().name("Trattoria"))
        .await
        .unwrap();
    assert_eq!(renamed.name, "Trattoria");

    let variant = f
        .registry
        .create_variant(
            &base,
            "Restaurant B",
            VariantChanges::new()
                .style("primaryColor", "#047857")
                .section("header", SectionValue::from(json!({ "heading": "Try B" }))),
        )
        .await
        .unwrap();
    assert_eq!(variant.name, "Restaurant B");
    assert!(variant.has_tag("variant-of-restaurant"));
    assert!(variant.has_tag("menu"));
    assert_eq!(variant.document.style("primaryColor"), Some("#047857"));
    assert_eq!(
        variant.document.get(&["elements", "header", "heading"]),
        Some(SectionValue::from("Try B"))
    );

    // Cloning and deriving never count as a use of the source
    let source = f.registry.get_by_id(&base, false).await.unwrap();
    assert_eq!(source.usage_count, 0);
}

#[tokio::test]
async fn test_import_external_formats() {
    let f = fixture();

    let webflow = f
        .registry
        .import_external(
            &json!({
                "displayName": "Agency",
                "variables": { "primary-color": "#111827" },
                "sections": [{ "slug": "hero", "heading": "We design" }]
            }),
            "Webflow",
        )
        .await
        .unwrap();
    assert!(webflow.has_tag("imported-webflow"));
    assert_eq!(webflow.document.style("primaryColor"), Some("#111827"));

    let unknown = f
        .registry
        .import_external(&json!({ "title": "Somewhere else" }), "squarespace")
        .await
        .unwrap();
    assert_eq!(unknown.name, "Somewhere else");
    assert_eq!(unknown.category, "imported");
    assert!(unknown.has_tag("imported-squarespace"));

    let invalid = f.registry.import_external(&json!("text"), "figma").await;
    assert!(matches!(
        invalid,
        Err(RegistryError::Validation(TemplateValidationError::InvalidPayload(_)))
    ));
}

#[tokio::test]
async fn test_export_then_import() {
    let f = fixture();
    let id = TemplateId::from("tech-startup");

    let bytes = f.registry.export_as_document(&id).await.unwrap();
    let envelope: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(envelope["format"], "pagekit-template");
    assert_eq!(envelope["version"], "1.0");
    assert!(envelope["checksum"].as_str().unwrap().starts_with("sha256:"));
    assert_eq!(envelope["template"]["id"], "tech-startup");

    // Exporting is not a use
    assert_eq!(f.registry.get_by_id(&id, false).await.unwrap().usage_count, 0);

    let imported = f.registry.import_external(&envelope, "pagekit").await.unwrap();
    assert_eq!(imported.name, "Tech Startup");
    assert!(imported.is_custom);
    assert!(imported.has_tag("saas"));

    let mut tampered = envelope.clone();
    tampered["template"]["name"] = json!("Other");
    assert!(f.registry.import_external(&tampered, "pagekit").await.is_err());
}

#[tokio::test]
async fn test_backup_and_restore() {
    let f = fixture();
    f.registry
        .create_custom(TemplateDraft::new("First", "personal"))
        .await
        .unwrap();
    f.registry
        .create_custom(TemplateDraft::new("Second", "personal"))
        .await
        .unwrap();

    let bytes = f.registry.backup_all().await.unwrap();
    let backup: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(backup["version"], "1.0");
    assert_eq!(backup["templates"].as_array().unwrap().len(), 4);
    assert_eq!(backup["categories"].as_array().unwrap().len(), 3);

    // Restore into a fresh registry, with one broken entry added
    let mut doctored = backup.clone();
    doctored["templates"]
        .as_array_mut()
        .unwrap()
        .push(json!({ "id": "broken", "isCustom": true }));
    let target = fixture();
    let report = target
        .registry
        .restore_from_backup(&serde_json::to_vec(&doctored).unwrap())
        .await
        .unwrap();

    assert_eq!(report.restored_count, 2);
    assert_eq!(report.failed_count, 1);
    assert_eq!(target.registry.list().await.unwrap().len(), 4);
    assert_eq!(target.registry.templates_by_category("personal").await.unwrap().len(), 2);

    let future = json!({ "version": "9.9", "templates": [] }).to_string();
    assert!(matches!(
        target.registry.restore_from_backup(future.as_bytes()).await,
        Err(RegistryError::UnsupportedBackupVersion(_))
    ));
}

#[tokio::test]
async fn test_analytics_and_versions() {
    let f = fixture();
    let id = TemplateId::from("restaurant");
    f.registry.get_by_id(&id, true).await.unwrap();

    let analytics = f.registry.analytics().await.unwrap();
    assert_eq!(analytics.total, 2);
    assert_eq!(analytics.builtin, 2);
    assert_eq!(analytics.premium, 1);
    assert_eq!(analytics.total_usage, 1);
    assert_eq!(analytics.most_used[0].id, id);
    assert_eq!(analytics.top_rated[0].id, TemplateId::from("tech-startup"));

    assert!(f.registry.is_compatible(&id, "1.4.0").await.unwrap());
    assert!(!f.registry.is_compatible(&id, "2.0.0").await.unwrap());
    assert_eq!(f.registry.compare_versions("1.2", "1.10"), std::cmp::Ordering::Less);
}

#[tokio::test]
async fn test_listen_and_default_document() {
    let f = fixture();
    let mut receiver = f.registry.listen();

    let created = f
        .registry
        .create_custom(TemplateDraft::new("Heard", "food"))
        .await
        .unwrap();

    let event = receiver.recv().await.unwrap();
    assert_eq!(event.kind, EventKind::Created);
    assert_eq!(event.template_id, created.id);
    assert_eq!(event.timestamp, f.clock.now());

    let doc = f.registry.default_document();
    assert!(doc.section("navbar").is_some());
}

#[tokio::test]
async fn test_config_limits_tags() {
    let storage = Arc::new(MemoryStorage::with_builtin(builtin_sources()));
    let registry = Registry::new(storage, RegistryConfig::default().with_max_tags(1));

    let err = registry
        .create_custom(TemplateDraft::new("Tagged", "food").tags(["a", "b"]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Validation(TemplateValidationError::TooManyTags { count: 2, max: 1 })
    ));
}

#[tokio::test]
async fn test_provenance_tags_do_not_count_towards_limit() {
    let f = fixture();
    let full = f
        .registry
        .create_custom(TemplateDraft::new("Full", "food").tags((0..10).map(|i| format!("t{}", i))))
        .await
        .unwrap();

    let variant = f
        .registry
        .create_variant(&full.id, "Full (dark)", VariantChanges::new())
        .await
        .unwrap();
    assert_eq!(variant.tags.len(), 11);
    assert!(variant.tags.contains(&format!("variant-of-{}", full.id)));

    let export = f.registry.export_as_document(&full.id).await.unwrap();
    let envelope: serde_json::Value = serde_json::from_slice(&export).unwrap();
    let imported = f.registry.import_external(&envelope, "pagekit").await.unwrap();
    assert!(imported.tags.contains("imported-pagekit"));
    assert_eq!(imported.tags.len(), 11);

    let err = f
        .registry
        .create_custom(TemplateDraft::new("Crowded", "food").tags((0..11).map(|i| format!("t{}", i))))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Validation(TemplateValidationError::TooManyTags { count: 11, max: 10 })
    ));
}

/// Holds `persist_template` until the test releases it
struct GatedStorage {
    inner: MemoryStorage,
    gate: Mutex<Option<tokio::sync::oneshot::Receiver<()>>>,
}

#[async_trait::async_trait]
impl TemplateStorage for GatedStorage {
    fn name(&self) -> &str {
        "gated"
    }

    async fn fetch_builtin_templates(&self) -> std::result::Result<Vec<serde_json::Value>, StorageError> {
        self.inner.fetch_builtin_templates().await
    }

    async fn fetch_custom_templates(
        &self,
        owner: &OwnerContext,
    ) -> std::result::Result<Vec<serde_json::Value>, StorageError> {
        self.inner.fetch_custom_templates(owner).await
    }

    async fn persist_template(
        &self,
        owner: &OwnerContext,
        template: &Template,
    ) -> std::result::Result<(), StorageError> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.inner.persist_template(owner, template).await
    }

    async fn delete_template(&self, owner: &OwnerContext, id: &TemplateId) -> std::result::Result<(), StorageError> {
        self.inner.delete_template(owner, id).await
    }
}

#[tokio::test]
async fn test_update_racing_delete_leaves_nothing_persisted() {
    let storage = Arc::new(GatedStorage {
        inner: MemoryStorage::with_builtin(builtin_sources()),
        gate: Mutex::new(None),
    });
    let registry = Registry::new(storage.clone(), RegistryConfig::default());
    let owner = OwnerContext::default();

    let template = registry
        .create_custom(TemplateDraft::new("Doomed", "food"))
        .await
        .unwrap();
    assert_eq!(storage.inner.custom_ids(&owner), vec![template.id.clone()]);

    let (release, gate) = tokio::sync::oneshot::channel();
    *storage.gate.lock().unwrap() = Some(gate);

    let (updated, deleted) = tokio::join!(
        registry.update(&template.id, TemplatePatch::new().name("Renamed")),
        async {
            let deleted = registry.delete(&template.id).await;
            release.send(()).unwrap();
            deleted
        },
    );

    assert!(deleted.unwrap());
    assert!(matches!(updated, Err(RegistryError::TemplateNotFound(_))));
    assert!(storage.inner.custom_ids(&owner).is_empty());

    let reloaded = registry.load_all(true).await.unwrap();
    assert!(reloaded.iter().all(|t| t.id != template.id));
}
