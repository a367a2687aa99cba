//! Walkthrough of the registry against directory-backed storage
//!
//! Seeds a temporary directory with two built-in templates, then exercises
//! loading, search, custom templates, events, export and backup.
//!
//! Run with: `RUST_LOG=debug cargo run --example walkthrough`
//! `PAGEKIT_*` variables (or a `.env` file) override the registry config.

use pagekit_registry::{
    FileStorage, Registry, RegistryConfig, SearchFilters, SortKey, SortOrder,
    TemplateDraft, TemplateId, TemplatePatch, VariantChanges,
};
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("pagekit_registry=info".parse()?),
        )
        .init();

    println!("🚀 Starting pagekit-registry walkthrough\n");

    let root = tempfile::tempdir()?;
    let builtin = root.path().join("builtin");
    std::fs::create_dir_all(&builtin)?;
    std::fs::write(
        builtin.join("restaurant.json"),
        serde_json::to_vec_pretty(&json!({
            "id": "restaurant",
            "name": "Restaurant",
            "description": "Menus, opening hours and reservations",
            "category": "food",
            "tags": ["menu", "local"],
            "rating": 4.6,
            "styles": { "primaryColor": "#b91c1c", "secondaryColor": "#fee2e2" },
            "elements": {
                "header": { "heading": "Fresh from the kitchen", "ctaButton": { "label": "Book a table", "link": "#book" } }
            }
        }))?,
    )?;
    std::fs::write(
        builtin.join("tech-startup.json"),
        serde_json::to_vec_pretty(&json!({
            "id": "tech-startup",
            "name": "Tech Startup",
            "description": "Launch page for a software product",
            "category": "tech-startup",
            "tags": ["saas", "launch"],
            "isPremium": true,
            "rating": 4.9,
            "styles": { "primaryColor": "#3b82f6", "secondaryColor": "#dbeafe" },
            "elements": { "header": { "heading": "Ship faster" } }
        }))?,
    )?;
    println!("📁 Seeded built-in templates in {}", builtin.display());

    let storage = Arc::new(FileStorage::new(root.path()));
    let registry = Registry::new(storage, RegistryConfig::from_env()?);

    let _events = registry.subscribe_all(|event| {
        println!("   📣 {} {}", event.kind, event.template_id);
    });

    // Two overlapping loads share one fetch
    let (first, second) = tokio::join!(registry.load_all(false), registry.load_all(false));
    println!("✅ Loaded {} templates ({} seen by the second caller)", first?.len(), second?.len());

    for category in registry.categories().await? {
        println!("   🗂️  {} ({} templates)", category.name, category.template_count);
    }

    let top = registry
        .search(None, &SearchFilters::new().sort(SortKey::Rating, SortOrder::Desc))
        .await?;
    println!("\n⭐ By rating: {:?}", top.iter().map(|t| t.name.as_str()).collect::<Vec<_>>());

    let restaurant = TemplateId::from("restaurant");
    let seed = registry.get_by_id(&restaurant, true).await?;
    let page = seed
        .page()
        .set(&["elements", "header", "heading"], "Tonight's specials")?
        .append(&["elements", "navbar", "links"], json!({ "label": "Menu", "link": "/menu" }))?;
    println!("\n✏️  Edited page seed:\n{}", page.to_json_pretty()?);

    println!("\n📝 Custom templates");
    let mine = registry
        .create_custom(
            TemplateDraft::new("My Bistro", "food")
                .description("Neighbourhood bistro")
                .tag("menu")
                .document(page),
        )
        .await?;
    let mine = registry
        .update(&mine.id, TemplatePatch::new().rating(4.0))
        .await?;
    let variant = registry
        .create_variant(
            &mine.id,
            "My Bistro (green)",
            VariantChanges::new().style("primaryColor", "#047857"),
        )
        .await?;
    let copy = registry.clone_template(&restaurant, TemplatePatch::new()).await?;
    println!("   created {}, {} and {}", mine.name, variant.name, copy.name);

    let imported = registry
        .import_external(
            &json!({
                "displayName": "Portfolio",
                "variables": { "accent-color": "#f59e0b" },
                "sections": [{ "slug": "hero", "heading": "Selected work" }]
            }),
            "webflow",
        )
        .await?;
    println!("   imported {} with tags {:?}", imported.name, imported.tags);

    let export = registry.export_as_document(&mine.id).await?;
    println!("\n📦 Export is {} bytes", export.len());

    let backup = registry.backup_all().await?;
    println!("💾 Backup is {} bytes", backup.len());

    registry.delete(&copy.id).await?;
    match registry.delete(&restaurant).await {
        Err(e) => println!("🔒 {}", e),
        Ok(_) => println!("⚠️  built-in template was deleted"),
    }

    let analytics = registry.analytics().await?;
    println!(
        "\n📊 {} templates ({} custom), {} uses",
        analytics.total, analytics.custom, analytics.total_usage
    );

    // A fresh registry restores the customs from the backup
    let fresh = tempfile::tempdir()?;
    let restored = Registry::new(Arc::new(FileStorage::new(fresh.path())), RegistryConfig::default());
    match restored.restore_from_backup(&backup).await {
        Ok(report) => println!("♻️  Restored {} templates", report.restored_count),
        Err(e) => println!("♻️  Restore failed: {}", e),
    }

    println!("\n🎉 Walkthrough finished");
    Ok(())
}
