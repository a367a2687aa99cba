//! Normalization of third-party template data into drafts
//!
//! Each importer maps one external format onto [`TemplateDraft`]. The
//! [`Importers`] table dispatches on a lowercase format name and falls back to
//! [`GenericImporter`] for formats it does not know.

use pagekit::{Mapping, PageDocument, SectionValue, Styles};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::backup::{EXPORT_FORMAT, ExportEnvelope};
use crate::template::TemplateDraft;
use crate::validation::TemplateValidationError;

/// Category given to imports that do not carry one
pub const IMPORTED_CATEGORY: &str = "imported";

/// Maps one external template format onto a draft
pub trait TemplateImporter: Send + Sync {
    /// Lowercase format name used for dispatch and the `imported-<format>` tag
    fn format(&self) -> &str;

    fn normalize(&self, data: &Value) -> Result<TemplateDraft, TemplateValidationError>;
}

/// Dispatch table of importers keyed by format name
#[derive(Clone)]
pub struct Importers {
    by_format: HashMap<String, Arc<dyn TemplateImporter>>,
    fallback: Arc<dyn TemplateImporter>,
}

impl Importers {
    /// An empty table that only knows the generic fallback
    pub fn empty() -> Self {
        Self {
            by_format: HashMap::new(),
            fallback: Arc::new(GenericImporter),
        }
    }

    /// Register or replace the importer for its format
    pub fn register(&mut self, importer: impl TemplateImporter + 'static) {
        self.by_format
            .insert(importer.format().to_lowercase(), Arc::new(importer));
    }

    pub fn get(&self, format: &str) -> Option<&dyn TemplateImporter> {
        self.by_format
            .get(&format.to_lowercase())
            .map(|importer| importer.as_ref())
    }

    /// The importer for `format`, or the generic fallback
    pub fn resolve(&self, format: &str) -> &dyn TemplateImporter {
        self.get(format).unwrap_or(self.fallback.as_ref())
    }

    /// Known format names, sorted
    pub fn formats(&self) -> Vec<&str> {
        let mut formats: Vec<&str> = self.by_format.keys().map(String::as_str).collect();
        formats.sort_unstable();
        formats
    }
}

impl Default for Importers {
    fn default() -> Self {
        let mut importers = Self::empty();
        importers.register(PagekitImporter);
        importers.register(WebflowImporter);
        importers.register(WordPressImporter);
        importers.register(FigmaImporter);
        importers
    }
}

impl fmt::Debug for Importers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Importers")
            .field("formats", &self.formats())
            .finish()
    }
}

/// Reads templates exported by a registry, or bare template JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct PagekitImporter;

impl TemplateImporter for PagekitImporter {
    fn format(&self) -> &str {
        "pagekit"
    }

    fn normalize(&self, data: &Value) -> Result<TemplateDraft, TemplateValidationError> {
        let template = if data.get("format").and_then(Value::as_str) == Some(EXPORT_FORMAT) {
            let envelope: ExportEnvelope = serde_json::from_value(data.clone())
                .map_err(|e| TemplateValidationError::InvalidPayload(e.to_string()))?;
            envelope.verify()?;
            envelope.template
        } else {
            data.clone()
        };

        serde_json::from_value(template).map_err(|e| TemplateValidationError::InvalidPayload(e.to_string()))
    }
}

/// Webflow site export: color variables and a list of sections
#[derive(Debug, Clone, Copy, Default)]
pub struct WebflowImporter;

impl TemplateImporter for WebflowImporter {
    fn format(&self) -> &str {
        "webflow"
    }

    fn normalize(&self, data: &Value) -> Result<TemplateDraft, TemplateValidationError> {
        let object = expect_object(data)?;

        let mut styles = Styles::new();
        if let Some(Value::Object(variables)) = object.get("variables") {
            for (key, value) in variables {
                if let Some(text) = scalar_text(value) {
                    styles.insert(camel_case(key), text);
                }
            }
        }

        let mut elements = Mapping::new();
        for section in array_field(data, "sections") {
            let Some(slug) = text_field(section, &["slug", "type"]) else {
                continue;
            };
            let mut fields = section.as_object().cloned().unwrap_or_default();
            fields.remove("slug");
            fields.remove("type");
            elements.insert(camel_case(&slug), SectionValue::from(Value::Object(fields)));
        }

        Ok(TemplateDraft {
            name: text_field(data, &["displayName", "name"]).unwrap_or_else(|| "Webflow site".into()),
            description: text_field(data, &["shortDescription", "description"]).unwrap_or_default(),
            category: text_field(data, &["category"]).unwrap_or_else(|| IMPORTED_CATEGORY.into()),
            tags: string_list(data, "tags"),
            author: text_field(data, &["workspace", "author"]).unwrap_or_default(),
            document: PageDocument::new(styles, elements),
            ..TemplateDraft::default()
        })
    }
}

/// WordPress REST export of a page with block content
#[derive(Debug, Clone, Copy, Default)]
pub struct WordPressImporter;

impl TemplateImporter for WordPressImporter {
    fn format(&self) -> &str {
        "wordpress"
    }

    fn normalize(&self, data: &Value) -> Result<TemplateDraft, TemplateValidationError> {
        expect_object(data)?;

        // Theme palette entries become `<slug>Color` styles
        let mut styles = Styles::new();
        let palette = data
            .pointer("/theme_json/settings/color/palette")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for entry in palette {
            if let (Some(slug), Some(color)) = (text_field(entry, &["slug"]), text_field(entry, &["color"])) {
                let key = camel_case(&slug);
                let key = if key.to_lowercase().ends_with("color") {
                    key
                } else {
                    format!("{}Color", key)
                };
                styles.insert(key, color);
            }
        }

        // Blocks are keyed by their short name; repeats get a numeric suffix
        let mut elements = Mapping::new();
        for block in array_field(data, "blocks") {
            let Some(block_name) = text_field(block, &["blockName"]) else {
                continue;
            };
            let short = camel_case(block_name.rsplit('/').next().unwrap_or(&block_name));
            let mut key = short.clone();
            let mut n = 2;
            while elements.contains_key(&key) {
                key = format!("{}{}", short, n);
                n += 1;
            }
            let attrs = block.get("attrs").cloned().unwrap_or(Value::Object(Default::default()));
            elements.insert(key, SectionValue::from(attrs));
        }

        let category = array_field(data, "categories")
            .iter()
            .find_map(Value::as_str)
            .map(str::to_string)
            .or_else(|| text_field(data, &["category"]))
            .unwrap_or_else(|| IMPORTED_CATEGORY.into());

        Ok(TemplateDraft {
            name: rendered(data, "title").unwrap_or_else(|| "WordPress page".into()),
            description: rendered(data, "excerpt").unwrap_or_default(),
            category,
            tags: string_list(data, "tags"),
            author: text_field(data, &["author_name", "author"]).unwrap_or_default(),
            document: PageDocument::new(styles, elements),
            ..TemplateDraft::default()
        })
    }
}

/// Figma file JSON: top-level frames of the first page become sections
#[derive(Debug, Clone, Copy, Default)]
pub struct FigmaImporter;

impl TemplateImporter for FigmaImporter {
    fn format(&self) -> &str {
        "figma"
    }

    fn normalize(&self, data: &Value) -> Result<TemplateDraft, TemplateValidationError> {
        expect_object(data)?;

        let frames = data
            .pointer("/document/children/0/children")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut styles = Styles::new();
        let mut elements = Mapping::new();
        for frame in frames.iter().filter(|node| node.get("type").and_then(Value::as_str) == Some("FRAME")) {
            let Some(name) = text_field(frame, &["name"]) else {
                continue;
            };

            if let Some(color) = frame.get("backgroundColor").and_then(figma_color) {
                styles.entry("backgroundColor".to_string()).or_insert(color);
            }

            let mut texts = Vec::new();
            collect_text(frame, &mut texts);
            elements.insert(
                camel_case(&name),
                SectionValue::map([
                    ("title".to_string(), SectionValue::from(name.as_str())),
                    ("text".to_string(), SectionValue::list(texts.into_iter().map(SectionValue::from))),
                ]),
            );
        }

        Ok(TemplateDraft {
            name: text_field(data, &["name"]).unwrap_or_else(|| "Figma design".into()),
            category: IMPORTED_CATEGORY.into(),
            thumbnail: text_field(data, &["thumbnailUrl"]),
            document: PageDocument::new(styles, elements),
            ..TemplateDraft::default()
        })
    }
}

/// Best-effort extraction of commonly named fields
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericImporter;

impl TemplateImporter for GenericImporter {
    fn format(&self) -> &str {
        "generic"
    }

    fn normalize(&self, data: &Value) -> Result<TemplateDraft, TemplateValidationError> {
        expect_object(data)?;

        let mut styles = Styles::new();
        if let Some(Value::Object(map)) = data.get("styles") {
            for (key, value) in map {
                if let Some(text) = scalar_text(value) {
                    styles.insert(key.clone(), text);
                }
            }
        }

        let elements = ["elements", "sections", "content"]
            .iter()
            .find_map(|key| match data.get(*key) {
                Some(Value::Object(map)) => Some(
                    map.iter()
                        .map(|(k, v)| (k.clone(), SectionValue::from(v.clone())))
                        .collect::<Mapping>(),
                ),
                _ => None,
            })
            .unwrap_or_default();

        Ok(TemplateDraft {
            name: text_field(data, &["name", "title", "displayName"])
                .unwrap_or_else(|| "Imported template".into()),
            description: text_field(data, &["description", "summary"]).unwrap_or_default(),
            category: text_field(data, &["category"]).unwrap_or_else(|| IMPORTED_CATEGORY.into()),
            tags: string_list(data, "tags"),
            author: text_field(data, &["author", "creator"]).unwrap_or_default(),
            document: PageDocument::new(styles, elements),
            ..TemplateDraft::default()
        })
    }
}

fn expect_object(data: &Value) -> Result<&serde_json::Map<String, Value>, TemplateValidationError> {
    data.as_object().ok_or_else(|| {
        TemplateValidationError::InvalidPayload("import data must be a JSON object".into())
    })
}

/// First non-empty string among `keys`
fn text_field(data: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| data.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

/// WordPress fields are either plain strings or `{ "rendered": "..." }`
fn rendered(data: &Value, key: &str) -> Option<String> {
    let html = match data.get(key)? {
        Value::String(text) => Some(text.clone()),
        other => text_field(other, &["rendered", "raw"]),
    }?;
    Some(strip_tags(&html)).filter(|text| !text.is_empty())
}

fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.trim().to_string()
}

fn array_field<'a>(data: &'a Value, key: &str) -> &'a [Value] {
    data.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn string_list(data: &Value, key: &str) -> std::collections::BTreeSet<String> {
    array_field(data, key)
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `primary-color` / `Hero Section` -> `primaryColor` / `heroSection`
fn camel_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut upper_next = false;
    for c in input.chars() {
        if c.is_alphanumeric() {
            if out.is_empty() {
                out.extend(c.to_lowercase());
            } else if upper_next {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            upper_next = false;
        } else {
            upper_next = true;
        }
    }
    out
}

/// Figma colors are `{ r, g, b, a }` with channels in `0..=1`
fn figma_color(color: &Value) -> Option<String> {
    let channel = |key: &str| -> Option<u8> {
        let v = color.get(key)?.as_f64()?;
        Some((v.clamp(0.0, 1.0) * 255.0).round() as u8)
    };
    let (r, g, b) = (channel("r")?, channel("g")?, channel("b")?);
    match channel("a") {
        Some(a) if a < 255 => Some(format!("#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)),
        _ => Some(format!("#{:02x}{:02x}{:02x}", r, g, b)),
    }
}

fn collect_text(node: &Value, out: &mut Vec<String>) {
    if node.get("type").and_then(Value::as_str) == Some("TEXT") {
        if let Some(text) = text_field(node, &["characters"]) {
            out.push(text);
        }
    }
    for child in array_field(node, "children") {
        collect_text(child, out);
    }
}
