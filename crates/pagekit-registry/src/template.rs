//! Template entities: stored templates, creation drafts and partial updates

use pagekit::{Mapping, PageDocument, Styles};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Unique identifier for a template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TemplateId(pub String);

impl TemplateId {
    /// Allocate a fresh identifier for a custom template
    pub fn new_custom() -> Self {
        TemplateId(format!("custom-{}", Uuid::new_v4()))
    }
}

impl From<String> for TemplateId {
    fn from(s: String) -> Self {
        TemplateId(s)
    }
}

impl From<&str> for TemplateId {
    fn from(s: &str) -> Self {
        TemplateId(s.to_string())
    }
}

impl AsRef<str> for TemplateId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tag prefix marking a variant's base template
pub const VARIANT_TAG_PREFIX: &str = "variant-of-";

/// Tag prefix marking the format a template was imported from
pub const IMPORT_TAG_PREFIX: &str = "imported-";

/// Tags the registry adds itself; they do not count towards the tag limit
pub fn is_provenance_tag(tag: &str) -> bool {
    tag.starts_with(VARIANT_TAG_PREFIX) || tag.starts_with(IMPORT_TAG_PREFIX)
}

pub(crate) fn default_version() -> String {
    "1.0.0".to_string()
}

fn unix_epoch() -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH
}

/// A reusable starter page plus its catalog metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Unique identifier, immutable once assigned
    pub id: TemplateId,

    /// Human-readable name
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Category id, e.g. `restaurant` or `tech-startup`
    pub category: String,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default)]
    pub author: String,

    /// Semantic version of the template content
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(with = "time::serde::rfc3339", default = "unix_epoch")]
    pub created_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339", default = "unix_epoch")]
    pub updated_at: OffsetDateTime,

    /// User-created (mutable) rather than bundled (immutable)
    #[serde(default)]
    pub is_custom: bool,

    #[serde(default)]
    pub is_premium: bool,

    /// How often the template was opened for use
    #[serde(default)]
    pub usage_count: u64,

    #[serde(default)]
    pub rating: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,

    /// The page seed: `styles` and `elements`
    #[serde(flatten)]
    pub document: PageDocument,
}

impl Template {
    /// Materialize a draft under the given identifier
    pub fn from_draft(id: TemplateId, draft: TemplateDraft, now: OffsetDateTime, is_custom: bool) -> Self {
        Template {
            id,
            name: draft.name,
            description: draft.description,
            category: draft.category,
            tags: draft.tags,
            author: draft.author,
            version: draft.version,
            created_at: now,
            updated_at: now,
            is_custom,
            is_premium: draft.is_premium,
            usage_count: 0,
            rating: draft.rating,
            thumbnail: draft.thumbnail,
            preview: draft.preview,
            document: draft.document,
        }
    }

    /// The creation input that would reproduce this template's content
    pub fn to_draft(&self) -> TemplateDraft {
        TemplateDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            tags: self.tags.clone(),
            author: self.author.clone(),
            version: self.version.clone(),
            is_premium: self.is_premium,
            rating: self.rating,
            thumbnail: self.thumbnail.clone(),
            preview: self.preview.clone(),
            document: self.document.clone(),
        }
    }

    pub fn is_builtin(&self) -> bool {
        !self.is_custom
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// The page seed handed to an editor
    pub fn page(&self) -> PageDocument {
        self.document.clone()
    }

    pub fn styles(&self) -> &Styles {
        self.document.styles()
    }

    pub fn elements(&self) -> &Mapping {
        self.document.elements()
    }
}

/// Input for creating a custom template.
///
/// Identifier, timestamps, usage counter and the custom flag are assigned by
/// the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub author: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub rating: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(flatten)]
    pub document: PageDocument,
}

impl Default for TemplateDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            category: String::new(),
            tags: BTreeSet::new(),
            author: String::new(),
            version: default_version(),
            is_premium: false,
            rating: 0.0,
            thumbnail: None,
            preview: None,
            document: PageDocument::default(),
        }
    }
}

impl TemplateDraft {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn premium(mut self, is_premium: bool) -> Self {
        self.is_premium = is_premium;
        self
    }

    pub fn rating(mut self, rating: f64) -> Self {
        self.rating = rating;
        self
    }

    pub fn thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn document(mut self, document: PageDocument) -> Self {
        self.document = document;
        self
    }
}

/// Partial update of a custom template.
///
/// `id` and `isCustom` are accepted so that whole-template JSON can be sent
/// as a patch, but they are never applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TemplateId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_custom: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_premium: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<Styles>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<Mapping>,
}

impl TemplatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn premium(mut self, is_premium: bool) -> Self {
        self.is_premium = Some(is_premium);
        self
    }

    pub fn styles(mut self, styles: Styles) -> Self {
        self.styles = Some(styles);
        self
    }

    pub fn elements(mut self, elements: Mapping) -> Self {
        self.elements = Some(elements);
        self
    }

    /// Apply every present field to a draft
    pub fn apply_to_draft(&self, draft: &mut TemplateDraft) {
        if let Some(name) = &self.name {
            draft.name = name.clone();
        }
        if let Some(description) = &self.description {
            draft.description = description.clone();
        }
        if let Some(category) = &self.category {
            draft.category = category.clone();
        }
        if let Some(tags) = &self.tags {
            draft.tags = tags.clone();
        }
        if let Some(author) = &self.author {
            draft.author = author.clone();
        }
        if let Some(version) = &self.version {
            draft.version = version.clone();
        }
        if let Some(is_premium) = self.is_premium {
            draft.is_premium = is_premium;
        }
        if let Some(rating) = self.rating {
            draft.rating = rating;
        }
        if let Some(thumbnail) = &self.thumbnail {
            draft.thumbnail = Some(thumbnail.clone());
        }
        if let Some(preview) = &self.preview {
            draft.preview = Some(preview.clone());
        }
        if self.styles.is_some() || self.elements.is_some() {
            let styles = self
                .styles
                .clone()
                .unwrap_or_else(|| draft.document.styles().clone());
            let elements = self
                .elements
                .clone()
                .unwrap_or_else(|| draft.document.elements().clone());
            draft.document = PageDocument::new(styles, elements);
        }
    }

    /// Apply the patch to a stored template, keeping its identity fields
    pub fn apply_to(&self, template: &Template) -> Template {
        let mut draft = template.to_draft();
        self.apply_to_draft(&mut draft);

        let mut updated = Template::from_draft(
            template.id.clone(),
            draft,
            template.created_at,
            template.is_custom,
        );
        updated.usage_count = template.usage_count;
        updated.updated_at = template.updated_at;
        updated
    }
}
