//! Template schema validation

use pagekit::Styles;
use pagekit::style::{is_color_key, validate_color};
use std::collections::BTreeSet;

use crate::template::{Template, TemplateDraft, is_provenance_tag};
use crate::version::parse_version;

/// Upper bound of the rating scale
pub const MAX_RATING: f64 = 5.0;

/// Errors that can occur during template validation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TemplateValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid color for style '{key}': {value}")]
    InvalidColor { key: String, value: String },

    #[error("Invalid semantic version: {0}")]
    InvalidVersion(String),

    #[error("Too many tags: {count} (maximum {max})")]
    TooManyTags { count: usize, max: usize },

    #[error("Rating must be between 0 and 5, got {0}")]
    InvalidRating(f64),

    #[error("Invalid template payload: {0}")]
    InvalidPayload(String),
}

/// Validate a stored or loaded template
pub fn validate_template(template: &Template, max_tags: usize) -> Result<(), TemplateValidationError> {
    if template.id.as_ref().trim().is_empty() {
        return Err(TemplateValidationError::MissingField("id"));
    }
    validate_fields(Fields {
        name: &template.name,
        category: &template.category,
        version: &template.version,
        tags: &template.tags,
        rating: template.rating,
        styles: template.styles(),
        max_tags,
    })
}

/// Validate creation input
pub fn validate_draft(draft: &TemplateDraft, max_tags: usize) -> Result<(), TemplateValidationError> {
    validate_fields(Fields {
        name: &draft.name,
        category: &draft.category,
        version: &draft.version,
        tags: &draft.tags,
        rating: draft.rating,
        styles: draft.document.styles(),
        max_tags,
    })
}

struct Fields<'a> {
    name: &'a str,
    category: &'a str,
    version: &'a str,
    tags: &'a BTreeSet<String>,
    rating: f64,
    styles: &'a Styles,
    max_tags: usize,
}

fn validate_fields(fields: Fields<'_>) -> Result<(), TemplateValidationError> {
    if fields.name.trim().is_empty() {
        return Err(TemplateValidationError::MissingField("name"));
    }

    if fields.category.trim().is_empty() {
        return Err(TemplateValidationError::MissingField("category"));
    }

    parse_version(fields.version)?;

    let tag_count = fields.tags.iter().filter(|tag| !is_provenance_tag(tag)).count();
    if tag_count > fields.max_tags {
        return Err(TemplateValidationError::TooManyTags {
            count: tag_count,
            max: fields.max_tags,
        });
    }

    if !(0.0..=MAX_RATING).contains(&fields.rating) {
        return Err(TemplateValidationError::InvalidRating(fields.rating));
    }

    for (key, value) in fields.styles {
        if is_color_key(key) && !validate_color(value) {
            return Err(TemplateValidationError::InvalidColor {
                key: key.clone(),
                value: value.clone(),
            });
        }
    }

    Ok(())
}
