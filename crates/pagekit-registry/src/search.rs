//! Template search, filtering and sorting

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::template::Template;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    Name,
    CreatedAt,
    UsageCount,
    Rating,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Narrowing and ordering applied after the text query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilters {
    /// Exact category id
    pub category: Option<String>,
    /// Keep templates sharing at least one of these tags
    pub tags: BTreeSet<String>,
    pub is_premium: Option<bool>,
    pub is_custom: Option<bool>,
    pub min_rating: Option<f64>,
    pub sort_by: Option<SortKey>,
    pub sort_order: SortOrder,
}

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn premium(mut self, is_premium: bool) -> Self {
        self.is_premium = Some(is_premium);
        self
    }

    pub fn custom(mut self, is_custom: bool) -> Self {
        self.is_custom = Some(is_custom);
        self
    }

    pub fn min_rating(mut self, rating: f64) -> Self {
        self.min_rating = Some(rating);
        self
    }

    pub fn sort(mut self, key: SortKey, order: SortOrder) -> Self {
        self.sort_by = Some(key);
        self.sort_order = order;
        self
    }

    pub fn matches(&self, template: &Template) -> bool {
        if self
            .category
            .as_ref()
            .is_some_and(|category| *category != template.category)
        {
            return false;
        }
        if !self.tags.is_empty() && self.tags.is_disjoint(&template.tags) {
            return false;
        }
        if self.is_premium.is_some_and(|premium| premium != template.is_premium) {
            return false;
        }
        if self.is_custom.is_some_and(|custom| custom != template.is_custom) {
            return false;
        }
        self.min_rating.is_none_or(|min| template.rating >= min)
    }
}

/// Case-insensitive substring match over the searchable text fields
pub fn matches_query(template: &Template, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }

    [
        template.name.as_str(),
        template.description.as_str(),
        template.category.as_str(),
        template.author.as_str(),
    ]
    .into_iter()
    .chain(template.tags.iter().map(String::as_str))
    .any(|field| field.to_lowercase().contains(&needle))
}

/// Natural name order: case-folded first, exact as a tie break
fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn compare_by(key: SortKey, a: &Template, b: &Template) -> Ordering {
    match key {
        SortKey::Name => compare_names(&a.name, &b.name),
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        SortKey::UsageCount => a.usage_count.cmp(&b.usage_count),
        SortKey::Rating => a.rating.total_cmp(&b.rating),
    }
}

/// Filter and sort `templates`, returning copies.
///
/// Without a sort key the input order is kept. Sorting is stable.
pub fn search<'a>(
    templates: impl IntoIterator<Item = &'a Template>,
    query: Option<&str>,
    filters: &SearchFilters,
) -> Vec<Template> {
    let mut results: Vec<Template> = templates
        .into_iter()
        .filter(|template| query.is_none_or(|query| matches_query(template, query)))
        .filter(|template| filters.matches(template))
        .cloned()
        .collect();

    if let Some(key) = filters.sort_by {
        results.sort_by(|a, b| {
            let ordering = compare_by(key, a, b);
            match filters.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
    }

    results
}
