//! Catalog statistics

use serde::{Deserialize, Serialize};

use crate::store::{TemplateCategory, TemplateStore};
use crate::template::{Template, TemplateId};

/// How many entries the ranked lists keep
pub const TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSummary {
    pub id: TemplateId,
    pub name: String,
    pub usage_count: u64,
    pub rating: f64,
}

impl From<&Template> for TemplateSummary {
    fn from(template: &Template) -> Self {
        Self {
            id: template.id.clone(),
            name: template.name.clone(),
            usage_count: template.usage_count,
            rating: template.rating,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateAnalytics {
    pub total: usize,
    pub builtin: usize,
    pub custom: usize,
    pub premium: usize,
    pub total_usage: u64,
    /// Mean rating over all templates, zero for an empty catalog
    pub average_rating: f64,
    pub most_used: Vec<TemplateSummary>,
    pub top_rated: Vec<TemplateSummary>,
    pub categories: Vec<TemplateCategory>,
}

impl TemplateAnalytics {
    pub fn from_store(store: &TemplateStore) -> Self {
        let templates: Vec<&Template> = store.iter().collect();
        let total = templates.len();
        let custom = templates.iter().filter(|t| t.is_custom).count();
        let rating_sum: f64 = templates.iter().map(|t| t.rating).sum();

        let mut most_used = templates.clone();
        most_used.sort_by(|a, b| b.usage_count.cmp(&a.usage_count));
        let mut top_rated = templates.clone();
        top_rated.sort_by(|a, b| b.rating.total_cmp(&a.rating));

        Self {
            total,
            builtin: total - custom,
            custom,
            premium: templates.iter().filter(|t| t.is_premium).count(),
            total_usage: templates.iter().map(|t| t.usage_count).sum(),
            average_rating: if total == 0 { 0.0 } else { rating_sum / total as f64 },
            most_used: most_used
                .into_iter()
                .filter(|t| t.usage_count > 0)
                .take(TOP_N)
                .map(TemplateSummary::from)
                .collect(),
            top_rated: top_rated
                .into_iter()
                .take(TOP_N)
                .map(TemplateSummary::from)
                .collect(),
            categories: store.categories(),
        }
    }
}
