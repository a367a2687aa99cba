//! In-memory template store with an incrementally maintained category index

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::template::{Template, TemplateId};

/// A category derived from the templates in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateCategory {
    pub id: String,
    pub name: String,
    pub description: String,
    pub template_count: usize,
}

impl TemplateCategory {
    fn new(id: &str, template_count: usize) -> Self {
        let name = title_case(id);
        Self {
            id: id.to_string(),
            description: format!("{} templates", name),
            name,
            template_count,
        }
    }
}

/// `tech-startup` -> `Tech Startup`
fn title_case(id: &str) -> String {
    id.split(['-', '_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Template count per category id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryIndex {
    counts: BTreeMap<String, usize>,
}

impl CategoryIndex {
    /// Count every template from scratch
    pub fn rebuild<'a>(templates: impl IntoIterator<Item = &'a Template>) -> Self {
        let mut index = Self::default();
        for template in templates {
            index.increment(&template.category);
        }
        index
    }

    fn increment(&mut self, category: &str) {
        *self.counts.entry(category.to_string()).or_insert(0) += 1;
    }

    fn decrement(&mut self, category: &str) {
        if let Some(count) = self.counts.get_mut(category) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.counts.remove(category);
            }
        }
    }

    pub fn count(&self, category: &str) -> usize {
        self.counts.get(category).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Categories ordered by id
    pub fn categories(&self) -> Vec<TemplateCategory> {
        self.counts
            .iter()
            .map(|(id, count)| TemplateCategory::new(id, *count))
            .collect()
    }
}

/// Templates keyed by id plus their category index.
///
/// Only the registry mutates a store; every mutation keeps the index in step.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: BTreeMap<TemplateId, Template>,
    index: CategoryIndex,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a complete store from loaded templates.
    ///
    /// Later duplicates of an id replace earlier ones.
    pub fn from_templates(templates: impl IntoIterator<Item = Template>) -> Self {
        let templates: BTreeMap<_, _> = templates
            .into_iter()
            .map(|template| (template.id.clone(), template))
            .collect();
        let index = CategoryIndex::rebuild(templates.values());
        Self { templates, index }
    }

    pub fn get(&self, id: &TemplateId) -> Option<&Template> {
        self.templates.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &TemplateId) -> Option<&mut Template> {
        self.templates.get_mut(id)
    }

    pub fn contains(&self, id: &TemplateId) -> bool {
        self.templates.contains_key(id)
    }

    /// Insert or replace a template, returning the previous version
    pub fn upsert(&mut self, template: Template) -> Option<Template> {
        self.index.increment(&template.category);
        let previous = self.templates.insert(template.id.clone(), template);
        if let Some(previous) = &previous {
            self.index.decrement(&previous.category);
        }
        previous
    }

    pub fn remove(&mut self, id: &TemplateId) -> Option<Template> {
        let removed = self.templates.remove(id)?;
        self.index.decrement(&removed.category);
        Some(removed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn index(&self) -> &CategoryIndex {
        &self.index
    }

    pub fn categories(&self) -> Vec<TemplateCategory> {
        self.index.categories()
    }

    /// Copies of every template, ordered by id
    pub fn snapshot(&self) -> Vec<Template> {
        self.templates.values().cloned().collect()
    }

    /// Keep usage counts from `previous` for ids present in both stores.
    ///
    /// Counts never go down: each template keeps the larger of the two.
    pub fn carry_usage(&mut self, previous: &TemplateStore) {
        for (id, template) in &mut self.templates {
            if let Some(old) = previous.templates.get(id) {
                template.usage_count = template.usage_count.max(old.usage_count);
            }
        }
    }

    /// True when the incremental index agrees with a fresh recount
    pub fn index_is_consistent(&self) -> bool {
        self.index == CategoryIndex::rebuild(self.templates.values())
    }
}
