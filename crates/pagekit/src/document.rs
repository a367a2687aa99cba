//! The page document edited by a builder UI

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{PathError, Result};
use crate::path;
use crate::value::{Mapping, SectionValue};

/// Flat mapping of style names to values (`primaryColor` -> `#3b82f6`)
pub type Styles = BTreeMap<String, String>;

/// A page: global styles plus named element sections.
///
/// Documents are immutable values. Edits go through [`crate::PathMutator`]
/// (or the shorthand methods below) and produce a new document that shares
/// every untouched section with this one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageDocument {
    #[serde(default)]
    styles: Arc<Styles>,
    #[serde(default)]
    elements: Arc<Mapping>,
}

impl PageDocument {
    pub fn new(styles: Styles, elements: Mapping) -> Self {
        Self {
            styles: Arc::new(styles),
            elements: Arc::new(elements),
        }
    }

    /// The default landing page: navbar, header, services and footer
    pub fn starter() -> Self {
        let styles = Styles::from([
            ("primaryColor".to_string(), "#3b82f6".to_string()),
            ("secondaryColor".to_string(), "#dbeafe".to_string()),
        ]);
        let elements = SectionValue::from(json!({
            "navbar": {
                "logo": { "src": "" },
                "links": [],
                "actions": []
            },
            "header": {
                "heading": "Welcome to Your Landing Page",
                "description": "Create something amazing with our landing page builder.",
                "image": "",
                "ctaButton": { "label": "Get Started", "link": "#" }
            },
            "services": {
                "header": { "title": "Our Services", "description": "What we offer" },
                "section": []
            },
            "footer": {
                "logo": { "src": "" },
                "section": {
                    "main": {
                        "title": "Your Company",
                        "description": "Your company description",
                        "ctaButton": { "label": "Contact Us", "link": "#" },
                        "copyright": "© 2024 Your Company. All rights reserved.",
                        "privacyAndPolicy": { "label": "Privacy Policy", "link": "/privacy" }
                    },
                    "contact": {
                        "mail": "contact@yourcompany.com",
                        "phone": "+1 (555) 123-4567",
                        "address": "123 Main St, City, State 12345"
                    },
                    "social": [],
                    "services": []
                }
            }
        }));

        Self {
            styles: Arc::new(styles),
            elements: match elements {
                SectionValue::Map(map) => map,
                _ => Arc::default(),
            },
        }
    }

    pub fn styles(&self) -> &Styles {
        &self.styles
    }

    pub fn elements(&self) -> &Mapping {
        &self.elements
    }

    pub fn style(&self, key: &str) -> Option<&str> {
        self.styles.get(key).map(String::as_str)
    }

    /// A top-level element section such as `navbar` or `footer`
    pub fn section(&self, name: &str) -> Option<&SectionValue> {
        self.elements.get(name)
    }

    /// Read the value at a document path.
    ///
    /// `["styles", key]` yields a string value; `["elements", ...]` walks the
    /// element tree. The one-segment paths return the whole mapping.
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<SectionValue> {
        let (head, rest) = path.split_first()?;
        match (head.as_ref(), rest) {
            ("styles", []) => Some(SectionValue::map(
                self.styles.iter().map(|(k, v)| (k.clone(), v.clone())),
            )),
            ("styles", [key]) => self.style(key.as_ref()).map(SectionValue::from),
            ("elements", _) => path::get_at_path(&self.elements_tree(), rest).cloned(),
            _ => None,
        }
    }

    /// Set a value at a document path
    pub fn set<S: AsRef<str>>(&self, path: &[S], value: impl Into<SectionValue>) -> Result<Self> {
        path::set_at_path(self, path, value)
    }

    /// Set a value inside one element section, creating the section if needed
    pub fn update_section<S: AsRef<str>>(
        &self,
        section: &str,
        path: &[S],
        value: impl Into<SectionValue>,
    ) -> Result<Self> {
        let mut full = vec!["elements", section];
        full.extend(path.iter().map(|segment| segment.as_ref()));
        path::set_at_path(self, &full, value)
    }

    /// Append to the list at a document path
    pub fn append<S: AsRef<str>>(&self, path: &[S], value: impl Into<SectionValue>) -> Result<Self> {
        path::append_list_item(self, path, value)
    }

    /// Merge fields into a list item at a document path
    pub fn update_item<S: AsRef<str>>(
        &self,
        path: &[S],
        index: usize,
        patch: impl Into<SectionValue>,
    ) -> Result<Self> {
        path::update_list_item_at_path(self, path, index, patch)
    }

    /// Remove a list item at a document path
    pub fn remove_item<S: AsRef<str>>(&self, path: &[S], index: usize) -> Result<Self> {
        path::remove_list_item_at_path(self, path, index)
    }

    /// Parse a document from JSON text
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Build a document from a JSON value
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    pub fn to_value(&self) -> serde_json::Value {
        json!({
            "styles": self.styles.as_ref(),
            "elements": serde_json::Value::from(self.elements_tree()),
        })
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    // Copy-on-write plumbing used by the path mutator

    pub(crate) fn styles_arc(&self) -> &Arc<Styles> {
        &self.styles
    }

    pub(crate) fn elements_tree(&self) -> SectionValue {
        SectionValue::Map(Arc::clone(&self.elements))
    }

    pub(crate) fn with_styles(&self, styles: Styles) -> Self {
        self.with_styles_arc(Arc::new(styles))
    }

    pub(crate) fn with_styles_arc(&self, styles: Arc<Styles>) -> Self {
        Self {
            styles,
            elements: Arc::clone(&self.elements),
        }
    }

    pub(crate) fn with_elements_arc(&self, elements: Arc<Mapping>) -> Self {
        Self {
            styles: Arc::clone(&self.styles),
            elements,
        }
    }

    pub(crate) fn replace_elements<S: AsRef<str>>(
        &self,
        tree: SectionValue,
        path: &[S],
    ) -> Result<Self> {
        match tree {
            SectionValue::Map(elements) => Ok(self.with_elements_arc(elements)),
            other => Err(PathError::ShapeMismatch {
                path: crate::error::display_path(&path[..path.len().min(1)]),
                expected: "mapping",
                found: other.kind_name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starter_document() {
        let doc = PageDocument::starter();

        assert_eq!(doc.style("primaryColor"), Some("#3b82f6"));
        assert!(doc.section("navbar").is_some());
        assert_eq!(
            doc.get(&["elements", "header", "ctaButton", "label"]),
            Some(SectionValue::from("Get Started"))
        );
        assert_eq!(
            doc.get(&["elements", "footer", "section", "social"])
                .and_then(|v| v.as_list().map(<[_]>::len)),
            Some(0)
        );
    }

    #[test]
    fn test_json_shape() {
        let doc = PageDocument::from_json(
            r##"{"styles":{"primaryColor":"#111"},"elements":{"header":{"heading":"Hi"}}}"##,
        )
        .unwrap();

        assert_eq!(doc.style("primaryColor"), Some("#111"));
        assert_eq!(
            doc.to_value(),
            json!({ "styles": { "primaryColor": "#111" }, "elements": { "header": { "heading": "Hi" } } })
        );

        let empty = PageDocument::from_json("{}").unwrap();
        assert_eq!(empty, PageDocument::default());
    }

    #[test]
    fn test_update_section_creates_section() {
        let doc = PageDocument::default()
            .update_section("header", &["ctaButton", "label"], "Go")
            .unwrap();

        assert_eq!(
            doc.get(&["elements", "header", "ctaButton", "label"]),
            Some(SectionValue::from("Go"))
        );
    }

    #[test]
    fn test_get_unknown_root() {
        let doc = PageDocument::starter();
        assert!(doc.get(&["meta", "title"]).is_none());
        assert!(doc.get::<&str>(&[]).is_none());
    }
}
