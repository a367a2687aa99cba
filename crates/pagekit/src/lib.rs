//! Pagekit is the document engine of a visual page builder: page documents
//! made of styles and nested element sections, edited through path-addressed
//! copy-on-write operations.
//!
//! ```rust
//! use pagekit::{PageDocument, SectionValue, append_list_item};
//! use serde_json::json;
//!
//! let doc = PageDocument::default();
//! let next = append_list_item(
//!     &doc,
//!     &["elements", "navbar", "links"],
//!     SectionValue::from(json!({ "label": "Home" })),
//! )
//! .unwrap();
//!
//! assert_eq!(
//!     next.get(&["elements", "navbar", "links"]),
//!     Some(SectionValue::from(json!([{ "label": "Home" }])))
//! );
//! assert_eq!(doc, PageDocument::default());
//! ```

pub mod document;
pub mod error;
pub mod path;
pub mod style;
pub mod value;

// Re-export core types
pub use document::{PageDocument, Styles};
pub use error::{PathError, Result};
pub use path::{
    CoercionPolicy, PathMutator, append_list_item, get_at_path, remove_list_item_at_path,
    set_at_path, update_list_item_at_path,
};
pub use value::{Mapping, SectionValue};

/// Get the library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
