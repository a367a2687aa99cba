//! Path-addressed, copy-on-write edits
//!
//! Every operation takes a document by reference and returns a new one. Only
//! the nodes on the edited path are copied (via [`Arc::make_mut`] on a tree
//! whose root is shared with the caller's value); every other subtree stays
//! shared with the input.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::document::PageDocument;
use crate::error::{PathError, Result, display_path};
use crate::value::{Mapping, SectionValue};

/// What to do when a path runs into a node of the wrong shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoercionPolicy {
    /// Replace the node with an empty container of the expected shape
    #[default]
    Permissive,
    /// Fail with [`PathError::ShapeMismatch`]
    Strict,
}

impl CoercionPolicy {
    /// Make `node` a mapping and hand it out for writing.
    ///
    /// `Null` counts as absent under both policies.
    pub fn coerce_map<'a, S: AsRef<str>>(
        self,
        node: &'a mut SectionValue,
        at: &[S],
    ) -> Result<&'a mut Mapping> {
        if !node.is_map() {
            self.replace(node, SectionValue::empty_map(), "mapping", at)?;
        }
        match node {
            SectionValue::Map(map) => Ok(Arc::make_mut(map)),
            other => Err(mismatch(at, "mapping", other)),
        }
    }

    /// Make `node` a list and hand it out for writing
    pub fn coerce_list<'a, S: AsRef<str>>(
        self,
        node: &'a mut SectionValue,
        at: &[S],
    ) -> Result<&'a mut Vec<SectionValue>> {
        if !node.is_list() {
            self.replace(node, SectionValue::empty_list(), "list", at)?;
        }
        match node {
            SectionValue::List(items) => Ok(Arc::make_mut(items)),
            other => Err(mismatch(at, "list", other)),
        }
    }

    fn replace<S: AsRef<str>>(
        self,
        node: &mut SectionValue,
        empty: SectionValue,
        expected: &'static str,
        at: &[S],
    ) -> Result<()> {
        if node.is_null() || self == CoercionPolicy::Permissive {
            *node = empty;
            Ok(())
        } else {
            Err(mismatch(at, expected, node))
        }
    }
}

fn mismatch<S: AsRef<str>>(at: &[S], expected: &'static str, found: &SectionValue) -> PathError {
    PathError::ShapeMismatch {
        path: display_path(at),
        expected,
        found: found.kind_name(),
    }
}

/// Read the value at `path` inside a section tree
pub fn get_at_path<'a, S: AsRef<str>>(
    tree: &'a SectionValue,
    path: &[S],
) -> Option<&'a SectionValue> {
    path.iter()
        .try_fold(tree, |node, segment| node.get(segment.as_ref()))
}

/// Applies path edits under a chosen [`CoercionPolicy`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PathMutator {
    policy: CoercionPolicy,
}

impl PathMutator {
    pub fn new(policy: CoercionPolicy) -> Self {
        Self { policy }
    }

    /// Mutator that fails instead of coercing wrong-shaped nodes
    pub fn strict() -> Self {
        Self::new(CoercionPolicy::Strict)
    }

    pub fn policy(&self) -> CoercionPolicy {
        self.policy
    }

    // ------------------------------------------------------------------
    // Section trees
    // ------------------------------------------------------------------

    /// Set `value` at `path`, creating intermediate mappings as needed
    pub fn set_in_tree<S: AsRef<str>>(
        &self,
        tree: &SectionValue,
        path: &[S],
        value: impl Into<SectionValue>,
    ) -> Result<SectionValue> {
        ensure_not_empty(path)?;
        let mut root = tree.clone();
        *self.slot_mut(&mut root, path)? = value.into();
        Ok(root)
    }

    /// Shallow-merge `patch` into the list item at `index`
    pub fn update_list_item_in_tree<S: AsRef<str>>(
        &self,
        tree: &SectionValue,
        path: &[S],
        index: usize,
        patch: impl Into<SectionValue>,
    ) -> Result<SectionValue> {
        ensure_not_empty(path)?;
        let patch = patch.into();
        let mut root = tree.clone();
        let slot = self.slot_mut(&mut root, path)?;
        let items = self.policy.coerce_list(slot, path)?;
        let len = items.len();
        let item = items
            .get_mut(index)
            .ok_or_else(|| PathError::IndexOutOfRange {
                path: display_path(path),
                index,
                len,
            })?;
        *item = item.merged_with(&patch);
        Ok(root)
    }

    /// Append `value` to the list at `path`, creating the list if needed
    pub fn append_in_tree<S: AsRef<str>>(
        &self,
        tree: &SectionValue,
        path: &[S],
        value: impl Into<SectionValue>,
    ) -> Result<SectionValue> {
        ensure_not_empty(path)?;
        let mut root = tree.clone();
        let slot = self.slot_mut(&mut root, path)?;
        self.policy.coerce_list(slot, path)?.push(value.into());
        Ok(root)
    }

    /// Remove the list item at `index`; a missing list or index leaves the
    /// tree as it was
    pub fn remove_list_item_in_tree<S: AsRef<str>>(
        &self,
        tree: &SectionValue,
        path: &[S],
        index: usize,
    ) -> Result<SectionValue> {
        ensure_not_empty(path)?;
        let present = get_at_path(tree, path)
            .and_then(SectionValue::as_list)
            .is_some_and(|items| index < items.len());
        if !present {
            return Ok(tree.clone());
        }

        let mut root = tree.clone();
        let slot = self.slot_mut(&mut root, path)?;
        self.policy.coerce_list(slot, path)?.remove(index);
        Ok(root)
    }

    /// Walk to the node at `path`, copying every ancestor on the way and
    /// inserting `Null` for the final segment if it is absent
    fn slot_mut<'a, S: AsRef<str>>(
        &self,
        root: &'a mut SectionValue,
        path: &[S],
    ) -> Result<&'a mut SectionValue> {
        let mut node = root;
        for (depth, segment) in path.iter().enumerate() {
            let map = self.policy.coerce_map(node, &path[..depth])?;
            node = map
                .entry(segment.as_ref().to_string())
                .or_insert(SectionValue::Null);
        }
        Ok(node)
    }

    // ------------------------------------------------------------------
    // Page documents
    // ------------------------------------------------------------------

    /// Set `value` at a document path (`["styles", key]` or `["elements", ...]`)
    pub fn set_at_path<S: AsRef<str>>(
        &self,
        document: &PageDocument,
        path: &[S],
        value: impl Into<SectionValue>,
    ) -> Result<PageDocument> {
        let value = value.into();
        match route(path)? {
            (Root::Styles, []) => {
                let styles = styles_from_value(path, &value)?;
                Ok(document.with_styles(styles))
            }
            (Root::Styles, [key]) => {
                let mut styles = document.styles_arc().clone();
                let styles_mut = Arc::make_mut(&mut styles);
                if value.is_null() {
                    styles_mut.remove(key.as_ref());
                } else {
                    let text = value.scalar_text().ok_or_else(|| {
                        PathError::invalid(path, "style values must be scalars")
                    })?;
                    styles_mut.insert(key.as_ref().to_string(), text);
                }
                Ok(document.with_styles_arc(styles))
            }
            (Root::Styles, _) => Err(PathError::invalid(path, "styles is a flat mapping")),
            (Root::Elements, []) => match value {
                SectionValue::Map(elements) => Ok(document.with_elements_arc(elements)),
                _ => Err(PathError::invalid(path, "elements must be a mapping")),
            },
            (Root::Elements, rest) => {
                let tree = self
                    .set_in_tree(&document.elements_tree(), rest, value)
                    .map_err(|err| prefix_error(err, path))?;
                document.replace_elements(tree, path)
            }
        }
    }

    /// Shallow-merge `patch` into a list item at a document path
    pub fn update_list_item_at_path<S: AsRef<str>>(
        &self,
        document: &PageDocument,
        path: &[S],
        index: usize,
        patch: impl Into<SectionValue>,
    ) -> Result<PageDocument> {
        let rest = elements_list_path(path)?;
        let tree =
            self.update_list_item_in_tree(&document.elements_tree(), rest, index, patch)
                .map_err(|err| prefix_error(err, path))?;
        document.replace_elements(tree, path)
    }

    /// Append to the list at a document path
    pub fn append_list_item<S: AsRef<str>>(
        &self,
        document: &PageDocument,
        path: &[S],
        value: impl Into<SectionValue>,
    ) -> Result<PageDocument> {
        let rest = elements_list_path(path)?;
        let tree = self
            .append_in_tree(&document.elements_tree(), rest, value)
            .map_err(|err| prefix_error(err, path))?;
        document.replace_elements(tree, path)
    }

    /// Remove a list item at a document path (no-op when absent)
    pub fn remove_list_item_at_path<S: AsRef<str>>(
        &self,
        document: &PageDocument,
        path: &[S],
        index: usize,
    ) -> Result<PageDocument> {
        let rest = elements_list_path(path)?;
        let tree = self
            .remove_list_item_in_tree(&document.elements_tree(), rest, index)
            .map_err(|err| prefix_error(err, path))?;
        document.replace_elements(tree, path)
    }
}

/// Set a value using the permissive policy
pub fn set_at_path<S: AsRef<str>>(
    document: &PageDocument,
    path: &[S],
    value: impl Into<SectionValue>,
) -> Result<PageDocument> {
    PathMutator::default().set_at_path(document, path, value)
}

/// Merge into a list item using the permissive policy
pub fn update_list_item_at_path<S: AsRef<str>>(
    document: &PageDocument,
    path: &[S],
    index: usize,
    patch: impl Into<SectionValue>,
) -> Result<PageDocument> {
    PathMutator::default().update_list_item_at_path(document, path, index, patch)
}

/// Append to a list using the permissive policy
pub fn append_list_item<S: AsRef<str>>(
    document: &PageDocument,
    path: &[S],
    value: impl Into<SectionValue>,
) -> Result<PageDocument> {
    PathMutator::default().append_list_item(document, path, value)
}

/// Remove a list item using the permissive policy
pub fn remove_list_item_at_path<S: AsRef<str>>(
    document: &PageDocument,
    path: &[S],
    index: usize,
) -> Result<PageDocument> {
    PathMutator::default().remove_list_item_at_path(document, path, index)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Root {
    Styles,
    Elements,
}

fn ensure_not_empty<S: AsRef<str>>(path: &[S]) -> Result<()> {
    if path.is_empty() {
        return Err(PathError::invalid(path, "path is empty"));
    }
    Ok(())
}

fn route<S: AsRef<str>>(path: &[S]) -> Result<(Root, &[S])> {
    let (head, rest) = path
        .split_first()
        .ok_or_else(|| PathError::invalid(path, "path is empty"))?;
    match head.as_ref() {
        "styles" => Ok((Root::Styles, rest)),
        "elements" => Ok((Root::Elements, rest)),
        other => Err(PathError::invalid(
            path,
            format!("unknown top-level section '{other}' (expected 'styles' or 'elements')"),
        )),
    }
}

fn elements_list_path<S: AsRef<str>>(path: &[S]) -> Result<&[S]> {
    match route(path)? {
        (Root::Styles, _) => Err(PathError::invalid(path, "styles holds no lists")),
        (Root::Elements, []) => Err(PathError::invalid(path, "elements is a mapping, not a list")),
        (Root::Elements, rest) => Ok(rest),
    }
}

/// Errors from tree operations carry tree-relative paths; report them
/// relative to the document instead
fn prefix_error<S: AsRef<str>>(err: PathError, full: &[S]) -> PathError {
    let full_path = display_path(full);
    match err {
        PathError::InvalidPath { reason, .. } => PathError::InvalidPath {
            path: full_path,
            reason,
        },
        PathError::IndexOutOfRange { index, len, .. } => PathError::IndexOutOfRange {
            path: full_path,
            index,
            len,
        },
        PathError::ShapeMismatch {
            path,
            expected,
            found,
        } => PathError::ShapeMismatch {
            path: if path == "<root>" {
                "elements".to_string()
            } else {
                format!("elements.{path}")
            },
            expected,
            found,
        },
    }
}

fn styles_from_value<S: AsRef<str>>(
    path: &[S],
    value: &SectionValue,
) -> Result<BTreeMap<String, String>> {
    let fields = value
        .as_map()
        .ok_or_else(|| PathError::invalid(path, "styles must be a mapping"))?;
    fields
        .iter()
        .map(|(key, value)| {
            value
                .scalar_text()
                .map(|text| (key.clone(), text))
                .ok_or_else(|| PathError::invalid(path, format!("style '{key}' must be a scalar")))
        })
        .collect()
}
