//! Host page abstraction.
//!
//! The pin engine never owns the list it decorates. Everything it knows about the
//! host page goes through [`HostDocument`], a deliberately small element-tree API
//! that a browser binding, a webview bridge or the in-memory [`MemoryDocument`]
//! can implement.
//!
//! Node ids are handles issued by the host. A handle that the host has since
//! discarded must produce [`HostError`] on mutation and `false`/`None` on query,
//! never a panic.

pub mod memory;

pub use memory::MemoryDocument;

use crate::error::HostError;
use rowpin_config::{ElementSelector, SelectorTarget};

/// Opaque handle to an element owned by the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Minimal element-tree API the engine needs from the host page.
pub trait HostDocument {
    /// Root element that all scans start from.
    fn root(&self) -> NodeId;

    /// Parent element, `None` for the root or a detached node.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Element children in document order.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Lower-case tag name (empty for unknown nodes).
    fn tag_name(&self, node: NodeId) -> &str;

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), HostError>;

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), HostError>;

    /// Concatenated text of the node and all its descendants.
    fn text_content(&self, node: NodeId) -> String;

    /// Whether the node currently takes part in layout (attached and not hidden).
    fn is_rendered(&self, node: NodeId) -> bool;

    /// Create a detached element.
    fn create_element(&mut self, tag: &str) -> NodeId;

    /// Insert (or move) `node` into `parent` before `reference`, or at the end when
    /// `reference` is `None`.
    fn insert_before(
        &mut self,
        parent: NodeId,
        node: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), HostError>;

    /// Detach `node` from its parent.
    fn remove(&mut self, node: NodeId) -> Result<(), HostError>;

    /// Inline style property value.
    fn style(&self, node: NodeId, property: &str) -> Option<&str>;

    /// Set (`Some`) or clear (`None`) an inline style property.
    fn set_style(
        &mut self,
        node: NodeId,
        property: &str,
        value: Option<&str>,
    ) -> Result<(), HostError>;

    fn scroll_into_view(&mut self, node: NodeId) -> Result<(), HostError>;

    /// Show a short user-visible notice (capacity warning).
    fn show_notice(&mut self, message: &str);

    /// Current page location, for hosts that expose one.
    fn location(&self) -> Option<&str> {
        None
    }
}

/// Borrowed view of one element, usable with [`ElementSelector::matches`].
pub struct ElementRef<'a, D: ?Sized> {
    doc: &'a D,
    node: NodeId,
}

impl<'a, D: HostDocument + ?Sized> ElementRef<'a, D> {
    pub fn new(doc: &'a D, node: NodeId) -> Self {
        Self { doc, node }
    }
}

impl<D: HostDocument + ?Sized> SelectorTarget for ElementRef<'_, D> {
    fn tag_name(&self) -> &str {
        self.doc.tag_name(self.node)
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.doc.attribute(self.node, name)
    }
}

/// Whether `node` matches `selector`.
pub fn matches<D: HostDocument + ?Sized>(doc: &D, node: NodeId, selector: &ElementSelector) -> bool {
    selector.matches(&ElementRef::new(doc, node))
}

/// All descendants of `scope` in document (pre-)order, excluding `scope` itself.
pub fn descendants<D: HostDocument + ?Sized>(doc: &D, scope: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = doc.children(scope).into_iter().rev().collect();
    while let Some(node) = stack.pop() {
        out.push(node);
        stack.extend(doc.children(node).into_iter().rev());
    }
    out
}

/// First descendant of `scope` matching `selector`.
pub fn query_first<D: HostDocument + ?Sized>(
    doc: &D,
    scope: NodeId,
    selector: &ElementSelector,
) -> Option<NodeId> {
    descendants(doc, scope)
        .into_iter()
        .find(|&n| matches(doc, n, selector))
}

/// Every descendant of `scope` matching `selector`.
pub fn query_all<D: HostDocument + ?Sized>(
    doc: &D,
    scope: NodeId,
    selector: &ElementSelector,
) -> Vec<NodeId> {
    descendants(doc, scope)
        .into_iter()
        .filter(|&n| matches(doc, n, selector))
        .collect()
}

/// Trimmed text of the first element matched by the first selector that matches
/// anything. `None` when no alternative matches.
pub fn field_text<D: HostDocument + ?Sized>(
    doc: &D,
    scope: NodeId,
    alternatives: &[ElementSelector],
) -> Option<String> {
    alternatives
        .iter()
        .find_map(|sel| query_first(doc, scope, sel))
        .map(|node| doc.text_content(node).trim().to_string())
}

/// Position of `node` among its parent's children.
pub fn index_in_parent<D: HostDocument + ?Sized>(doc: &D, node: NodeId) -> Option<usize> {
    let parent = doc.parent(node)?;
    doc.children(parent).iter().position(|&c| c == node)
}

/// Whether `ancestor` is `node` or one of its ancestors.
pub fn is_inclusive_ancestor<D: HostDocument + ?Sized>(
    doc: &D,
    ancestor: NodeId,
    node: NodeId,
) -> bool {
    let mut current = Some(node);
    while let Some(n) = current {
        if n == ancestor {
            return true;
        }
        current = doc.parent(n);
    }
    false
}

pub fn has_class<D: HostDocument + ?Sized>(doc: &D, node: NodeId, class: &str) -> bool {
    doc.attribute(node, "class")
        .is_some_and(|c| c.split_whitespace().any(|t| t == class))
}

/// Add or remove one class token, leaving the others untouched.
pub fn set_class<D: HostDocument + ?Sized>(
    doc: &mut D,
    node: NodeId,
    class: &str,
    present: bool,
) -> Result<(), HostError> {
    let current = doc.attribute(node, "class").unwrap_or("").to_string();
    let mut tokens: Vec<&str> = current.split_whitespace().filter(|t| *t != class).collect();
    if present {
        tokens.push(class);
    }
    let updated = tokens.join(" ");
    if updated == current {
        return Ok(());
    }
    doc.set_attribute(node, "class", &updated)
}
