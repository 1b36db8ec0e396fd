//! In-memory [`HostDocument`] implementation.
//!
//! Used by the test suites and by embedders that want to drive the engine
//! against a model of the host page (e.g. server-side rendering of the list).
//! Nodes are kept in an arena and never freed; removing a node only detaches it,
//! which mirrors how a stale handle behaves in a real page.

use super::{HostDocument, NodeId};
use crate::error::HostError;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct MemoryNode {
    tag: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    hidden: bool,
    styles: BTreeMap<String, String>,
}

/// Arena-backed element tree.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    nodes: Vec<MemoryNode>,
    root: NodeId,
    notices: Vec<String>,
    scrolled: Vec<NodeId>,
    moves: usize,
    location: Option<String>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// Create a document containing only a `body` root.
    pub fn new() -> Self {
        Self {
            nodes: vec![MemoryNode {
                tag: "body".to_string(),
                ..Default::default()
            }],
            root: NodeId(0),
            notices: Vec::new(),
            scrolled: Vec::new(),
            moves: 0,
            location: None,
        }
    }

    fn node(&self, id: NodeId) -> Option<&MemoryNode> {
        self.nodes.get(id.0)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut MemoryNode, HostError> {
        self.nodes.get_mut(id.0).ok_or(HostError::UnknownNode(id))
    }

    /// Create an element with attributes and own text and append it to `parent`.
    pub fn append(
        &mut self,
        parent: NodeId,
        tag: &str,
        attributes: &[(&str, &str)],
        text: &str,
    ) -> NodeId {
        let id = self.create_element(tag);
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.attributes = attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            node.text = text.to_string();
        }
        // Appending a fresh node to a known parent cannot fail
        let _ = self.attach(parent, id, None);
        id
    }

    /// Replace the node's own text (descendant text is untouched).
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let Ok(n) = self.node_mut(node) {
            n.text = text.to_string();
        }
    }

    /// Hide or show a node (like `display: none`).
    pub fn set_hidden(&mut self, node: NodeId, hidden: bool) {
        if let Ok(n) = self.node_mut(node) {
            n.hidden = hidden;
        }
    }

    /// Deep-copy a subtree into a new detached subtree, attributes included.
    pub fn clone_subtree(&mut self, node: NodeId) -> Option<NodeId> {
        let source = self.node(node)?.clone();
        let copy = NodeId(self.nodes.len());
        self.nodes.push(MemoryNode {
            children: Vec::new(),
            parent: None,
            ..source.clone()
        });
        for child in source.children {
            if let Some(child_copy) = self.clone_subtree(child) {
                let _ = self.attach(copy, child_copy, None);
            }
        }
        Some(copy)
    }

    /// Whether `node` is connected to the root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == self.root {
                return true;
            }
            current = self.node(n).and_then(|m| m.parent);
        }
        false
    }

    /// Values of `attribute` on the children of `parent`, in order. Children
    /// without the attribute yield an empty string.
    pub fn child_attributes(&self, parent: NodeId, attribute: &str) -> Vec<String> {
        self.children(parent)
            .into_iter()
            .map(|c| self.attribute(c, attribute).unwrap_or("").to_string())
            .collect()
    }

    /// Notices shown via [`HostDocument::show_notice`].
    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    pub fn set_location(&mut self, url: &str) {
        self.location = Some(url.to_string());
    }

    /// Nodes scrolled into view, oldest first.
    pub fn scrolled(&self) -> &[NodeId] {
        &self.scrolled
    }

    /// Number of `insert_before` calls that moved an already attached node.
    pub fn moves(&self) -> usize {
        self.moves
    }

    pub fn reset_moves(&mut self) {
        self.moves = 0;
    }

    fn attach(
        &mut self,
        parent: NodeId,
        node: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), HostError> {
        if self.node(parent).is_none() {
            return Err(HostError::UnknownNode(parent));
        }
        if self.node(node).is_none() {
            return Err(HostError::UnknownNode(node));
        }
        if node == self.root {
            return Err(HostError::InvalidOperation("cannot move the root".to_string()));
        }
        // Refuse to create a cycle
        let mut current = Some(parent);
        while let Some(n) = current {
            if n == node {
                return Err(HostError::InvalidOperation(
                    "cannot insert a node into its own subtree".to_string(),
                ));
            }
            current = self.node(n).and_then(|m| m.parent);
        }
        if let Some(r) = reference
            && self.node(r).and_then(|m| m.parent) != Some(parent)
        {
            return Err(HostError::InvalidOperation(format!(
                "reference {:?} is not a child of {:?}",
                r, parent
            )));
        }
        if reference == Some(node) {
            return Ok(());
        }

        if let Some(old_parent) = self.node(node).and_then(|m| m.parent) {
            self.moves += 1;
            if let Ok(p) = self.node_mut(old_parent) {
                p.children.retain(|&c| c != node);
            }
        }

        let parent_node = self.node_mut(parent)?;
        let index = reference
            .and_then(|r| parent_node.children.iter().position(|&c| c == r))
            .unwrap_or(parent_node.children.len());
        parent_node.children.insert(index, node);
        self.node_mut(node)?.parent = Some(parent);
        Ok(())
    }
}

impl HostDocument for MemoryDocument {
    fn root(&self) -> NodeId {
        self.root
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node).map(|n| n.children.clone()).unwrap_or_default()
    }

    fn tag_name(&self, node: NodeId) -> &str {
        self.node(node).map(|n| n.tag.as_str()).unwrap_or("")
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.node(node)?
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), HostError> {
        let n = self.node_mut(node)?;
        match n.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => n.attributes.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), HostError> {
        self.node_mut(node)?.attributes.retain(|(k, _)| k != name);
        Ok(())
    }

    fn text_content(&self, node: NodeId) -> String {
        let Some(n) = self.node(node) else {
            return String::new();
        };
        let mut text = n.text.clone();
        for &child in &n.children {
            text.push_str(&self.text_content(child));
        }
        text
    }

    fn is_rendered(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            let Some(m) = self.node(n) else {
                return false;
            };
            if m.hidden {
                return false;
            }
            if n == self.root {
                return true;
            }
            current = m.parent;
        }
        false
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(MemoryNode {
            tag: tag.to_ascii_lowercase(),
            ..Default::default()
        });
        id
    }

    fn insert_before(
        &mut self,
        parent: NodeId,
        node: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), HostError> {
        self.attach(parent, node, reference)
    }

    fn remove(&mut self, node: NodeId) -> Result<(), HostError> {
        let parent = self
            .node(node)
            .ok_or(HostError::UnknownNode(node))?
            .parent
            .ok_or(HostError::Detached(node))?;
        self.node_mut(parent)?.children.retain(|&c| c != node);
        self.node_mut(node)?.parent = None;
        Ok(())
    }

    fn style(&self, node: NodeId, property: &str) -> Option<&str> {
        self.node(node)?.styles.get(property).map(String::as_str)
    }

    fn set_style(
        &mut self,
        node: NodeId,
        property: &str,
        value: Option<&str>,
    ) -> Result<(), HostError> {
        let n = self.node_mut(node)?;
        match value {
            Some(v) if !v.is_empty() => {
                n.styles.insert(property.to_string(), v.to_string());
            }
            _ => {
                n.styles.remove(property);
            }
        }
        Ok(())
    }

    fn scroll_into_view(&mut self, node: NodeId) -> Result<(), HostError> {
        if !self.is_connected(node) {
            return Err(HostError::Detached(node));
        }
        self.scrolled.push(node);
        Ok(())
    }

    fn show_notice(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }

    fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_before_moves_and_counts() {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        let list = doc.append(root, "tbody", &[], "");
        let a = doc.append(list, "tr", &[("id", "a")], "");
        let b = doc.append(list, "tr", &[("id", "b")], "");
        let c = doc.append(list, "tr", &[("id", "c")], "");
        doc.reset_moves();

        doc.insert_before(list, c, Some(a)).unwrap();
        assert_eq!(doc.children(list), vec![c, a, b]);
        assert_eq!(doc.moves(), 1);

        doc.insert_before(list, a, None).unwrap();
        assert_eq!(doc.children(list), vec![c, b, a]);
        assert_eq!(doc.moves(), 2);
    }

    #[test]
    fn test_insert_rejects_cycles_and_foreign_reference() {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        let outer = doc.append(root, "div", &[], "");
        let inner = doc.append(outer, "div", &[], "");
        let other = doc.append(root, "div", &[], "");

        assert!(matches!(
            doc.insert_before(inner, outer, None),
            Err(HostError::InvalidOperation(_))
        ));
        assert!(matches!(
            doc.insert_before(outer, other, Some(root)),
            Err(HostError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_rendered_requires_connection_and_visibility() {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        let list = doc.append(root, "div", &[], "");
        let row = doc.append(list, "div", &[], "hello");

        assert!(doc.is_rendered(row));
        doc.set_hidden(list, true);
        assert!(!doc.is_rendered(row));
        doc.set_hidden(list, false);
        doc.remove(list).unwrap();
        assert!(!doc.is_rendered(row));
        assert!(!doc.is_connected(row));
        assert_eq!(doc.remove(list), Err(HostError::Detached(list)));
    }

    #[test]
    fn test_text_content_concatenates_descendants() {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        let row = doc.append(root, "tr", &[], "");
        let cell = doc.append(row, "td", &[], "Alice ");
        doc.append(cell, "span", &[], "Invoice");

        assert_eq!(doc.text_content(row), "Alice Invoice");
    }

    #[test]
    fn test_clone_subtree_copies_attributes() {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        let row = doc.append(root, "tr", &[("data-pin-id", "x")], "");
        doc.append(row, "td", &[("class", "yW")], "Bob");

        let copy = doc.clone_subtree(row).unwrap();
        assert!(!doc.is_connected(copy));
        assert_eq!(doc.attribute(copy, "data-pin-id"), Some("x"));
        assert_eq!(doc.text_content(copy), "Bob");
    }
}
