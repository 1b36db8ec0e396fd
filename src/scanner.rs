//! Row discovery.
//!
//! The scanner holds no state between calls: every `scan` walks the host tree
//! again, because the host may have replaced any row since the last pass.

use crate::host::{self, HostDocument, NodeId};
use crate::identity::PIN_ID_ATTR;
use crate::reconciler::TOGGLE_CLASS;
use rowpin_config::{ElementSelector, RowMatcher, RowpinConfig};

#[derive(Debug, Clone)]
pub struct RowScanner {
    matchers: Vec<RowMatcher>,
    readiness: Vec<ElementSelector>,
}

impl RowScanner {
    pub fn new(matchers: Vec<RowMatcher>, readiness: Vec<ElementSelector>) -> Self {
        Self { matchers, readiness }
    }

    pub fn from_config(config: &RowpinConfig) -> Self {
        Self::new(config.row_matchers.clone(), config.readiness_selectors.clone())
    }

    /// Rendered rows of the first strategy that finds any, in document order.
    pub fn scan<D: HostDocument + ?Sized>(&self, doc: &D) -> Vec<NodeId> {
        for matcher in &self.matchers {
            let rows: Vec<NodeId> = self
                .candidates(doc, matcher)
                .into_iter()
                .filter(|&n| doc.is_rendered(n))
                .collect();
            if !rows.is_empty() {
                crate::debug_trace!("SCAN", "{} rows via {}", rows.len(), matcher.label());
                return rows;
            }
        }
        Vec::new()
    }

    /// Elements matching one strategy, rendered or not.
    pub fn candidates<D: HostDocument + ?Sized>(&self, doc: &D, matcher: &RowMatcher) -> Vec<NodeId> {
        host::descendants(doc, doc.root())
            .into_iter()
            .filter(|&n| !host::has_class(doc, n, TOGGLE_CLASS))
            .filter(|&n| matches_strategy(doc, n, matcher))
            .collect()
    }

    /// The live row currently tagged with `id`, if any.
    pub fn find_tagged<D: HostDocument + ?Sized>(&self, doc: &D, id: &str) -> Option<NodeId> {
        self.scan(doc)
            .into_iter()
            .find(|&row| doc.attribute(row, PIN_ID_ATTR) == Some(id))
    }

    /// Whether the host list has been rendered far enough to start working.
    pub fn is_host_ready<D: HostDocument + ?Sized>(&self, doc: &D) -> bool {
        let root = doc.root();
        self.readiness
            .iter()
            .any(|sel| host::query_first(doc, root, sel).is_some())
    }
}

fn matches_strategy<D: HostDocument + ?Sized>(doc: &D, node: NodeId, matcher: &RowMatcher) -> bool {
    match matcher {
        RowMatcher::NativeAttribute {
            selector,
            attribute,
        } => host::matches(doc, node, selector) && doc.attribute(node, attribute).is_some(),
        RowMatcher::StructuralRole { selector } => host::matches(doc, node, selector),
        RowMatcher::SizeHeuristic {
            tag,
            min_children,
            min_text_len,
            min_siblings,
        } => {
            if !doc.tag_name(node).eq_ignore_ascii_case(tag) {
                return false;
            }
            if doc.children(node).len() < *min_children {
                return false;
            }
            if doc.text_content(node).trim().chars().count() < *min_text_len {
                return false;
            }
            let Some(parent) = doc.parent(node) else {
                return false;
            };
            let siblings = doc
                .children(parent)
                .into_iter()
                .filter(|&s| s != node && doc.tag_name(s).eq_ignore_ascii_case(tag))
                .count();
            siblings >= *min_siblings
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryDocument;

    fn structural(sel: &str) -> RowMatcher {
        RowMatcher::StructuralRole {
            selector: ElementSelector::parse(sel).unwrap(),
        }
    }

    #[test]
    fn test_first_productive_strategy_wins() {
        let mut doc = MemoryDocument::new();
        let list = doc.append(doc.root(), "tbody", &[], "");
        let a = doc.append(list, "tr", &[("class", "zA x")], "");
        let b = doc.append(list, "tr", &[("class", "zAb")], "");

        let scanner = RowScanner::new(
            vec![structural("tr.missing"), structural("tr[class*=\"zA\"]"), structural("tr")],
            vec![],
        );
        assert_eq!(scanner.scan(&doc), vec![a, b]);
    }

    #[test]
    fn test_invisible_rows_filtered_and_fallback_when_none_rendered() {
        let mut doc = MemoryDocument::new();
        let hidden_list = doc.append(doc.root(), "tbody", &[("class", "old")], "");
        let stale = doc.append(hidden_list, "tr", &[("class", "zA")], "");
        doc.set_hidden(hidden_list, true);
        let list = doc.append(doc.root(), "div", &[], "");
        let live = doc.append(list, "div", &[("role", "row")], "");

        let scanner = RowScanner::new(vec![structural("tr.zA"), structural("[role=\"row\"]")], vec![]);
        let rows = scanner.scan(&doc);
        assert_eq!(rows, vec![live]);
        assert!(!rows.contains(&stale));
    }

    #[test]
    fn test_toggle_controls_are_never_rows() {
        let mut doc = MemoryDocument::new();
        let list = doc.append(doc.root(), "div", &[], "");
        let row = doc.append(list, "div", &[("role", "row")], "");
        doc.append(row, "div", &[("class", TOGGLE_CLASS), ("role", "row")], "");

        let scanner = RowScanner::new(vec![structural("[role=\"row\"]")], vec![]);
        assert_eq!(scanner.scan(&doc), vec![row]);
    }

    #[test]
    fn test_native_attribute_strategy_requires_attribute() {
        let mut doc = MemoryDocument::new();
        let list = doc.append(doc.root(), "tbody", &[], "");
        let with = doc.append(list, "tr", &[("data-legacy-thread-id", "1")], "");
        doc.append(list, "tr", &[], "");

        let scanner = RowScanner::new(
            vec![RowMatcher::NativeAttribute {
                selector: ElementSelector::parse("tr").unwrap(),
                attribute: "data-legacy-thread-id".to_string(),
            }],
            vec![],
        );
        assert_eq!(scanner.scan(&doc), vec![with]);
    }

    #[test]
    fn test_size_heuristic() {
        let mut doc = MemoryDocument::new();
        let list = doc.append(doc.root(), "tbody", &[], "");
        let mut rows = Vec::new();
        for i in 0..4 {
            let row = doc.append(list, "tr", &[], "");
            for c in 0..3 {
                doc.append(row, "td", &[], &format!("cell {i}-{c}"));
            }
            rows.push(row);
        }
        // Too few cells
        let thin = doc.append(list, "tr", &[], "");
        doc.append(thin, "td", &[], "a long enough text");

        let scanner = RowScanner::new(
            vec![RowMatcher::SizeHeuristic {
                tag: "tr".to_string(),
                min_children: 3,
                min_text_len: 8,
                min_siblings: 3,
            }],
            vec![],
        );
        assert_eq!(scanner.scan(&doc), rows);
    }

    #[test]
    fn test_find_tagged_and_readiness() {
        let mut doc = MemoryDocument::new();
        let scanner = RowScanner::from_config(&RowpinConfig::default());
        assert!(!scanner.is_host_ready(&doc));

        let main = doc.append(doc.root(), "div", &[("gh", "tl")], "");
        let list = doc.append(main, "tbody", &[], "");
        doc.append(list, "tr", &[("class", "zA"), (PIN_ID_ATTR, "a")], "");
        let b = doc.append(list, "tr", &[("class", "zA"), (PIN_ID_ATTR, "b")], "");

        assert!(scanner.is_host_ready(&doc));
        assert_eq!(scanner.find_tagged(&doc, "b"), Some(b));
        assert_eq!(scanner.find_tagged(&doc, "zzz"), None);
    }

    #[test]
    fn test_empty_document_scans_empty() {
        let doc = MemoryDocument::new();
        let scanner = RowScanner::from_config(&RowpinConfig::default());
        assert!(scanner.scan(&doc).is_empty());
    }
}
