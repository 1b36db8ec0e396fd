//! Row decoration: the toggle control and the pinned highlight.
//!
//! Everything here is derived from one input, "is this id pinned", and can be
//! re-applied any number of times with the same result.

use crate::error::HostError;
use crate::host::{self, HostDocument, NodeId};
use crate::identity::{PIN_ID_ATTR, RowContent};
use crate::store::PinnedItem;
use chrono::{DateTime, Utc};
use rowpin_config::{FieldSelectors, HighlightStyle, RowpinConfig};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Class marking the toggle control injected into each row.
pub const TOGGLE_CLASS: &str = "rowpin-toggle";

/// Class added to the toggle control while its row is pinned.
pub const PINNED_CLASS: &str = "pinned";

pub const PIN_TITLE: &str = "Pin this item";
pub const UNPIN_TITLE: &str = "Unpin this item";

/// Label used when a row has no subject text.
pub const DEFAULT_LABEL: &str = "No subject";

/// Sub-label used when a row has no sender text.
pub const DEFAULT_SUB_LABEL: &str = "Unknown sender";

const BACKGROUND: &str = "background-color";
const BORDER_LEFT: &str = "border-left";

/// What a completed toggle did to the pinned-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Pinned,
    /// Pinned after the oldest entry was evicted.
    PinnedWithEviction(PinnedItem),
    Unpinned,
    /// The set is full and the overflow policy refused the pin.
    RejectedAtCapacity,
    /// Ignored by the double-activation guard.
    Ignored,
}

/// Applies control and highlight state to rows.
#[derive(Debug, Clone)]
pub struct Reconciler {
    control_host_tags: Vec<String>,
    highlight: HighlightStyle,
}

impl Reconciler {
    pub fn new(control_host_tags: Vec<String>, highlight: HighlightStyle) -> Self {
        Self {
            control_host_tags,
            highlight,
        }
    }

    pub fn from_config(config: &RowpinConfig) -> Self {
        Self::new(config.control_host_tags.clone(), config.highlight.clone())
    }

    pub fn highlight(&self) -> &HighlightStyle {
        &self.highlight
    }

    /// Bring `row` in line with `pinned`: exactly one toggle control bound to `id`
    /// and the matching highlight. Returns the control.
    pub fn reconcile<D: HostDocument + ?Sized>(
        &self,
        doc: &mut D,
        row: NodeId,
        id: &str,
        pinned: bool,
    ) -> Result<NodeId, HostError> {
        let control = self.sync_control(doc, row, id, pinned)?;
        self.apply_highlight(doc, row, pinned)?;
        Ok(control)
    }

    /// The control half of [`reconcile`](Self::reconcile); row styles are untouched.
    pub fn sync_control<D: HostDocument + ?Sized>(
        &self,
        doc: &mut D,
        row: NodeId,
        id: &str,
        pinned: bool,
    ) -> Result<NodeId, HostError> {
        let control = self.ensure_control(doc, row)?;

        if doc.attribute(control, PIN_ID_ATTR) != Some(id) {
            doc.set_attribute(control, PIN_ID_ATTR, id)?;
        }
        host::set_class(doc, control, PINNED_CLASS, pinned)?;
        let pressed = if pinned { "true" } else { "false" };
        if doc.attribute(control, "aria-pressed") != Some(pressed) {
            doc.set_attribute(control, "aria-pressed", pressed)?;
        }
        let title = if pinned { UNPIN_TITLE } else { PIN_TITLE };
        if doc.attribute(control, "title") != Some(title) {
            doc.set_attribute(control, "title", title)?;
        }
        Ok(control)
    }

    /// Set or clear the pinned row styles.
    pub fn apply_highlight<D: HostDocument + ?Sized>(
        &self,
        doc: &mut D,
        row: NodeId,
        pinned: bool,
    ) -> Result<(), HostError> {
        let (background, border) = if pinned {
            (
                Some(self.highlight.pinned_background.as_str()),
                Some(self.highlight.pinned_border_left.as_str()),
            )
        } else {
            (None, None)
        };
        if doc.style(row, BACKGROUND) != background {
            doc.set_style(row, BACKGROUND, background)?;
        }
        if doc.style(row, BORDER_LEFT) != border {
            doc.set_style(row, BORDER_LEFT, border)?;
        }
        Ok(())
    }

    /// Transient background used when navigating to a row.
    pub fn apply_pulse<D: HostDocument + ?Sized>(&self, doc: &mut D, row: NodeId) -> Result<(), HostError> {
        doc.set_style(row, BACKGROUND, Some(self.highlight.pulse_background.as_str()))
    }

    fn ensure_control<D: HostDocument + ?Sized>(&self, doc: &mut D, row: NodeId) -> Result<NodeId, HostError> {
        let mut controls = toggle_controls(doc, row);
        if !controls.is_empty() {
            let keep = controls.remove(0);
            for extra in controls {
                log::debug!("Removing duplicate toggle control {:?} from {:?}", extra, row);
                doc.remove(extra)?;
            }
            return Ok(keep);
        }

        let target = self.control_host(doc, row).unwrap_or(row);
        let control = doc.create_element("div");
        doc.set_attribute(control, "class", TOGGLE_CLASS)?;
        doc.set_attribute(control, "role", "button")?;
        let first = doc.children(target).first().copied();
        doc.insert_before(target, control, first)?;
        crate::debug_trace!("RECONCILE", "Created toggle control {:?} in {:?}", control, target);
        Ok(control)
    }

    /// First descendant cell that is a first child and has a control host tag.
    fn control_host<D: HostDocument + ?Sized>(&self, doc: &D, row: NodeId) -> Option<NodeId> {
        self.control_host_tags.iter().find_map(|tag| {
            host::descendants(doc, row).into_iter().find(|&n| {
                doc.tag_name(n).eq_ignore_ascii_case(tag) && host::index_in_parent(doc, n) == Some(0)
            })
        })
    }
}

/// Toggle controls inside `row`, in document order.
pub fn toggle_controls<D: HostDocument + ?Sized>(doc: &D, row: NodeId) -> Vec<NodeId> {
    host::descendants(doc, row)
        .into_iter()
        .filter(|&n| host::has_class(doc, n, TOGGLE_CLASS))
        .collect()
}

/// The toggle control containing `node` (inclusive), if any.
pub fn enclosing_control<D: HostDocument + ?Sized>(doc: &D, node: NodeId) -> Option<NodeId> {
    let mut current = Some(node);
    while let Some(n) = current {
        if host::has_class(doc, n, TOGGLE_CLASS) {
            return Some(n);
        }
        current = doc.parent(n);
    }
    None
}

/// The row owning a toggle control: the nearest ancestor tagged with an id.
pub fn control_row<D: HostDocument + ?Sized>(doc: &D, control: NodeId) -> Option<NodeId> {
    let mut current = doc.parent(control);
    while let Some(n) = current {
        if doc.attribute(n, PIN_ID_ATTR).is_some() {
            return Some(n);
        }
        current = doc.parent(n);
    }
    None
}

/// Build the pinned entry for a row, snapshotting its label and sub-label now.
pub fn snapshot_item<D: HostDocument + ?Sized>(
    doc: &D,
    row: NodeId,
    id: &str,
    fields: &FieldSelectors,
    pinned_at: DateTime<Utc>,
) -> PinnedItem {
    let content = RowContent::read(doc, row, fields);
    let label = content
        .subject
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_LABEL.to_string());
    let sub_label = content
        .sender
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SUB_LABEL.to_string());
    PinnedItem::new(id, label, sub_label, pinned_at)
}

/// Ignores repeated activations of the same id within a short window.
///
/// Keyed by id rather than by control so a control re-created by the host in
/// between two clicks is still covered.
#[derive(Debug, Clone)]
pub struct ToggleGuard {
    window: Duration,
    accepted: HashMap<String, Instant>,
}

impl ToggleGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            accepted: HashMap::new(),
        }
    }

    /// `true` if the activation should go through; records it when it does.
    pub fn try_accept(&mut self, id: &str, now: Instant) -> bool {
        let window = self.window;
        self.accepted
            .retain(|_, at| now.saturating_duration_since(*at) < window);
        if self.accepted.contains_key(id) {
            return false;
        }
        self.accepted.insert(id.to_string(), now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryDocument;
    use chrono::TimeZone;

    fn reconciler() -> Reconciler {
        Reconciler::from_config(&RowpinConfig::default())
    }

    fn table_row(doc: &mut MemoryDocument) -> (NodeId, NodeId) {
        let list = doc.append(doc.root(), "tbody", &[], "");
        let row = doc.append(list, "tr", &[(PIN_ID_ATTR, "a")], "");
        let cell = doc.append(row, "td", &[], "");
        doc.append(cell, "span", &[], "check");
        doc.append(row, "td", &[("class", "bog")], "Subject");
        (row, cell)
    }

    #[test]
    fn test_control_created_in_first_cell() {
        let mut doc = MemoryDocument::new();
        let (row, cell) = table_row(&mut doc);

        let control = reconciler().reconcile(&mut doc, row, "a", false).unwrap();
        assert_eq!(doc.parent(control), Some(cell));
        assert_eq!(host::index_in_parent(&doc, control), Some(0));
        assert_eq!(doc.attribute(control, "role"), Some("button"));
        assert_eq!(doc.attribute(control, "title"), Some(PIN_TITLE));
        assert_eq!(doc.attribute(control, "aria-pressed"), Some("false"));
    }

    #[test]
    fn test_control_falls_back_to_row() {
        let mut doc = MemoryDocument::new();
        let list = doc.append(doc.root(), "ul", &[], "");
        let row = doc.append(list, "li", &[], "plain");

        let control = reconciler().reconcile(&mut doc, row, "x", true).unwrap();
        assert_eq!(doc.parent(control), Some(row));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut doc = MemoryDocument::new();
        let (row, _) = table_row(&mut doc);
        let r = reconciler();

        let first = r.reconcile(&mut doc, row, "a", true).unwrap();
        let snapshot = doc.clone_subtree(row).unwrap();
        let second = r.reconcile(&mut doc, row, "a", true).unwrap();

        assert_eq!(first, second);
        assert_eq!(toggle_controls(&doc, row).len(), 1);
        assert_eq!(doc.text_content(row), doc.text_content(snapshot));
        assert_eq!(doc.attribute(first, "class"), Some("rowpin-toggle pinned"));
        assert_eq!(doc.style(row, "background-color"), Some("#fce8e6"));
        assert_eq!(doc.style(row, "border-left"), Some("3px solid #ea4335"));
    }

    #[test]
    fn test_duplicate_controls_removed_and_rebound() {
        let mut doc = MemoryDocument::new();
        let (row, cell) = table_row(&mut doc);
        doc.append(cell, "div", &[("class", TOGGLE_CLASS), (PIN_ID_ATTR, "stale")], "");
        doc.append(cell, "div", &[("class", TOGGLE_CLASS), (PIN_ID_ATTR, "stale")], "");

        let control = reconciler().reconcile(&mut doc, row, "a", false).unwrap();
        assert_eq!(toggle_controls(&doc, row), vec![control]);
        assert_eq!(doc.attribute(control, PIN_ID_ATTR), Some("a"));
    }

    #[test]
    fn test_unpinned_clears_highlight() {
        let mut doc = MemoryDocument::new();
        let (row, _) = table_row(&mut doc);
        let r = reconciler();
        let control = r.reconcile(&mut doc, row, "a", true).unwrap();
        r.reconcile(&mut doc, row, "a", false).unwrap();

        assert_eq!(doc.style(row, "background-color"), None);
        assert_eq!(doc.style(row, "border-left"), None);
        assert!(!host::has_class(&doc, control, PINNED_CLASS));
        assert_eq!(doc.attribute(control, "title"), Some(PIN_TITLE));
    }

    #[test]
    fn test_control_lookup_helpers() {
        let mut doc = MemoryDocument::new();
        let (row, _) = table_row(&mut doc);
        let control = reconciler().reconcile(&mut doc, row, "a", false).unwrap();
        let icon = doc.append(control, "span", &[], "");

        assert_eq!(enclosing_control(&doc, icon), Some(control));
        assert_eq!(enclosing_control(&doc, row), None);
        assert_eq!(control_row(&doc, control), Some(row));
    }

    #[test]
    fn test_snapshot_defaults() {
        let mut doc = MemoryDocument::new();
        let row = doc.append(doc.root(), "tr", &[], "no fields here");
        let at = Utc.timestamp_millis_opt(42).unwrap();

        let item = snapshot_item(&doc, row, "id", &FieldSelectors::default(), at);
        assert_eq!(item.label, DEFAULT_LABEL);
        assert_eq!(item.sub_label, DEFAULT_SUB_LABEL);
        assert_eq!(item.pinned_at, at);
    }

    #[test]
    fn test_toggle_guard_window_per_id() {
        let mut guard = ToggleGuard::new(Duration::from_millis(500));
        let t0 = Instant::now();

        assert!(guard.try_accept("a", t0));
        assert!(!guard.try_accept("a", t0 + Duration::from_millis(100)));
        assert!(guard.try_accept("b", t0 + Duration::from_millis(100)));
        assert!(guard.try_accept("a", t0 + Duration::from_millis(600)));
    }
}
