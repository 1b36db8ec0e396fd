//! Default value functions for configuration.
//!
//! Each function is used as a `#[serde(default = "crate::defaults::...")]`
//! attribute and by the matching `Default` impl, so a partially written YAML file
//! and `RowpinConfig::default()` agree.

use crate::selector::{ElementSelector, builtin};
use crate::types::RowMatcher;

// ── Row discovery ──────────────────────────────────────────────────────────

pub fn row_matchers() -> Vec<RowMatcher> {
    vec![
        RowMatcher::StructuralRole {
            selector: builtin("tr.zA"),
        },
        RowMatcher::StructuralRole {
            selector: builtin("tr[class*=\"zA\"]"),
        },
        RowMatcher::NativeAttribute {
            selector: builtin("tr"),
            attribute: "data-legacy-thread-id".to_string(),
        },
        RowMatcher::SizeHeuristic {
            tag: "tr".to_string(),
            min_children: heuristic_min_children(),
            min_text_len: heuristic_min_text_len(),
            min_siblings: heuristic_min_siblings(),
        },
    ]
}

pub fn readiness_selectors() -> Vec<ElementSelector> {
    vec![builtin("div[gh=\"tl\"]"), builtin("div[role=\"main\"]")]
}

pub fn heuristic_min_children() -> usize {
    3
}

pub fn heuristic_min_text_len() -> usize {
    8
}

pub fn heuristic_min_siblings() -> usize {
    3
}

// ── Identity ───────────────────────────────────────────────────────────────

pub fn native_id_attributes() -> Vec<String> {
    vec![
        "data-message-id".to_string(),
        "data-legacy-message-id".to_string(),
        "data-thread-id".to_string(),
    ]
}

pub fn subject_selectors() -> Vec<ElementSelector> {
    vec![builtin(".bog"), builtin("[data-tooltip]")]
}

pub fn sender_selectors() -> Vec<ElementSelector> {
    vec![builtin(".yW"), builtin(".zF")]
}

pub fn timestamp_selectors() -> Vec<ElementSelector> {
    vec![builtin(".bqe"), builtin("[title*=\":\"]")]
}

pub fn control_host_tags() -> Vec<String> {
    vec!["td".to_string(), "div".to_string()]
}

// ── Highlight colors ───────────────────────────────────────────────────────

pub fn pinned_background() -> String {
    "#fce8e6".to_string()
}

pub fn pinned_border_left() -> String {
    "3px solid #ea4335".to_string()
}

pub fn pulse_background() -> String {
    "#fff3cd".to_string()
}

// ── Storage ────────────────────────────────────────────────────────────────

pub fn storage_key() -> String {
    "pinnedItems".to_string()
}

// ── Timings (milliseconds) ─────────────────────────────────────────────────

pub fn mutation_debounce_ms() -> u64 {
    300
}

pub fn reorder_debounce_ms() -> u64 {
    300
}

pub fn tick_interval_ms() -> u64 {
    2000
}

pub fn visibility_delay_ms() -> u64 {
    500
}

pub fn navigation_delay_ms() -> u64 {
    1000
}

pub fn initial_pass_delay_ms() -> u64 {
    1500
}

pub fn readiness_poll_ms() -> u64 {
    500
}

pub fn toggle_guard_ms() -> u64 {
    500
}

pub fn navigate_pulse_ms() -> u64 {
    2000
}
