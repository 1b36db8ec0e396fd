//! Configuration value types shared by the rowpin crates.

use crate::selector::ElementSelector;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Strategy for recognising "this element is a row of the target list".
///
/// Strategies are tried in order by the row scanner; the first one that yields at
/// least one rendered match wins. Supporting a new host layout means adding a
/// strategy here, not branching in the scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RowMatcher {
    /// Element matching `selector` that also carries the host's native id attribute.
    NativeAttribute {
        selector: ElementSelector,
        attribute: String,
    },
    /// Element matching a structural selector such as `tr.zA`.
    StructuralRole { selector: ElementSelector },
    /// Element shaped like a list item: enough children, enough text and enough
    /// same-tag siblings.
    SizeHeuristic {
        tag: String,
        #[serde(default = "crate::defaults::heuristic_min_children")]
        min_children: usize,
        #[serde(default = "crate::defaults::heuristic_min_text_len")]
        min_text_len: usize,
        #[serde(default = "crate::defaults::heuristic_min_siblings")]
        min_siblings: usize,
    },
}

impl RowMatcher {
    /// Short label used in log output.
    pub fn label(&self) -> String {
        match self {
            RowMatcher::NativeAttribute {
                selector,
                attribute,
            } => format!("native:{}[{}]", selector, attribute),
            RowMatcher::StructuralRole { selector } => format!("structural:{}", selector),
            RowMatcher::SizeHeuristic { tag, .. } => format!("heuristic:{}", tag),
        }
    }
}

/// Ordered selector alternatives for the salient text fields of a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSelectors {
    /// Subject-like text (becomes the pinned item's label).
    #[serde(default = "crate::defaults::subject_selectors")]
    pub subject: Vec<ElementSelector>,
    /// Sender-like text (becomes the pinned item's sub-label).
    #[serde(default = "crate::defaults::sender_selectors")]
    pub sender: Vec<ElementSelector>,
    /// Timestamp-like text (only used for fingerprints).
    #[serde(default = "crate::defaults::timestamp_selectors")]
    pub timestamp: Vec<ElementSelector>,
}

impl Default for FieldSelectors {
    fn default() -> Self {
        Self {
            subject: crate::defaults::subject_selectors(),
            sender: crate::defaults::sender_selectors(),
            timestamp: crate::defaults::timestamp_selectors(),
        }
    }
}

/// What happens when the user pins an item while the pinned-set is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Refuse the pin and show a capacity notice. The user must unpin something first.
    #[default]
    Reject,
    /// Silently drop the oldest pin to make room.
    EvictOldest,
}

/// Inline styles applied to a pinned row and to the navigation pulse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightStyle {
    /// Background color of a pinned row
    #[serde(default = "crate::defaults::pinned_background")]
    pub pinned_background: String,
    /// Left border of a pinned row
    #[serde(default = "crate::defaults::pinned_border_left")]
    pub pinned_border_left: String,
    /// Background color of the transient pulse after navigating to a row
    #[serde(default = "crate::defaults::pulse_background")]
    pub pulse_background: String,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            pinned_background: crate::defaults::pinned_background(),
            pinned_border_left: crate::defaults::pinned_border_left(),
            pulse_background: crate::defaults::pulse_background(),
        }
    }
}

/// Delays and intervals driving the change watcher, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    /// Quiet period after the last host mutation before a pass runs
    #[serde(default = "crate::defaults::mutation_debounce_ms")]
    pub mutation_debounce_ms: u64,
    /// Quiet period before a scheduled reorder runs
    #[serde(default = "crate::defaults::reorder_debounce_ms")]
    pub reorder_debounce_ms: u64,
    /// Fallback timer interval
    #[serde(default = "crate::defaults::tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Delay after the page becomes visible again
    #[serde(default = "crate::defaults::visibility_delay_ms")]
    pub visibility_delay_ms: u64,
    /// Delay after an in-app navigation (URL change)
    #[serde(default = "crate::defaults::navigation_delay_ms")]
    pub navigation_delay_ms: u64,
    /// Delay between host readiness and the first pass
    #[serde(default = "crate::defaults::initial_pass_delay_ms")]
    pub initial_pass_delay_ms: u64,
    /// Interval between readiness checks while waiting for the host
    #[serde(default = "crate::defaults::readiness_poll_ms")]
    pub readiness_poll_ms: u64,
    /// Window during which repeated activations of the same toggle are ignored
    #[serde(default = "crate::defaults::toggle_guard_ms")]
    pub toggle_guard_ms: u64,
    /// How long the navigation pulse stays on a row
    #[serde(default = "crate::defaults::navigate_pulse_ms")]
    pub navigate_pulse_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            mutation_debounce_ms: crate::defaults::mutation_debounce_ms(),
            reorder_debounce_ms: crate::defaults::reorder_debounce_ms(),
            tick_interval_ms: crate::defaults::tick_interval_ms(),
            visibility_delay_ms: crate::defaults::visibility_delay_ms(),
            navigation_delay_ms: crate::defaults::navigation_delay_ms(),
            initial_pass_delay_ms: crate::defaults::initial_pass_delay_ms(),
            readiness_poll_ms: crate::defaults::readiness_poll_ms(),
            toggle_guard_ms: crate::defaults::toggle_guard_ms(),
            navigate_pulse_ms: crate::defaults::navigate_pulse_ms(),
        }
    }
}

impl Timings {
    pub fn mutation_debounce(&self) -> Duration {
        Duration::from_millis(self.mutation_debounce_ms)
    }

    pub fn reorder_debounce(&self) -> Duration {
        Duration::from_millis(self.reorder_debounce_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn visibility_delay(&self) -> Duration {
        Duration::from_millis(self.visibility_delay_ms)
    }

    pub fn navigation_delay(&self) -> Duration {
        Duration::from_millis(self.navigation_delay_ms)
    }

    pub fn initial_pass_delay(&self) -> Duration {
        Duration::from_millis(self.initial_pass_delay_ms)
    }

    pub fn readiness_poll(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_ms)
    }

    pub fn toggle_guard(&self) -> Duration {
        Duration::from_millis(self.toggle_guard_ms)
    }

    pub fn navigate_pulse(&self) -> Duration {
        Duration::from_millis(self.navigate_pulse_ms)
    }
}
