//! JSON message types exchanged between the popup and content surfaces.
//!
//! Every message is a single JSON object tagged with an `action` field. Requests
//! from the popup are answered with an [`Ack`]; notifications to the popup are
//! fire-and-forget and never answered.
//!
//! The legacy action names of the original mail extension (`emailUnpinned`,
//! `updateRequested`, `navigateToEmail`, `updatePopup`) are accepted on input.

use serde::{Deserialize, Serialize};

/// A request sent from the popup to the content surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum CoreRequest {
    /// The popup already removed `id` from storage; drop it locally and refresh the
    /// affected row without a full rescan.
    #[serde(alias = "emailUnpinned")]
    ItemUnpinned {
        #[serde(alias = "emailId")]
        id: String,
    },

    /// Run a scan/reconcile/reorder pass right away.
    #[serde(alias = "updateRequested")]
    RefreshRequested,

    /// Scroll the row for `id` into view and pulse its highlight.
    #[serde(alias = "navigateToEmail")]
    NavigateToItem {
        #[serde(alias = "emailId")]
        id: String,
    },
}

impl CoreRequest {
    /// Parse one request from its JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serialize to JSON text.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A notification sent from the content surface to the popup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum PopupMessage {
    /// The pinned-set changed; re-read storage and re-render.
    #[serde(alias = "updatePopup")]
    PopupShouldRefresh,
}

impl PopupMessage {
    /// Serialize to JSON text.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Acknowledgement returned for every [`CoreRequest`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ack {
    pub status: String,
}

impl Ack {
    pub fn done() -> Self {
        Self {
            status: "done".to_string(),
        }
    }
}
