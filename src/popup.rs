//! Popup surface model: the list the user sees when opening the popup.
//!
//! The popup reads the shared store directly and talks to the content surface
//! only through fire-and-forget [`CoreRequest`]s.

use crate::messaging::CoreLink;
use crate::store::{KeyValueStore, PinnedItem, decode_items};
use chrono::Local;
use rowpin_protocol::{CoreRequest, PopupMessage};
use std::sync::Arc;

/// Text shown when nothing is pinned.
pub const EMPTY_STATE: &str = "No items pinned yet";

/// One rendered popup row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupEntry {
    pub id: String,
    pub label: String,
    pub sub_label: String,
    /// Local `HH:MM` pin time.
    pub pinned_time: String,
}

impl From<&PinnedItem> for PopupEntry {
    fn from(item: &PinnedItem) -> Self {
        Self {
            id: item.id.clone(),
            label: item.label.clone(),
            sub_label: item.sub_label.clone(),
            pinned_time: item
                .pinned_at
                .with_timezone(&Local)
                .format("%H:%M")
                .to_string(),
        }
    }
}

pub struct PopupModel {
    backend: Arc<dyn KeyValueStore>,
    key: String,
    items: Vec<PinnedItem>,
    core: Box<dyn CoreLink>,
}

impl std::fmt::Debug for PopupModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopupModel")
            .field("key", &self.key)
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}

impl PopupModel {
    /// Create the model and read the current list.
    pub fn open(backend: Arc<dyn KeyValueStore>, key: impl Into<String>, core: Box<dyn CoreLink>) -> Self {
        let mut model = Self {
            backend,
            key: key.into(),
            items: Vec::new(),
            core,
        };
        model.reload();
        model
    }

    /// Re-read the list from storage. Unreadable data shows as empty.
    pub fn reload(&mut self) {
        self.items = self.read_items();
    }

    fn read_items(&self) -> Vec<PinnedItem> {
        match self.backend.get(&self.key) {
            Ok(Some(value)) => decode_items(value).unwrap_or_else(|e| {
                log::warn!("Popup ignoring malformed pinned list: {}", e);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                log::warn!("Popup could not read pinned list: {}", e);
                Vec::new()
            }
        }
    }

    /// Entries in pinned-set order (most recently pinned first).
    pub fn entries(&self) -> Vec<PopupEntry> {
        self.items.iter().map(PopupEntry::from).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The empty-state text, when there is nothing to list.
    pub fn empty_state(&self) -> Option<&'static str> {
        self.is_empty().then_some(EMPTY_STATE)
    }

    /// Remove `id` from storage and tell the content surface.
    pub fn unpin(&mut self, id: &str) {
        let mut items = self.read_items();
        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() != before {
            match serde_json::to_value(&items) {
                Ok(value) => {
                    if let Err(e) = self.backend.set(&self.key, value) {
                        log::warn!("Popup failed to save pinned list: {}", e);
                    }
                }
                Err(e) => log::error!("Failed to serialize pinned list: {}", e),
            }
        }
        self.items = items;
        self.send(CoreRequest::ItemUnpinned { id: id.to_string() });
    }

    /// Ask the content surface for a full pass and re-read storage.
    pub fn refresh(&mut self) {
        self.send(CoreRequest::RefreshRequested);
        self.reload();
    }

    /// Ask the content surface to scroll to `id`.
    pub fn navigate(&self, id: &str) {
        self.send(CoreRequest::NavigateToItem { id: id.to_string() });
    }

    pub fn handle(&mut self, message: PopupMessage) {
        match message {
            PopupMessage::PopupShouldRefresh => self.reload(),
        }
    }

    fn send(&self, request: CoreRequest) {
        if let Err(e) = self.core.send(request) {
            // The content surface is not open; storage is already up to date
            log::debug!("Core request dropped: {}", e);
        }
    }
}
