//! Pin store adapter: the in-memory pinned-set and its persistence.
//!
//! The in-memory list is authoritative. Persistence is whole-list and
//! fire-and-forget: `save` queues a snapshot for a background writer and
//! returns. A failed write is logged and puts the store in degraded mode, it
//! never rolls back the visible state.

pub mod backend;
mod writer;

pub use backend::{JsonFileStore, KeyValueStore, MemoryStore, install_defaults};
pub use writer::FLUSH_TIMEOUT;

use writer::PersistWriter;

use crate::error::{PinError, StoreError};
use chrono::{DateTime, Utc};
use rowpin_config::{MAX_PINS, OverflowPolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// One pinned item. `label`/`sub_label` are a snapshot taken at pin time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinnedItem {
    pub id: String,
    #[serde(default, alias = "subject")]
    pub label: String,
    #[serde(default, alias = "sender")]
    pub sub_label: String,
    #[serde(alias = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub pinned_at: DateTime<Utc>,
}

impl PinnedItem {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        sub_label: impl Into<String>,
        pinned_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            sub_label: sub_label.into(),
            pinned_at,
        }
    }
}

/// Decode a stored pinned list, dropping duplicate ids and anything past capacity.
pub fn decode_items(value: Value) -> Result<Vec<PinnedItem>, StoreError> {
    let items: Vec<PinnedItem> = serde_json::from_value(value)?;
    let mut seen = HashSet::new();
    let mut clean: Vec<PinnedItem> = items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect();
    if clean.len() > MAX_PINS {
        log::warn!(
            "Stored pinned list has {} items, keeping the first {}",
            clean.len(),
            MAX_PINS
        );
        clean.truncate(MAX_PINS);
    }
    Ok(clean)
}

/// Successful result of [`PinStore::pin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinOutcome {
    Inserted,
    /// Inserted after evicting the oldest pin (only with `OverflowPolicy::EvictOldest`).
    InsertedWithEviction(PinnedItem),
}

/// The pinned-set, most recently pinned first.
pub struct PinStore {
    items: Vec<PinnedItem>,
    overflow: OverflowPolicy,
    backend: Arc<dyn KeyValueStore>,
    key: String,
    degraded: Arc<AtomicBool>,
    writer: PersistWriter,
}

impl std::fmt::Debug for PinStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinStore")
            .field("items", &self.items)
            .field("overflow", &self.overflow)
            .field("key", &self.key)
            .field("degraded", &self.is_degraded())
            .finish_non_exhaustive()
    }
}

impl PinStore {
    /// Create an empty store. Call [`load`](Self::load) to read persisted pins.
    pub fn new(
        backend: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        overflow: OverflowPolicy,
    ) -> Self {
        let key = key.into();
        let degraded = Arc::new(AtomicBool::new(false));
        let writer = PersistWriter::spawn(Arc::clone(&backend), key.clone(), Arc::clone(&degraded));
        Self {
            items: Vec::new(),
            overflow,
            backend,
            key,
            degraded,
            writer,
        }
    }

    /// Replace the in-memory set with the persisted one. Never fails: missing or
    /// malformed data yields an empty set, an unreachable backend additionally
    /// switches to degraded mode.
    pub fn load(&mut self) -> &[PinnedItem] {
        self.items = match self.backend.get(&self.key) {
            Ok(None) => Vec::new(),
            Ok(Some(value)) => match decode_items(value) {
                Ok(items) => items,
                Err(e) => {
                    log::warn!("Ignoring malformed pinned list '{}': {}", self.key, e);
                    Vec::new()
                }
            },
            Err(e) => {
                log::warn!("Pinned list unavailable, keeping pins in memory only: {}", e);
                self.degraded.store(true, Ordering::SeqCst);
                Vec::new()
            }
        };
        crate::debug_info!("STORE", "Loaded {} pinned items", self.items.len());
        &self.items
    }

    /// Pick up changes another surface wrote. Unlike [`load`](Self::load), an
    /// unreachable or malformed backend keeps the current in-memory set.
    /// A save still in flight also keeps the in-memory set, since it is newer
    /// than anything stored. Returns `true` when the set was replaced.
    pub fn reload(&mut self) -> bool {
        if self.writer.is_pending() {
            crate::debug_log!("STORE", "Reload skipped, a save is still in flight");
            return false;
        }
        let value = match self.backend.get(&self.key) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Pinned list unavailable, keeping in-memory pins: {}", e);
                self.degraded.store(true, Ordering::SeqCst);
                return false;
            }
        };
        let items = match value.map(decode_items).transpose() {
            Ok(items) => items.unwrap_or_default(),
            Err(e) => {
                log::warn!("Ignoring malformed pinned list '{}': {}", self.key, e);
                return false;
            }
        };
        self.items = items;
        true
    }

    /// Queue the whole list for persistence and return immediately. Failures
    /// are logged by the writer and show up in [`is_degraded`](Self::is_degraded).
    pub fn save(&mut self) {
        self.writer.submit(self.items.clone());
    }

    /// Block until queued saves have reached the backend, at most
    /// [`FLUSH_TIMEOUT`]. Returns `false` on timeout.
    pub fn flush(&self) -> bool {
        self.flush_within(FLUSH_TIMEOUT)
    }

    pub fn flush_within(&self, timeout: Duration) -> bool {
        self.writer.flush(timeout)
    }

    /// Whether a queued save has not reached the backend yet.
    pub fn has_pending_writes(&self) -> bool {
        self.writer.is_pending()
    }

    pub fn items(&self) -> &[PinnedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        MAX_PINS
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= MAX_PINS
    }

    /// Whether the last load or save could not reach the backend.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow
    }

    pub fn is_pinned(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    /// Position in pin order (0 = top of the list).
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&PinnedItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Insert at the head. Does not persist; callers decide when to save.
    pub fn pin(&mut self, item: PinnedItem) -> Result<PinOutcome, PinError> {
        if self.is_pinned(&item.id) {
            return Err(PinError::AlreadyPinned(item.id));
        }

        let mut outcome = PinOutcome::Inserted;
        if self.is_full() {
            match self.overflow {
                OverflowPolicy::Reject => {
                    return Err(PinError::CapacityReached { max: MAX_PINS });
                }
                OverflowPolicy::EvictOldest => {
                    // Head insertion keeps the oldest pin at the tail
                    if let Some(evicted) = self.items.pop() {
                        log::info!("Evicted oldest pin {} to make room", evicted.id);
                        outcome = PinOutcome::InsertedWithEviction(evicted);
                    }
                }
            }
        }

        self.items.insert(0, item);
        Ok(outcome)
    }

    /// Remove by id. Does not persist.
    pub fn unpin(&mut self, id: &str) -> Option<PinnedItem> {
        let index = self.index_of(id)?;
        Some(self.items.remove(index))
    }

    /// Replace the whole set (sanitized like a load). Does not persist.
    pub fn replace_all(&mut self, items: Vec<PinnedItem>) {
        let mut seen = HashSet::new();
        self.items = items
            .into_iter()
            .filter(|item| seen.insert(item.id.clone()))
            .take(MAX_PINS)
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn item(id: &str, ms: i64) -> PinnedItem {
        PinnedItem::new(id, format!("Subject {id}"), format!("{id}@example.com"), at(ms))
    }

    fn store() -> (Arc<MemoryStore>, PinStore) {
        let backend = Arc::new(MemoryStore::new());
        let store = PinStore::new(backend.clone(), "pinnedItems", OverflowPolicy::Reject);
        (backend, store)
    }

    #[test]
    fn test_pin_inserts_at_head() {
        let (_, mut store) = store();
        store.pin(item("a", 1)).unwrap();
        store.pin(item("b", 2)).unwrap();

        assert_eq!(store.index_of("b"), Some(0));
        assert_eq!(store.index_of("a"), Some(1));
        assert_eq!(store.index_of("zzz"), None);
    }

    #[test]
    fn test_capacity_rejects_sixth_pin() {
        let (_, mut store) = store();
        for i in 0..MAX_PINS {
            store.pin(item(&format!("id{i}"), i as i64)).unwrap();
        }
        let before = store.items().to_vec();

        let err = store.pin(item("extra", 99)).unwrap_err();
        assert_eq!(err, PinError::CapacityReached { max: MAX_PINS });
        assert_eq!(store.items(), before.as_slice());
        assert_eq!(err.to_string(), "You can only pin up to 5 items.");
    }

    #[test]
    fn test_evict_oldest_policy() {
        let backend = Arc::new(MemoryStore::new());
        let mut store = PinStore::new(backend, "pinnedItems", OverflowPolicy::EvictOldest);
        for i in 0..MAX_PINS {
            store.pin(item(&format!("id{i}"), i as i64)).unwrap();
        }

        let outcome = store.pin(item("extra", 99)).unwrap();
        assert_eq!(outcome, PinOutcome::InsertedWithEviction(item("id0", 0)));
        assert_eq!(store.len(), MAX_PINS);
        assert_eq!(store.index_of("extra"), Some(0));
        assert!(!store.is_pinned("id0"));
    }

    #[test]
    fn test_duplicate_pin_rejected() {
        let (_, mut store) = store();
        store.pin(item("a", 1)).unwrap();
        assert_eq!(
            store.pin(item("a", 2)),
            Err(PinError::AlreadyPinned("a".to_string()))
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_order_preserved_after_unpin() {
        let (_, mut store) = store();
        store.pin(item("a", 100)).unwrap();
        store.pin(item("b", 200)).unwrap();
        store.unpin("a");

        assert_eq!(store.items(), &[item("b", 200)]);
    }

    #[test]
    fn test_save_and_reload_roundtrip() {
        let (backend, mut store) = store();
        let original = PinnedItem::new("x", "Invoice", "billing@x", at(1_700_000_000_123));
        store.pin(original.clone()).unwrap();
        store.save();
        assert!(store.flush());

        let mut reloaded = PinStore::new(backend, "pinnedItems", OverflowPolicy::Reject);
        assert_eq!(reloaded.load(), &[original]);
    }

    #[test]
    fn test_wire_format() {
        let value = serde_json::to_value(PinnedItem::new("x", "Invoice", "billing@x", at(5))).unwrap();
        assert_eq!(
            value,
            json!({"id": "x", "label": "Invoice", "subLabel": "billing@x", "pinnedAt": 5})
        );
    }

    #[test]
    fn test_legacy_records_decode() {
        let items = decode_items(json!([
            {"id": "t1", "subject": "Hello", "sender": "Ann", "timestamp": 1000},
            {"id": "t1", "subject": "Dup", "sender": "Ann", "timestamp": 2000},
        ]))
        .unwrap();
        assert_eq!(items, vec![PinnedItem::new("t1", "Hello", "Ann", at(1000))]);
    }

    #[test]
    fn test_load_malformed_is_empty_not_degraded() {
        let (backend, mut store) = store();
        backend.set("pinnedItems", json!({"not": "a list"})).unwrap();

        assert!(store.load().is_empty());
        assert!(!store.is_degraded());
    }

    #[test]
    fn test_unavailable_backend_degrades() {
        let (backend, mut store) = store();
        backend.set_available(false);

        assert!(store.load().is_empty());
        assert!(store.is_degraded());

        // Pins still work in memory
        store.pin(item("a", 1)).unwrap();
        store.save();
        assert!(store.flush());
        assert!(store.is_pinned("a"));
        assert!(store.is_degraded());

        backend.set_available(true);
        store.save();
        assert!(store.flush());
        assert!(!store.is_degraded());
        assert_eq!(backend.writes(), 1);
    }

    #[test]
    fn test_reload_keeps_memory_when_unavailable() {
        let (backend, mut store) = store();
        store.pin(item("a", 1)).unwrap();
        backend.set_available(false);

        assert!(!store.reload());
        assert!(store.is_pinned("a"));

        backend.set_available(true);
        backend.set("pinnedItems", json!([])).unwrap();
        assert!(store.reload());
        assert!(store.is_empty());
    }

    #[test]
    fn test_replace_all_sanitizes() {
        let (_, mut store) = store();
        let many: Vec<PinnedItem> = (0..8).map(|i| item(&format!("i{i}"), i)).collect();
        store.replace_all(many);
        assert_eq!(store.len(), MAX_PINS);
    }
}
