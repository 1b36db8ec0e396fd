//! Background writer for the pinned list.
//!
//! [`PinStore::save`](super::PinStore::save) hands a snapshot to a named thread
//! and returns at once; the pipeline never waits on the backend. The thread
//! writes the newest snapshot it has, so a burst of toggles collapses into one
//! write per drain. Failures flip the shared degraded flag.

use super::PinnedItem;
use super::backend::KeyValueStore;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Upper bound for [`PersistWriter::flush`] when called through the store.
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

struct Snapshot {
    seq: u64,
    items: Vec<PinnedItem>,
}

/// Highest snapshot sequence number that has been written (or failed).
#[derive(Default)]
struct Progress {
    written: Mutex<u64>,
    cond: Condvar,
}

impl Progress {
    fn mark(&self, seq: u64) {
        let mut written = self.written.lock();
        *written = (*written).max(seq);
        self.cond.notify_all();
    }
}

pub(crate) struct PersistWriter {
    tx: Option<Sender<Snapshot>>,
    thread: Option<JoinHandle<()>>,
    progress: Arc<Progress>,
    degraded: Arc<AtomicBool>,
    backend: Arc<dyn KeyValueStore>,
    key: String,
    queued: u64,
}

impl PersistWriter {
    /// Start the writer thread. If the thread cannot be spawned, snapshots are
    /// written inline instead.
    pub(crate) fn spawn(
        backend: Arc<dyn KeyValueStore>,
        key: String,
        degraded: Arc<AtomicBool>,
    ) -> Self {
        let progress = Arc::new(Progress::default());
        let (tx, rx) = channel();

        let handle = {
            let backend = Arc::clone(&backend);
            let key = key.clone();
            let progress = Arc::clone(&progress);
            let degraded = Arc::clone(&degraded);
            std::thread::Builder::new()
                .name("rowpin-persist".into())
                .spawn(move || run(rx, backend.as_ref(), &key, &progress, &degraded))
        };

        let (tx, thread) = match handle {
            Ok(h) => (Some(tx), Some(h)),
            Err(e) => {
                crate::debug_error!("STORE", "failed to spawn persistence thread: {:?}", e);
                log::warn!("Persistence thread unavailable, saving inline: {}", e);
                (None, None)
            }
        };

        Self {
            tx,
            thread,
            progress,
            degraded,
            backend,
            key,
            queued: 0,
        }
    }

    /// Queue `items` for writing. Never blocks on the backend unless the
    /// writer thread is gone.
    pub(crate) fn submit(&mut self, items: Vec<PinnedItem>) {
        self.queued += 1;
        let snapshot = Snapshot {
            seq: self.queued,
            items,
        };
        let Some(tx) = &self.tx else {
            self.write_inline(snapshot);
            return;
        };
        if let Err(returned) = tx.send(snapshot) {
            log::warn!("Persistence thread stopped, saving inline");
            self.tx = None;
            self.write_inline(returned.0);
        }
    }

    fn write_inline(&self, snapshot: Snapshot) {
        persist(self.backend.as_ref(), &self.key, &snapshot.items, &self.degraded);
        self.progress.mark(snapshot.seq);
    }

    /// Whether a queued snapshot has not been written yet.
    pub(crate) fn is_pending(&self) -> bool {
        *self.progress.written.lock() < self.queued
    }

    /// Wait until every queued snapshot has been handled, at most `timeout`.
    /// Returns `false` on timeout.
    pub(crate) fn flush(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut written = self.progress.written.lock();
        while *written < self.queued {
            if self.progress.cond.wait_until(&mut written, deadline).timed_out() {
                return *written >= self.queued;
            }
        }
        true
    }
}

impl Drop for PersistWriter {
    fn drop(&mut self) {
        // Closing the channel lets the thread finish the last snapshot and exit
        self.tx.take();
        if let Some(handle) = self.thread.take()
            && handle.join().is_err()
        {
            log::error!("Persistence thread panicked");
        }
    }
}

fn run(
    rx: Receiver<Snapshot>,
    backend: &dyn KeyValueStore,
    key: &str,
    progress: &Progress,
    degraded: &AtomicBool,
) {
    while let Ok(mut latest) = rx.recv() {
        // Whole-list writes: only the newest snapshot matters
        while let Ok(next) = rx.try_recv() {
            latest = next;
        }
        persist(backend, key, &latest.items, degraded);
        progress.mark(latest.seq);
    }
    crate::debug_trace!("STORE", "Persistence thread for '{}' stopped", key);
}

fn persist(backend: &dyn KeyValueStore, key: &str, items: &[PinnedItem], degraded: &AtomicBool) {
    let value = match serde_json::to_value(items) {
        Ok(v) => v,
        Err(e) => {
            log::error!("Failed to serialize pinned list: {}", e);
            return;
        }
    };
    match backend.set(key, value) {
        Ok(()) => {
            if degraded.swap(false, Ordering::SeqCst) {
                log::info!("Pinned list storage is reachable again");
            }
            crate::debug_log!("STORE", "Saved {} pinned items", items.len());
        }
        Err(e) => {
            log::warn!("Failed to save pinned list, pins are session-only: {}", e);
            degraded.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn item(id: &str) -> PinnedItem {
        PinnedItem::new(id, "s", "f", Utc.timestamp_millis_opt(1).unwrap())
    }

    #[test]
    fn test_submit_returns_while_write_is_blocked() {
        let backend = Arc::new(MemoryStore::new());
        backend.hold_writes(true);
        let degraded = Arc::new(AtomicBool::new(false));
        let mut writer = PersistWriter::spawn(backend.clone(), "pins".into(), degraded);

        writer.submit(vec![item("a")]);
        assert!(writer.is_pending());
        assert!(!writer.flush(Duration::from_millis(50)));
        assert_eq!(backend.writes(), 0);

        backend.hold_writes(false);
        assert!(writer.flush(FLUSH_TIMEOUT));
        assert!(!writer.is_pending());
        assert_eq!(backend.get("pins").unwrap().unwrap()[0]["id"], "a");
    }

    #[test]
    fn test_newest_snapshot_wins() {
        let backend = Arc::new(MemoryStore::new());
        backend.hold_writes(true);
        let degraded = Arc::new(AtomicBool::new(false));
        let mut writer = PersistWriter::spawn(backend.clone(), "pins".into(), degraded);

        writer.submit(vec![item("a")]);
        writer.submit(vec![item("b"), item("a")]);
        writer.submit(vec![item("c"), item("b"), item("a")]);
        backend.hold_writes(false);
        assert!(writer.flush(FLUSH_TIMEOUT));

        let stored = backend.get("pins").unwrap().unwrap();
        assert_eq!(stored.as_array().map(Vec::len), Some(3));
        assert!(backend.writes() <= 3);
    }

    #[test]
    fn test_failed_write_sets_degraded() {
        let backend = Arc::new(MemoryStore::new());
        backend.set_available(false);
        let degraded = Arc::new(AtomicBool::new(false));
        let mut writer = PersistWriter::spawn(backend.clone(), "pins".into(), Arc::clone(&degraded));

        writer.submit(vec![item("a")]);
        assert!(writer.flush(FLUSH_TIMEOUT));
        assert!(degraded.load(Ordering::SeqCst));

        backend.set_available(true);
        writer.submit(vec![item("a")]);
        assert!(writer.flush(FLUSH_TIMEOUT));
        assert!(!degraded.load(Ordering::SeqCst));
    }

    #[test]
    fn test_drop_finishes_queued_write() {
        let backend = Arc::new(MemoryStore::new());
        let degraded = Arc::new(AtomicBool::new(false));
        let mut writer = PersistWriter::spawn(backend.clone(), "pins".into(), degraded);
        writer.submit(vec![item("a")]);
        drop(writer);

        assert_eq!(backend.writes(), 1);
    }
}
