//! The pin engine: owns the pinned-set, the watcher state and every component
//! of the pipeline, and applies them to a host document.
//!
//! All methods are synchronous and take the current `Instant` from the caller.
//! Exactly one caller drives an engine (see [`crate::driver`]), so a pass can
//! never overlap another one.

use crate::clock::{Clock, SystemClock};
use crate::error::{HostError, PinError};
use crate::host::{HostDocument, NodeId};
use crate::identity::{IdentityResolver, PIN_ID_ATTR};
use crate::messaging::{NullLink, PopupLink, notify_popup};
use crate::reconciler::{self, Reconciler, ToggleGuard, ToggleOutcome};
use crate::reorder;
use crate::scanner::RowScanner;
use crate::store::{KeyValueStore, PinOutcome, PinStore};
use crate::watcher::{ChangeWatcher, HostEvent, Lifecycle, Wake};
use rowpin_config::RowpinConfig;
use rowpin_protocol::{Ack, CoreRequest, PopupMessage};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// How the host should treat a user activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The activation hit a toggle control. The host must stop propagation and
    /// prevent the default action, even if the toggle itself was ignored.
    Consumed,
    /// Not ours; let the host handle it.
    NotOurs,
}

/// Reply to a [`HostEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Nothing for the host to do.
    Observed,
    Activation(Activation),
    Ack(Ack),
}

/// Summary of one scan/reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Rows found by the scanner.
    pub rows: usize,
    /// Rows reconciled successfully.
    pub reconciled: usize,
    /// Rows skipped because the host refused an operation on them.
    pub failed: usize,
}

pub struct PinEngine<D: HostDocument> {
    doc: D,
    config: RowpinConfig,
    scanner: RowScanner,
    identity: IdentityResolver,
    reconciler: Reconciler,
    store: PinStore,
    watcher: ChangeWatcher,
    guard: ToggleGuard,
    popup: Box<dyn PopupLink>,
    clock: Arc<dyn Clock>,
}

impl<D: HostDocument> std::fmt::Debug for PinEngine<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinEngine")
            .field("lifecycle", &self.watcher.lifecycle())
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<D: HostDocument> PinEngine<D> {
    /// Engine on the system clock with no popup attached.
    pub fn new(doc: D, config: RowpinConfig, backend: Arc<dyn KeyValueStore>) -> Self {
        Self::with_parts(doc, config, backend, Box::new(NullLink), Arc::new(SystemClock))
    }

    pub fn with_parts(
        doc: D,
        config: RowpinConfig,
        backend: Arc<dyn KeyValueStore>,
        popup: Box<dyn PopupLink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = PinStore::new(backend, config.storage_key.clone(), config.overflow_policy);
        Self {
            scanner: RowScanner::from_config(&config),
            identity: IdentityResolver::new(
                config.native_id_attributes.clone(),
                config.fields.clone(),
                Arc::clone(&clock),
            ),
            reconciler: Reconciler::from_config(&config),
            watcher: ChangeWatcher::new(config.timings),
            guard: ToggleGuard::new(config.timings.toggle_guard()),
            store,
            popup,
            clock,
            doc,
            config,
        }
    }

    pub fn doc(&self) -> &D {
        &self.doc
    }

    /// Mutable access for host adapters and tests. Changes made here are
    /// picked up by the next pass.
    pub fn doc_mut(&mut self) -> &mut D {
        &mut self.doc
    }

    pub fn into_doc(self) -> D {
        self.doc
    }

    pub fn config(&self) -> &RowpinConfig {
        &self.config
    }

    pub fn store(&self) -> &PinStore {
        &self.store
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.watcher.lifecycle()
    }

    pub fn reorder_pending(&self) -> bool {
        self.watcher.reorder_pending()
    }

    /// Begin waiting for the host.
    pub fn start(&mut self, now: Instant) {
        crate::debug_info!("ENGINE", "Starting, waiting for host");
        self.watcher.start(now);
    }

    /// Earliest time [`advance`](Self::advance) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.watcher.next_deadline()
    }

    /// Run everything that is due at `now`.
    pub fn advance(&mut self, now: Instant) {
        for wake in self.watcher.due(now) {
            match wake {
                Wake::ReadinessPoll => self.poll_readiness(now),
                Wake::Pass => {
                    self.process_visible_rows();
                    if !self.store.is_empty() {
                        self.watcher.schedule_reorder(now);
                    }
                }
                Wake::Reorder => {
                    self.reorder_now();
                }
                Wake::PulseEnd(id) => self.end_pulse(&id),
            }
        }
    }

    pub fn handle_event(&mut self, event: HostEvent, now: Instant) -> EventOutcome {
        match event {
            HostEvent::Activated { node } => EventOutcome::Activation(self.activate(node, now)),
            HostEvent::Message(request) => EventOutcome::Ack(self.handle_message(request, now)),
            other => {
                let has_pins = !self.store.is_empty();
                self.watcher.observe(&other, now, has_pins);
                EventOutcome::Observed
            }
        }
    }

    fn poll_readiness(&mut self, now: Instant) {
        if !self.scanner.is_host_ready(&self.doc) {
            crate::debug_trace!("ENGINE", "Host not ready yet");
            self.watcher.poll_again(now);
            return;
        }
        self.store.load();
        self.watcher.activate(now, self.doc.location());
        log::info!(
            "Host ready, {} pinned items loaded{}",
            self.store.len(),
            if self.store.is_degraded() {
                " (storage unavailable)"
            } else {
                ""
            }
        );
    }

    /// Scan, resolve and reconcile every visible row. Per-row failures are
    /// logged and skipped.
    pub fn process_visible_rows(&mut self) -> PassReport {
        let rows = self.scanner.scan(&self.doc);
        let resolved = self.identity.resolve_all(&mut self.doc, &rows, &self.store);
        let mut report = PassReport {
            rows: rows.len(),
            failed: rows.len() - resolved.len(),
            ..Default::default()
        };
        for (row, id) in resolved {
            let pinned = self.store.is_pinned(&id);
            match self.reconcile_row(row, &id, pinned) {
                Ok(_) => report.reconciled += 1,
                Err(e) => {
                    log::debug!("Failed to reconcile row {:?} ({}): {}", row, id, e);
                    report.failed += 1;
                }
            }
        }
        crate::debug_log!(
            "ENGINE",
            "Pass: {} rows, {} reconciled, {} failed",
            report.rows,
            report.reconciled,
            report.failed
        );
        report
    }

    /// Put pinned rows first, in pin order. Returns the number of moves.
    pub fn reorder_now(&mut self) -> usize {
        if self.store.is_empty() {
            return 0;
        }
        let rows = self.scanner.scan(&self.doc);
        let store = &self.store;
        match reorder::reorder(&mut self.doc, &rows, |id| store.index_of(id)) {
            Ok(moves) => moves,
            Err(e) => {
                log::debug!("Reorder skipped: {}", e);
                0
            }
        }
    }

    /// Handle a user activation of `node`.
    pub fn activate(&mut self, node: NodeId, now: Instant) -> Activation {
        let Some(control) = reconciler::enclosing_control(&self.doc, node) else {
            return Activation::NotOurs;
        };
        // The row's tag is authoritative; the control may still carry a stale id
        let target = reconciler::control_row(&self.doc, control).and_then(|row| {
            self.doc
                .attribute(row, PIN_ID_ATTR)
                .map(|id| (row, id.to_string()))
        });
        let Some((row, id)) = target else {
            log::debug!("Activated toggle {:?} has no tagged row", control);
            return Activation::Consumed;
        };
        if !self.guard.try_accept(&id, now) {
            crate::debug_trace!("ENGINE", "Ignoring repeated activation for {}", id);
            return Activation::Consumed;
        }
        self.toggle_pin(row, &id, now);
        Activation::Consumed
    }

    /// Flip the pinned state of `id`, shown by `row`.
    pub fn toggle_pin(&mut self, row: NodeId, id: &str, now: Instant) -> ToggleOutcome {
        let outcome = if self.store.unpin(id).is_some() {
            ToggleOutcome::Unpinned
        } else {
            let item = reconciler::snapshot_item(
                &self.doc,
                row,
                id,
                self.identity.fields(),
                self.clock.now(),
            );
            match self.store.pin(item) {
                Ok(PinOutcome::Inserted) => ToggleOutcome::Pinned,
                Ok(PinOutcome::InsertedWithEviction(evicted)) => {
                    self.refresh_row(&evicted.id);
                    ToggleOutcome::PinnedWithEviction(evicted)
                }
                Err(err @ PinError::CapacityReached { .. }) => {
                    log::info!("Pin of {} refused: {}", id, err);
                    self.doc.show_notice(&err.to_string());
                    return ToggleOutcome::RejectedAtCapacity;
                }
                Err(PinError::AlreadyPinned(_)) => return ToggleOutcome::Ignored,
            }
        };

        self.store.save();
        let pinned = self.store.is_pinned(id);
        if let Err(e) = self.reconcile_row(row, id, pinned) {
            log::debug!("Failed to reconcile toggled row {}: {}", id, e);
        }
        self.watcher.schedule_reorder(now);
        notify_popup(self.popup.as_ref(), PopupMessage::PopupShouldRefresh);
        crate::debug_info!("ENGINE", "Toggle {} -> {:?}", id, outcome);
        outcome
    }

    /// Answer a popup request. Every request is acknowledged.
    pub fn handle_message(&mut self, request: CoreRequest, now: Instant) -> Ack {
        match request {
            CoreRequest::ItemUnpinned { id } => {
                if self.store.unpin(&id).is_some() {
                    self.store.save();
                    self.refresh_row(&id);
                    self.watcher.schedule_reorder(now);
                    notify_popup(self.popup.as_ref(), PopupMessage::PopupShouldRefresh);
                }
            }
            CoreRequest::RefreshRequested => {
                self.store.reload();
                self.process_visible_rows();
                self.reorder_now();
            }
            CoreRequest::NavigateToItem { id } => self.navigate_to(&id, now),
        }
        Ack::done()
    }

    /// Scroll the row for `id` into view and pulse it.
    pub fn navigate_to(&mut self, id: &str, now: Instant) {
        let Some(row) = self.scanner.find_tagged(&self.doc, id) else {
            log::debug!("No visible row for {}", id);
            return;
        };
        if let Err(e) = self.doc.scroll_into_view(row) {
            log::debug!("Could not scroll to {}: {}", id, e);
            return;
        }
        if let Err(e) = self.reconciler.apply_pulse(&mut self.doc, row) {
            log::debug!("Could not pulse {}: {}", id, e);
            return;
        }
        self.watcher.schedule_pulse_end(id, now);
    }

    fn end_pulse(&mut self, id: &str) {
        if let Some(row) = self.scanner.find_tagged(&self.doc, id) {
            let pinned = self.store.is_pinned(id);
            if let Err(e) = self.reconciler.apply_highlight(&mut self.doc, row, pinned) {
                log::debug!("Could not restore highlight on {}: {}", id, e);
            }
        }
    }

    /// Reconcile `row`, leaving its background to a running navigation pulse.
    fn reconcile_row(&mut self, row: NodeId, id: &str, pinned: bool) -> Result<NodeId, HostError> {
        if self.watcher.is_pulsing(id) {
            return self.reconciler.sync_control(&mut self.doc, row, id, pinned);
        }
        self.reconciler.reconcile(&mut self.doc, row, id, pinned)
    }

    /// Reconcile the live row for `id` without a full pass.
    fn refresh_row(&mut self, id: &str) {
        let Some(row) = self.scanner.find_tagged(&self.doc, id) else {
            return;
        };
        let pinned = self.store.is_pinned(id);
        if let Err(e) = self.reconcile_row(row, id, pinned) {
            log::debug!("Failed to reconcile row {}: {}", id, e);
        }
    }

    /// Ids currently tagged on rendered rows.
    pub fn live_ids(&self) -> HashSet<String> {
        self.scanner
            .scan(&self.doc)
            .into_iter()
            .filter_map(|row| self.doc.attribute(row, PIN_ID_ATTR).map(str::to_string))
            .collect()
    }
}
