//! Shared integration test helpers for rowpin.
//!
//! Include this module at the top of each test file that needs it:
//!
//! ```ignore
//! mod common;
//! use common::{Harness, inbox};
//! ```
//!
//! The `#[allow(dead_code)]` attribute suppresses warnings when only a subset
//! of helpers is used per file.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use rowpin::identity::PIN_ID_ATTR;
use rowpin::reconciler;
use rowpin::{
    Ack, CoreRequest, ManualClock, MemoryDocument, MemoryStore, NodeId, PinEngine, PopupMessage, RowpinConfig,
};
use rowpin::messaging::ChannelLink;
use rowpin::HostDocument;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// One row of a fixture list.
#[derive(Debug, Clone, Copy)]
pub struct RowSpec<'a> {
    pub subject: &'a str,
    pub sender: &'a str,
    pub time: &'a str,
    /// Native id attribute value (`data-thread-id`), if any.
    pub native_id: Option<&'a str>,
}

impl<'a> RowSpec<'a> {
    pub fn native(id: &'a str, subject: &'a str) -> Self {
        Self {
            subject,
            sender: "sender@example.com",
            time: "10:00",
            native_id: Some(id),
        }
    }

    pub fn anonymous(subject: &'a str, sender: &'a str) -> Self {
        Self {
            subject,
            sender,
            time: "10:00",
            native_id: None,
        }
    }
}

/// A mail-style list: readiness marker, a tbody and one `tr.zA` per row.
pub struct Inbox {
    pub doc: MemoryDocument,
    pub list: NodeId,
    pub rows: Vec<NodeId>,
}

pub fn inbox(specs: &[RowSpec<'_>]) -> Inbox {
    let mut doc = MemoryDocument::new();
    doc.set_location("https://mail.example.com/#inbox");
    let root = doc.root();
    let main = doc.append(root, "div", &[("gh", "tl")], "");
    let table = doc.append(main, "table", &[], "");
    let list = doc.append(table, "tbody", &[], "");
    let rows = specs.iter().map(|spec| append_row(&mut doc, list, spec)).collect();
    Inbox { doc, list, rows }
}

/// Append a row shaped like the host's markup.
pub fn append_row(doc: &mut MemoryDocument, list: NodeId, spec: &RowSpec<'_>) -> NodeId {
    let mut attrs = vec![("class", "zA")];
    if let Some(id) = spec.native_id {
        attrs.push(("data-thread-id", id));
    }
    let row = doc.append(list, "tr", &attrs, "");
    doc.append(row, "td", &[("class", "oZ-x3")], "");
    doc.append(row, "td", &[("class", "yW")], spec.sender);
    doc.append(row, "td", &[("class", "bog")], spec.subject);
    doc.append(row, "td", &[("class", "bqe")], spec.time);
    row
}

/// Engine over an [`Inbox`] with a manual clock, an in-memory store and a
/// popup channel.
pub struct Harness {
    pub engine: PinEngine<MemoryDocument>,
    pub backend: Arc<MemoryStore>,
    pub clock: ManualClock,
    pub popup_rx: mpsc::UnboundedReceiver<PopupMessage>,
    pub list: NodeId,
    pub rows: Vec<NodeId>,
    pub t0: Instant,
    pub now: Instant,
}

impl Harness {
    pub fn new(specs: &[RowSpec<'_>]) -> Self {
        Self::with(specs, RowpinConfig::default(), Arc::new(MemoryStore::new()))
    }

    pub fn with(specs: &[RowSpec<'_>], config: RowpinConfig, backend: Arc<MemoryStore>) -> Self {
        let Inbox { doc, list, rows } = inbox(specs);
        let clock = ManualClock::new(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap());
        let (link, popup_rx) = ChannelLink::channel();
        let engine = PinEngine::with_parts(
            doc,
            config,
            backend.clone(),
            Box::new(link),
            Arc::new(clock.clone()),
        );
        let t0 = Instant::now();
        Self {
            engine,
            backend,
            clock,
            popup_rx,
            list,
            rows,
            t0,
            now: t0,
        }
    }

    /// Start, pass the readiness check and run the initial pass.
    pub fn boot(mut self) -> Self {
        self.engine.start(self.now);
        self.engine.advance(self.now);
        self.run_for(Duration::from_millis(1500));
        self
    }

    /// Move time forward, firing every deadline on the way, then wait for
    /// queued saves so tests can inspect the backend.
    pub fn run_for(&mut self, span: Duration) {
        let end = self.now + span;
        while let Some(at) = self.engine.next_deadline() {
            if at > end {
                break;
            }
            self.now = self.now.max(at);
            self.clock.advance(chrono::Duration::milliseconds(1));
            self.engine.advance(self.now);
        }
        self.now = end;
        assert!(self.engine.store().flush(), "pinned list save did not finish");
    }

    /// Deliver a popup request and wait for the resulting save.
    pub fn message(&mut self, request: CoreRequest) -> Ack {
        let ack = self.engine.handle_message(request, self.now);
        assert!(self.engine.store().flush(), "pinned list save did not finish");
        ack
    }

    pub fn doc(&self) -> &MemoryDocument {
        self.engine.doc()
    }

    pub fn control(&self, row: NodeId) -> NodeId {
        reconciler::toggle_controls(self.engine.doc(), row)[0]
    }

    /// Click the toggle of `row`, then let the toggle guard window pass.
    pub fn click(&mut self, row: NodeId) {
        let control = self.control(row);
        self.engine.activate(control, self.now);
        self.run_for(Duration::from_millis(600));
    }

    pub fn id_of(&self, row: NodeId) -> String {
        self.engine
            .doc()
            .attribute(row, PIN_ID_ATTR)
            .unwrap_or_default()
            .to_string()
    }

    /// Row ids of the list in on-screen order.
    pub fn order(&self) -> Vec<String> {
        self.engine.doc().child_attributes(self.list, PIN_ID_ATTR)
    }

    pub fn pinned_ids(&self) -> Vec<String> {
        self.engine
            .store()
            .items()
            .iter()
            .map(|i| i.id.clone())
            .collect()
    }

    pub fn popup_notifications(&mut self) -> usize {
        let mut n = 0;
        while self.popup_rx.try_recv().is_ok() {
            n += 1;
        }
        n
    }
}
