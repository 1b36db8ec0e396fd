// Library exports for rowpin
//
// Module map (leaf-first):
//
//   host       : `HostDocument` trait and the in-memory reference document
//   identity   : row id resolution and collision tie-break
//   store      : pinned-set with fail-soft persistence
//   scanner    : row discovery via configured matcher strategies
//   reconciler : toggle control and highlight
//   reorder    : stable pinned-first partition with minimal moves
//   schedule   : debounce and timer deadlines
//   watcher    : host events and lifecycle
//   engine     : the pipeline owner
//   driver     : tokio event loop
//   popup      : popup surface model
//   messaging  : popup/core links
//
// Mutex policy: `parking_lot::Mutex` for sync-only shared state (debug logger,
// in-memory store, manual clock). Nothing in the engine is locked; it is owned
// by the single driver task.

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[macro_use]
pub mod debug;

pub mod clock;
pub mod driver;
pub mod engine;
pub mod error;
pub mod host;
pub mod identity;
pub mod messaging;
pub mod popup;
pub mod reconciler;
pub mod reorder;
pub mod scanner;
pub mod schedule;
pub mod store;
pub mod watcher;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Activation, EventOutcome, PassReport, PinEngine};
pub use error::{HostError, LinkError, PinError, StoreError};
pub use host::{HostDocument, MemoryDocument, NodeId};
pub use popup::{PopupEntry, PopupModel};
pub use reconciler::ToggleOutcome;
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, PinStore, PinnedItem};
pub use watcher::{HostEvent, Lifecycle};

pub use rowpin_config::{MAX_PINS, OverflowPolicy, RowpinConfig};
pub use rowpin_protocol::{Ack, CoreRequest, PopupMessage};
