//! Typed error types for rowpin.
//!
//! None of these ever escape the pipeline as a failure of a whole pass: host
//! errors are isolated per row, storage errors degrade to in-memory mode, link
//! errors are swallowed. They exist so each layer can say precisely what went
//! wrong in its logs and tests can match on variants.

use crate::host::NodeId;
use thiserror::Error;

/// Errors reported by a [`HostDocument`](crate::host::HostDocument) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The node id does not refer to any element the host knows about.
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    /// The node exists but has been removed from the document.
    #[error("node {0:?} is detached from the document")]
    Detached(NodeId),

    /// The requested tree operation would be invalid (e.g. inserting a node
    /// before a reference that is not a child of the parent).
    #[error("invalid tree operation: {0}")]
    InvalidOperation(String),
}

/// Errors reported by a [`KeyValueStore`](crate::store::KeyValueStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store cannot be reached (closed, permission denied, ...).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The stored value exists but does not have the expected shape.
    #[error("stored value is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Rejections from pinned-set mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinError {
    /// The pinned-set already holds the maximum number of items.
    #[error("You can only pin up to {max} items.")]
    CapacityReached { max: usize },

    /// The id is already in the pinned-set.
    #[error("item {0} is already pinned")]
    AlreadyPinned(String),
}

/// Errors delivering a message to a peer surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The receiving surface is closed or navigated away.
    #[error("peer surface is closed")]
    Closed,
}
