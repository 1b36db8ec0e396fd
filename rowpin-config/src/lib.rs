//! Configuration system for rowpin.
//!
//! This crate provides:
//!
//! - The compact [`ElementSelector`] language used to describe host markup
//! - Data-driven [`RowMatcher`] strategies for row discovery
//! - [`RowpinConfig`] with YAML loading/saving and serde defaults
//! - The [`MAX_PINS`] capacity constant

pub mod config;
pub mod defaults;
pub mod error;
pub mod selector;
mod types;

/// Maximum number of pinned items. Build-time constant; not configurable at runtime.
pub const MAX_PINS: usize = 5;

pub use config::RowpinConfig;
pub use error::ConfigError;
pub use selector::{AttributeCondition, AttributeOp, ElementSelector, SelectorError, SelectorTarget};
pub use types::{FieldSelectors, HighlightStyle, OverflowPolicy, RowMatcher, Timings};
