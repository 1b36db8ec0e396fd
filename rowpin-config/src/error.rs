//! Typed error variants for the rowpin-config crate.
//!
//! `RowpinConfig::load_from` / `save_to` still return `anyhow::Result` so callers
//! get path context; a `ConfigError` can be recovered with
//! `err.downcast_ref::<ConfigError>()`.

use thiserror::Error;

/// Errors that can occur when loading, saving or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An I/O error occurred reading or writing the config file.
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// The config file contained invalid YAML that could not be parsed.
    #[error("YAML parse error in config: {0}")]
    Parse(#[from] serde_yaml_ng::Error),

    /// A field value failed semantic validation.
    #[error("Invalid config: {0}")]
    Validation(String),
}
