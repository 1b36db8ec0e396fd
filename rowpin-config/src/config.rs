//! The top-level [`RowpinConfig`] struct and its persistence helpers.
//!
//! Stored as YAML in `~/.config/rowpin/config.yaml`. Every field has a serde
//! default, so an empty or partial file yields the built-in behaviour.

use crate::error::ConfigError;
use crate::selector::ElementSelector;
use crate::types::{FieldSelectors, HighlightStyle, OverflowPolicy, RowMatcher, Timings};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Runtime configuration for the pin engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowpinConfig {
    /// Ordered row discovery strategies
    #[serde(default = "crate::defaults::row_matchers")]
    pub row_matchers: Vec<RowMatcher>,

    /// Any of these present means the host list surface has finished loading
    #[serde(default = "crate::defaults::readiness_selectors")]
    pub readiness_selectors: Vec<ElementSelector>,

    /// Native stable-id attributes, in priority order
    #[serde(default = "crate::defaults::native_id_attributes")]
    pub native_id_attributes: Vec<String>,

    /// Where to read subject/sender/timestamp text inside a row
    #[serde(default)]
    pub fields: FieldSelectors,

    /// Tags of the first-child cell that receives the toggle control, in priority order
    #[serde(default = "crate::defaults::control_host_tags")]
    pub control_host_tags: Vec<String>,

    /// Pinned row and pulse colors
    #[serde(default)]
    pub highlight: HighlightStyle,

    /// Behaviour when pinning while the pinned-set is full
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,

    /// Debounce delays and timer intervals
    #[serde(default)]
    pub timings: Timings,

    /// Key of the pinned-set in the key-value store
    #[serde(default = "crate::defaults::storage_key")]
    pub storage_key: String,
}

impl Default for RowpinConfig {
    fn default() -> Self {
        Self {
            row_matchers: crate::defaults::row_matchers(),
            readiness_selectors: crate::defaults::readiness_selectors(),
            native_id_attributes: crate::defaults::native_id_attributes(),
            fields: FieldSelectors::default(),
            control_host_tags: crate::defaults::control_host_tags(),
            highlight: HighlightStyle::default(),
            overflow_policy: OverflowPolicy::default(),
            timings: Timings::default(),
            storage_key: crate::defaults::storage_key(),
        }
    }
}

impl RowpinConfig {
    /// Default config file path: `~/.config/rowpin/config.yaml`
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("rowpin")
            .join("config.yaml")
    }

    /// Load from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from a specific file. A missing or empty file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        log::info!("Config path: {:?}", path);
        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(ConfigError::from)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: RowpinConfig = serde_yaml_ng::from_str(&contents)
            .map_err(ConfigError::from)
            .with_context(|| format!("Failed to parse config from {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location, falling back to defaults on any error.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                log::error!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        }
    }

    /// Save to a specific file (atomic: temp file then rename).
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let yaml = serde_yaml_ng::to_string(self).context("Failed to serialize config")?;

        let temp_path = path.with_extension("yaml.tmp");
        fs::write(&temp_path, &yaml)
            .with_context(|| format!("Failed to write config to {:?}", temp_path))?;
        fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to move config into place at {:?}", path))?;
        Ok(())
    }

    /// Reject configurations that would make the engine unable to find rows or
    /// spin on zero-length timers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.row_matchers.is_empty() {
            return Err(ConfigError::Validation(
                "row_matchers must contain at least one strategy".to_string(),
            ));
        }
        if self.storage_key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "storage_key must not be empty".to_string(),
            ));
        }
        if self.timings.tick_interval_ms == 0 || self.timings.readiness_poll_ms == 0 {
            return Err(ConfigError::Validation(
                "tick_interval_ms and readiness_poll_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
