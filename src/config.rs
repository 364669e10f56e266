//! Configuration for flashslot
//!
//! Two configs:
//! - [`Config`] covers the manager and the bundled engines, with sensible defaults.
//! - [`HandleConfig`] describes one slot (namespace, key, buffer capacity).

use std::path::PathBuf;

use crate::error::{Result, SlotError};
use crate::storage::validate_name;

/// Default partition label (matches the stock flash NVS partition name)
pub const DEFAULT_PARTITION: &str = "nvs";

/// Default upper bound on distinct namespaces reported by enumeration
pub const DEFAULT_MAX_NAMESPACES: usize = 64;

/// Main configuration for a flashslot instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for file-backed partitions
    /// Internal structure:
    ///   {data_dir}/
    ///     └── {partition}.fsl   (append-only entry log)
    pub data_dir: PathBuf,

    /// Partition label the engine serves
    pub partition: String,

    /// Max live entries a partition holds before writes fail
    pub max_entries: usize,

    // -------------------------------------------------------------------------
    // Manager Configuration
    // -------------------------------------------------------------------------
    /// Max distinct namespaces collected by `list_namespaces`.
    /// Namespaces past this bound are dropped from the listing without error.
    pub max_namespaces: usize,

    /// Tag recorded on the manager's tracing span
    pub log_tag: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./flashslot_data"),
            partition: DEFAULT_PARTITION.to_string(),
            max_entries: 504, // 4 pages of 126 entries
            max_namespaces: DEFAULT_MAX_NAMESPACES,
            log_tag: "NVS".to_string(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for partition files)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the partition label
    pub fn partition(mut self, label: impl Into<String>) -> Self {
        self.config.partition = label.into();
        self
    }

    /// Set the live entry limit of a partition
    pub fn max_entries(mut self, count: usize) -> Self {
        self.config.max_entries = count;
        self
    }

    /// Set the namespace enumeration bound
    pub fn max_namespaces(mut self, count: usize) -> Self {
        self.config.max_namespaces = count;
        self
    }

    /// Set the tag recorded on the manager's span
    pub fn log_tag(mut self, tag: impl Into<String>) -> Self {
        self.config.log_tag = tag.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// Construction parameters for a single slot handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleConfig {
    /// Namespace the slot lives in
    pub namespace: String,

    /// Initial key within the namespace
    pub key: String,

    /// Size of the value buffer in bytes, fixed for the handle's lifetime
    pub capacity: usize,
}

impl HandleConfig {
    pub fn new(namespace: impl Into<String>, key: impl Into<String>, capacity: usize) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
            capacity,
        }
    }

    /// Check namespace/key name rules and a non-zero capacity
    pub fn validate(&self) -> Result<()> {
        validate_name("namespace", &self.namespace)
            .map_err(|e| SlotError::InvalidArgument(e.to_string()))?;
        validate_name("key", &self.key).map_err(|e| SlotError::InvalidArgument(e.to_string()))?;

        if self.capacity == 0 {
            return Err(SlotError::InvalidArgument(
                "buffer capacity must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
