//! Configuration for the write-ahead log
//!
//! Centralized configuration with sensible defaults.

use std::path::{Path, PathBuf};

/// Default name of the log file inside the database directory
pub const DEFAULT_FILE_NAME: &str = "strata.wal";

/// Default upper bound on a single entry payload (64 MB)
pub const DEFAULT_MAX_ENTRY_SIZE: u32 = 64 * 1024 * 1024;

/// Main configuration for a write-ahead log instance
#[derive(Debug, Clone)]
pub struct WalConfig {
    // -------------------------------------------------------------------------
    // File Layout
    // -------------------------------------------------------------------------
    /// Name of the log file within the database directory:
    ///   {data_dir}/
    ///     └── strata.wal       (write-ahead log)
    pub file_name: String,

    // -------------------------------------------------------------------------
    // Durability
    // -------------------------------------------------------------------------
    /// How `flush()` forces bytes to stable storage
    pub sync_mode: SyncMode,

    // -------------------------------------------------------------------------
    // Entry Limits
    // -------------------------------------------------------------------------
    /// Largest payload accepted on write and trusted on decode (bytes)
    pub max_entry_size: u32,
}

/// How a flush forces the log file to durable storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// `fdatasync`: file contents and the metadata needed to read them back
    Data,

    /// `fsync`: file contents and all metadata
    All,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_FILE_NAME.to_string(),
            sync_mode: SyncMode::Data,
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
        }
    }
}

impl WalConfig {
    /// Create a new config builder
    pub fn builder() -> WalConfigBuilder {
        WalConfigBuilder::default()
    }

    /// Full path of the log file inside `dir`
    pub fn log_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.file_name)
    }
}

/// Builder for WalConfig
#[derive(Default)]
pub struct WalConfigBuilder {
    config: WalConfig,
}

impl WalConfigBuilder {
    /// Set the log file name
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.config.file_name = name.into();
        self
    }

    /// Set the sync mode used by `flush()`
    pub fn sync_mode(mut self, mode: SyncMode) -> Self {
        self.config.sync_mode = mode;
        self
    }

    /// Set the maximum entry payload size (in bytes)
    pub fn max_entry_size(mut self, size: u32) -> Self {
        self.config.max_entry_size = size;
        self
    }

    pub fn build(self) -> WalConfig {
        self.config
    }
}
