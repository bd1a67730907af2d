use crate::error::{CairnError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for an environment (one LMDB directory)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvironmentConfig {
    /// Directory holding the environment. Created if missing.
    pub path: PathBuf,

    /// Maximum number of named stores (LMDB `max_dbs`). Mandatory, must be > 0.
    pub max_sub_stores: u32,

    /// Maximum map size in bytes
    /// Default: 2GB
    #[serde(default = "default_max_size")]
    pub max_size_bytes: usize,

    /// Maximum number of concurrent readers (LMDB specific)
    /// Default: 126
    #[serde(default = "default_max_readers")]
    pub max_readers: u32,

    /// Sync mode for durability
    #[serde(default)]
    pub sync_mode: SyncMode,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// `fsync()` on every commit.
    ///
    /// Committed data survives power loss and OS crashes. Slowest option.
    Full,

    /// Skips syncing the LMDB meta-page on each commit (default).
    ///
    /// Data pages are still synced. After an OS crash the last transaction
    /// may be lost but the environment stays consistent.
    #[default]
    NoMetaSync,

    /// No `fsync()` at all; the OS page cache decides when to flush.
    ///
    /// **WARNING**: an OS crash or power failure can lose any number of
    /// recent transactions. Only for ephemeral or test data.
    NoSync,
}

pub const DEFAULT_MAX_SIZE_BYTES: usize = 2 * 1024 * 1024 * 1024;

fn default_max_size() -> usize {
    DEFAULT_MAX_SIZE_BYTES
}

fn default_max_readers() -> u32 {
    126
}

impl EnvironmentConfig {
    pub fn new(path: impl Into<PathBuf>, max_sub_stores: u32) -> Self {
        Self {
            path: path.into(),
            max_sub_stores,
            max_size_bytes: default_max_size(),
            max_readers: default_max_readers(),
            sync_mode: SyncMode::default(),
        }
    }

    pub fn with_max_size(mut self, max_size_bytes: usize) -> Self {
        self.max_size_bytes = max_size_bytes;
        self
    }

    pub fn with_max_readers(mut self, max_readers: u32) -> Self {
        self.max_readers = max_readers;
        self
    }

    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    /// Check the mandatory limits before anything touches the filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(CairnError::Config("path is missing".into()));
        }
        if self.max_sub_stores == 0 {
            return Err(CairnError::Config(
                "max_sub_stores must be greater than zero".into(),
            ));
        }
        if self.max_size_bytes == 0 {
            return Err(CairnError::Config(
                "max_size_bytes must be greater than zero".into(),
            ));
        }
        if self.max_readers == 0 {
            return Err(CairnError::Config(
                "max_readers must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
