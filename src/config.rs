//! Centralized configuration and builder for the snapshot vault.
//!
//! Goals:
//! - Single place to collect tunables; everything is passed in at construction time.
//! - Provide a simple VaultBuilder that returns a VaultConfig, which SnapshotManager consumes.
//!
//! Defaults:
//! - storage_root = ./snapshots
//! - max_snapshots = 100 (retention cap, oldest by timestamp are evicted)
//! - compress = true (bodies are written as snapshot_<id>.json.gz)
//! - recent_cycle_limit = 10 (cycle summaries kept per snapshot)
//! - pretty_json = false (compact bodies; the index is always pretty)

use anyhow::{anyhow, Result};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_SNAPSHOTS: usize = 100;
pub const DEFAULT_RECENT_CYCLE_LIMIT: usize = 10;

/// Top-level configuration for a SnapshotManager.
#[derive(Clone, Debug)]
pub struct VaultConfig {
    /// Directory holding snapshot bodies, the index file and its lock.
    pub storage_root: PathBuf,

    /// Retention cap. After every create/cleanup the index holds at most this many entries.
    pub max_snapshots: usize,

    /// Gzip snapshot bodies (`.json.gz`) instead of plain `.json`.
    pub compress: bool,

    /// How many of the most recent cycles are summarised into each snapshot.
    pub recent_cycle_limit: usize,

    /// Pretty-print snapshot bodies. Does not affect the content hash.
    pub pretty_json: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("snapshots"),
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
            compress: true,
            recent_cycle_limit: DEFAULT_RECENT_CYCLE_LIMIT,
            pretty_json: false,
        }
    }
}

impl VaultConfig {
    /// Default configuration rooted at `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            storage_root: root.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Fluent setters (builder-style) to override specific fields.

    pub fn with_storage_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.storage_root = root.as_ref().to_path_buf();
        self
    }

    pub fn with_max_snapshots(mut self, n: usize) -> Self {
        self.max_snapshots = n;
        self
    }

    pub fn with_compress(mut self, on: bool) -> Self {
        self.compress = on;
        self
    }

    pub fn with_recent_cycle_limit(mut self, n: usize) -> Self {
        self.recent_cycle_limit = n;
        self
    }

    pub fn with_pretty_json(mut self, on: bool) -> Self {
        self.pretty_json = on;
        self
    }

    /// Reject values the manager cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_snapshots == 0 {
            return Err(anyhow!("max_snapshots must be >= 1"));
        }
        if self.recent_cycle_limit == 0 {
            return Err(anyhow!("recent_cycle_limit must be >= 1"));
        }
        if self.storage_root.as_os_str().is_empty() {
            return Err(anyhow!("storage_root must not be empty"));
        }
        Ok(())
    }

    /// Finish the builder and obtain the configuration.
    pub fn build(self) -> Self {
        self
    }
}

impl fmt::Display for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VaultConfig {{ \
             storage_root: {}, \
             max_snapshots: {}, \
             compress: {}, \
             recent_cycle_limit: {}, \
             pretty_json: {} \
             }}",
            self.storage_root.display(),
            self.max_snapshots,
            self.compress,
            self.recent_cycle_limit,
            self.pretty_json,
        )
    }
}

/// Lightweight builder that produces a VaultConfig.
/// SnapshotManager exposes `SnapshotManager::builder()` returning this builder.
#[derive(Clone, Debug, Default)]
pub struct VaultBuilder {
    cfg: VaultConfig,
}

impl VaultBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn storage_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.cfg.storage_root = root.as_ref().to_path_buf();
        self
    }

    pub fn max_snapshots(mut self, n: usize) -> Self {
        self.cfg.max_snapshots = n;
        self
    }

    pub fn compress(mut self, on: bool) -> Self {
        self.cfg.compress = on;
        self
    }

    pub fn recent_cycle_limit(mut self, n: usize) -> Self {
        self.cfg.recent_cycle_limit = n;
        self
    }

    pub fn pretty_json(mut self, on: bool) -> Self {
        self.cfg.pretty_json = on;
        self
    }

    /// Finish the builder and obtain the configuration.
    pub fn build(self) -> VaultConfig {
        self.cfg
    }
}
