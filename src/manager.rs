//! manager: SnapshotManager, the only entry point callers use.
//!
//! Capture:  StateExtractor → IntegrityVerifier (seal) → SnapshotStore::save → index upsert
//!           → RetentionManager (victims dropped in the same locked index mutation, bodies after).
//! Read:     index → SnapshotStore::load (verify) → RestoreEngine | ComparisonEngine.
//!
//! Error policy:
//! - create/persist/delete/cleanup/doctor return Result and propagate I/O failures;
//! - load/compare/list/latest never error: absent or unverifiable data is None / empty (logged).

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::time::Duration;

use crate::compare::ComparisonEngine;
use crate::config::{VaultBuilder, VaultConfig};
use crate::doctor::{self, DoctorReport, RepairSummary};
use crate::extract::StateExtractor;
use crate::host::SnapshotHost;
use crate::integrity::IntegrityVerifier;
use crate::metrics;
use crate::record::{
    ComparisonResult, ListFilter, SnapshotIndexEntry, SnapshotRecord, SnapshotTag, ValueMap,
};
use crate::restore::RestoreEngine;
use crate::retention::RetentionManager;
use crate::store::{validate_id, SnapshotIndex, SnapshotStore};

/// Aggregate view of the index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageStats {
    pub snapshot_count: usize,
    pub total_bytes: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

pub struct SnapshotManager {
    cfg: VaultConfig,
    store: SnapshotStore,
    index: SnapshotIndex,
    extractor: StateExtractor,
}

impl SnapshotManager {
    pub fn builder() -> VaultBuilder {
        VaultBuilder::new()
    }

    /// Validate the config and open (or create) the storage root.
    pub fn open(cfg: VaultConfig) -> Result<Self> {
        cfg.validate().context("invalid vault config")?;
        let store = SnapshotStore::open_or_create(&cfg.storage_root, cfg.compress, cfg.pretty_json)
            .context("open snapshot store")?;
        let index = SnapshotIndex::open(&cfg.storage_root);
        let extractor = StateExtractor::new(cfg.recent_cycle_limit);
        info!("snapshot manager opened: {}", cfg);
        Ok(Self {
            cfg,
            store,
            index,
            extractor,
        })
    }

    /// Replace the extractor (e.g. with a custom phi resolver chain).
    pub fn with_extractor(mut self, extractor: StateExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &VaultConfig {
        &self.cfg
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn index(&self) -> &SnapshotIndex {
        &self.index
    }

    // ---------------- capture ----------------

    /// Capture the host, persist and index it, then apply retention. Returns the snapshot id.
    pub fn create_full_snapshot(
        &self,
        host: &dyn SnapshotHost,
        tag: Option<SnapshotTag>,
        metadata: Option<ValueMap>,
    ) -> Result<String> {
        let record = self
            .extractor
            .extract(host, tag, metadata.unwrap_or_default())
            .context("extract snapshot")?;
        self.persist(&record)?;
        Ok(record.snapshot_id)
    }

    /// Persist an already sealed record (body + index entry + retention).
    ///
    /// A record is stored once: an id that already has a body or an index entry is rejected.
    /// If indexing fails the body is removed again, so no body exists without an entry.
    /// Evicted bodies are deleted only after the index without them is on disk.
    pub fn persist(&self, record: &SnapshotRecord) -> Result<()> {
        let id = &record.snapshot_id;
        if let Some(field) = record.non_finite_field() {
            return Err(anyhow!(
                "snapshot {} has a non-finite value in {}, it could not be loaded back",
                id,
                field
            ));
        }
        if !IntegrityVerifier::verify(record) {
            return Err(anyhow!(
                "snapshot {} is unsealed or its content_hash does not match",
                id
            ));
        }
        if self.index.get(id)?.is_some() {
            return Err(anyhow!("snapshot {} is already indexed", id));
        }
        let size = self.store.save(record)?;
        let entry = record.index_entry(size);
        let max = self.cfg.max_snapshots;

        let indexed = self.index.mutate(|map| {
            if map.contains_key(id) {
                return Err(anyhow!("snapshot {} was indexed concurrently", id));
            }
            map.insert(id.clone(), entry);
            Ok(RetentionManager::evict_in(map, max))
        });

        match indexed {
            Ok(evicted) => {
                RetentionManager::delete_evicted(&self.store, &evicted, max);
                metrics::record_snapshot_created();
                info!(
                    "snapshot {} created (phi={:.4}, {} bytes, evicted {})",
                    id,
                    record.phi_value,
                    size,
                    evicted.len()
                );
                Ok(())
            }
            Err(e) => {
                if let Err(de) = self.store.delete_body(id) {
                    error!(
                        "snapshot {}: index update failed and body cleanup failed too: {de:#}",
                        id
                    );
                }
                Err(e).with_context(|| format!("index snapshot {}", id))
            }
        }
    }

    // ---------------- read ----------------

    pub fn load_snapshot(&self, id: &str) -> Option<SnapshotRecord> {
        self.store.load(id)
    }

    /// Load and verify without keeping the record.
    pub fn verify_snapshot(&self, id: &str) -> bool {
        self.store.load_checked(id).is_verified()
    }

    /// Restore a snapshot onto the host. false if the snapshot is unusable or a write failed.
    pub fn restore_full_snapshot(&self, id: &str, host: &mut dyn SnapshotHost) -> bool {
        match self.store.load(id) {
            Some(r) => RestoreEngine::restore(&r, host),
            None => {
                error!("restore: snapshot {} unavailable, host untouched", id);
                metrics::record_restore(false);
                false
            }
        }
    }

    /// Compare two snapshots (second relative to first).
    pub fn compare_snapshots(&self, id1: &str, id2: &str) -> Option<ComparisonResult> {
        let first = self.store.load(id1);
        let second = self.store.load(id2);
        match (first, second) {
            (Some(a), Some(b)) => {
                metrics::record_comparison();
                Some(ComparisonEngine::compare(&a, &b))
            }
            _ => {
                error!(
                    "compare: snapshot {} or {} missing or unverifiable",
                    id1, id2
                );
                None
            }
        }
    }

    /// Index entries passing the filter, newest first. Bodies are not read.
    pub fn list_index(&self, filter: &ListFilter) -> Vec<SnapshotIndexEntry> {
        match self.index.list(filter) {
            Ok(v) => v,
            Err(e) => {
                error!("list: index unreadable: {e:#}");
                Vec::new()
            }
        }
    }

    /// Full records for the entries passing the filter. Unverifiable bodies are skipped.
    pub fn list_snapshots(&self, filter: &ListFilter) -> Vec<SnapshotRecord> {
        self.list_index(filter)
            .iter()
            .filter_map(|e| self.store.load(&e.snapshot_id))
            .collect()
    }

    /// Newest snapshot (by timestamp) that loads and verifies.
    pub fn latest_snapshot(&self) -> Option<SnapshotRecord> {
        self.list_index(&ListFilter::all())
            .iter()
            .find_map(|e| self.store.load(&e.snapshot_id))
    }

    pub fn storage_stats(&self) -> StorageStats {
        let entries = self.list_index(&ListFilter::all());
        StorageStats {
            snapshot_count: entries.len(),
            total_bytes: entries.iter().map(|e| e.size_bytes).sum(),
            newest: entries.first().map(|e| e.timestamp),
            oldest: entries.last().map(|e| e.timestamp),
        }
    }

    // ---------------- removal ----------------

    /// Delete body and index entry. Ok(false) if the id was unknown.
    ///
    /// The entry goes first; a body left behind by a failed delete is an orphan for doctor().
    pub fn delete_snapshot(&self, id: &str) -> Result<bool> {
        validate_id(id)?;
        let had_entry = self.index.mutate(|map| Ok(map.remove(id).is_some()))?;
        let had_body = self
            .store
            .delete_body(id)
            .with_context(|| format!("delete body of snapshot {}", id))?;
        if had_body != had_entry {
            warn!(
                "delete: snapshot {} had body={} entry={}",
                id, had_body, had_entry
            );
        }
        let existed = had_body || had_entry;
        if existed {
            metrics::record_deleted();
            info!("snapshot {} deleted", id);
        }
        Ok(existed)
    }

    /// Explicit retention pass. Returns the number of evicted snapshots.
    pub fn cleanup_old_snapshots(&self) -> Result<usize> {
        let evicted = RetentionManager::enforce(&self.index, &self.store, self.cfg.max_snapshots)?;
        Ok(evicted.len())
    }

    // ---------------- maintenance ----------------

    pub fn doctor(&self) -> Result<DoctorReport> {
        doctor::check(&self.index, &self.store)
    }

    pub fn repair(&self, report: &DoctorReport) -> Result<RepairSummary> {
        doctor::repair(&self.index, &self.store, report)
    }

    pub fn repair_with_grace(&self, report: &DoctorReport, grace: Duration) -> Result<RepairSummary> {
        doctor::repair_with_grace(&self.index, &self.store, report, grace)
    }
}
