//! doctor: consistency check between snapshots_index.json and the bodies on disk.
//!
//! Reports:
//! - dangling: index entries whose body file is missing;
//! - orphans: body files without an index entry (e.g. after a failed eviction delete);
//! - corrupt: indexed bodies that do not decode or fail integrity verification.
//!
//! repair() restores "index entry iff body file": dangling entries are dropped and orphan bodies
//! deleted. Corrupt bodies are only reported; deleting evidence is left to the caller.
//! Orphans younger than the grace period (ORPHAN_GRACE by default) are kept: a concurrent
//! writer may not have indexed them yet.

use anyhow::{Context, Result};
use log::{info, warn};
use std::fs;
use std::time::{Duration, SystemTime};

use crate::store::{LoadOutcome, SnapshotIndex, SnapshotStore};

pub const ORPHAN_GRACE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoctorReport {
    pub indexed: usize,
    pub bodies: usize,
    pub dangling: Vec<String>,
    pub orphans: Vec<String>,
    pub corrupt: Vec<String>,
}

impl DoctorReport {
    pub fn is_clean(&self) -> bool {
        self.dangling.is_empty() && self.orphans.is_empty() && self.corrupt.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairSummary {
    pub entries_dropped: usize,
    pub orphans_deleted: usize,
    pub orphans_kept: usize,
}

pub fn check(index: &SnapshotIndex, store: &SnapshotStore) -> Result<DoctorReport> {
    let map = index.load().context("doctor: load index")?;
    let bodies = store.body_ids().context("doctor: scan bodies")?;

    let mut rep = DoctorReport {
        indexed: map.len(),
        bodies: bodies.len(),
        ..DoctorReport::default()
    };

    for id in map.keys() {
        match store.load_checked(id) {
            LoadOutcome::Verified(_) => {}
            LoadOutcome::Missing => rep.dangling.push(id.clone()),
            LoadOutcome::Corrupt(why) => {
                warn!("doctor: {} corrupt: {}", id, why);
                rep.corrupt.push(id.clone());
            }
            LoadOutcome::IntegrityFailed => rep.corrupt.push(id.clone()),
        }
    }
    for id in bodies {
        if !map.contains_key(&id) {
            rep.orphans.push(id);
        }
    }
    Ok(rep)
}

pub fn repair(
    index: &SnapshotIndex,
    store: &SnapshotStore,
    report: &DoctorReport,
) -> Result<RepairSummary> {
    repair_with_grace(index, store, report, ORPHAN_GRACE)
}

pub fn repair_with_grace(
    index: &SnapshotIndex,
    store: &SnapshotStore,
    report: &DoctorReport,
    grace: Duration,
) -> Result<RepairSummary> {
    let mut sum = RepairSummary::default();
    index.mutate(|map| {
        for id in &report.dangling {
            if store.find_body(id).is_none() && map.remove(id).is_some() {
                sum.entries_dropped += 1;
            }
        }
        for id in &report.orphans {
            if map.contains_key(id) {
                continue;
            }
            if is_recent(store, id, grace) {
                sum.orphans_kept += 1;
                continue;
            }
            if store.delete_body(id)? {
                sum.orphans_deleted += 1;
            }
        }
        Ok(())
    })?;
    info!(
        "doctor: repair dropped {} entr(ies), deleted {} orphan(s), kept {} recent",
        sum.entries_dropped, sum.orphans_deleted, sum.orphans_kept
    );
    Ok(sum)
}

fn is_recent(store: &SnapshotStore, id: &str, grace: Duration) -> bool {
    let (path, _) = match store.find_body(id) {
        Some(x) => x,
        None => return false,
    };
    let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(_) => return false,
    };
    SystemTime::now()
        .duration_since(modified)
        .map(|age| age < grace)
        .unwrap_or(true)
}
