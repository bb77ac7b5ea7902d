//! retention: keep at most `max_snapshots` entries, evicting the oldest by timestamp.
//!
//! Victims are chosen and dropped inside one locked index mutation; their bodies are deleted only
//! once the rewritten index is on disk. A failed index write therefore loses nothing, and a failed
//! body deletion leaves an orphan for doctor() instead of an entry without a body.

use anyhow::Result;
use log::{info, warn};

use crate::metrics;
use crate::store::{IndexMap, SnapshotIndex, SnapshotStore};

pub struct RetentionManager;

impl RetentionManager {
    /// Ids that must go so that `map.len() <= max`, oldest first. Ties break on id.
    pub fn select_evictions(map: &IndexMap, max: usize) -> Vec<String> {
        if map.len() <= max {
            return Vec::new();
        }
        let mut by_age: Vec<_> = map.values().collect();
        by_age.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.snapshot_id.cmp(&b.snapshot_id))
        });
        by_age
            .into_iter()
            .take(map.len() - max)
            .map(|e| e.snapshot_id.clone())
            .collect()
    }

    /// Apply the cap against the index as it is now. Returns evicted ids.
    pub fn enforce(index: &SnapshotIndex, store: &SnapshotStore, max: usize) -> Result<Vec<String>> {
        let victims = index.mutate(|map| Ok(Self::evict_in(map, max)))?;
        Self::delete_evicted(store, &victims, max);
        Ok(victims)
    }

    /// Drop the over-cap entries from an already-locked map. Bodies are untouched: they go only
    /// after the index without them is on disk (see delete_evicted).
    pub(crate) fn evict_in(map: &mut IndexMap, max: usize) -> Vec<String> {
        let victims = Self::select_evictions(map, max);
        for id in &victims {
            map.remove(id);
        }
        victims
    }

    /// Delete the bodies of entries already removed from the persisted index.
    pub(crate) fn delete_evicted(store: &SnapshotStore, victims: &[String], max: usize) {
        if victims.is_empty() {
            return;
        }
        for id in victims {
            match store.delete_body(id) {
                Ok(true) => {}
                Ok(false) => warn!("retention: body for {} already gone", id),
                Err(e) => warn!("retention: could not delete body for {}: {e:#}", id),
            }
        }
        metrics::record_evicted(victims.len());
        info!(
            "retention: evicted {} snapshot(s) (cap {})",
            victims.len(),
            max
        );
    }
}
