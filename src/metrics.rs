//! Lightweight global metrics for the snapshot vault.
//!
//! Thread-safe atomic counters, process-wide:
//! - Capture (snapshots created, body bytes written)
//! - Load (ok / missing / corrupt / integrity failures)
//! - Retention (evictions, explicit deletes)
//! - Restore / Compare

use std::sync::atomic::{AtomicU64, Ordering};

// ----- Capture -----
static SNAPSHOTS_CREATED: AtomicU64 = AtomicU64::new(0);
static BODIES_WRITTEN: AtomicU64 = AtomicU64::new(0);
static BODY_BYTES_WRITTEN: AtomicU64 = AtomicU64::new(0);

// ----- Load -----
static LOADS_OK: AtomicU64 = AtomicU64::new(0);
static LOADS_MISSING: AtomicU64 = AtomicU64::new(0);
static LOADS_CORRUPT: AtomicU64 = AtomicU64::new(0);
static INTEGRITY_FAILURES: AtomicU64 = AtomicU64::new(0);

// ----- Retention / delete -----
static SNAPSHOTS_EVICTED: AtomicU64 = AtomicU64::new(0);
static SNAPSHOTS_DELETED: AtomicU64 = AtomicU64::new(0);

// ----- Restore / Compare -----
static RESTORES_OK: AtomicU64 = AtomicU64::new(0);
static RESTORES_FAILED: AtomicU64 = AtomicU64::new(0);
static COMPARISONS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub snapshots_created: u64,
    pub bodies_written: u64,
    pub body_bytes_written: u64,

    pub loads_ok: u64,
    pub loads_missing: u64,
    pub loads_corrupt: u64,
    pub integrity_failures: u64,

    pub snapshots_evicted: u64,
    pub snapshots_deleted: u64,

    pub restores_ok: u64,
    pub restores_failed: u64,
    pub comparisons: u64,
}

impl MetricsSnapshot {
    pub fn avg_body_bytes(&self) -> f64 {
        if self.bodies_written == 0 {
            0.0
        } else {
            self.body_bytes_written as f64 / self.bodies_written as f64
        }
    }

    /// Share of load attempts that returned a verified record.
    pub fn load_success_ratio(&self) -> f64 {
        let total = self.loads_ok + self.loads_missing + self.loads_corrupt + self.integrity_failures;
        if total == 0 {
            0.0
        } else {
            self.loads_ok as f64 / total as f64
        }
    }
}

// ----- Recorders -----
pub fn record_snapshot_created() {
    SNAPSHOTS_CREATED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_snapshot_written(bytes: usize) {
    BODIES_WRITTEN.fetch_add(1, Ordering::Relaxed);
    BODY_BYTES_WRITTEN.fetch_add(bytes as u64, Ordering::Relaxed);
}

pub fn record_load_ok() {
    LOADS_OK.fetch_add(1, Ordering::Relaxed);
}

pub fn record_load_missing() {
    LOADS_MISSING.fetch_add(1, Ordering::Relaxed);
}

pub fn record_load_corrupt() {
    LOADS_CORRUPT.fetch_add(1, Ordering::Relaxed);
}

pub fn record_integrity_failure() {
    INTEGRITY_FAILURES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_evicted(n: usize) {
    SNAPSHOTS_EVICTED.fetch_add(n as u64, Ordering::Relaxed);
}

pub fn record_deleted() {
    SNAPSHOTS_DELETED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_restore(ok: bool) {
    if ok {
        RESTORES_OK.fetch_add(1, Ordering::Relaxed);
    } else {
        RESTORES_FAILED.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn record_comparison() {
    COMPARISONS.fetch_add(1, Ordering::Relaxed);
}

// ----- Snapshot / Reset -----
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        snapshots_created: SNAPSHOTS_CREATED.load(Ordering::Relaxed),
        bodies_written: BODIES_WRITTEN.load(Ordering::Relaxed),
        body_bytes_written: BODY_BYTES_WRITTEN.load(Ordering::Relaxed),

        loads_ok: LOADS_OK.load(Ordering::Relaxed),
        loads_missing: LOADS_MISSING.load(Ordering::Relaxed),
        loads_corrupt: LOADS_CORRUPT.load(Ordering::Relaxed),
        integrity_failures: INTEGRITY_FAILURES.load(Ordering::Relaxed),

        snapshots_evicted: SNAPSHOTS_EVICTED.load(Ordering::Relaxed),
        snapshots_deleted: SNAPSHOTS_DELETED.load(Ordering::Relaxed),

        restores_ok: RESTORES_OK.load(Ordering::Relaxed),
        restores_failed: RESTORES_FAILED.load(Ordering::Relaxed),
        comparisons: COMPARISONS.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    SNAPSHOTS_CREATED.store(0, Ordering::Relaxed);
    BODIES_WRITTEN.store(0, Ordering::Relaxed);
    BODY_BYTES_WRITTEN.store(0, Ordering::Relaxed);

    LOADS_OK.store(0, Ordering::Relaxed);
    LOADS_MISSING.store(0, Ordering::Relaxed);
    LOADS_CORRUPT.store(0, Ordering::Relaxed);
    INTEGRITY_FAILURES.store(0, Ordering::Relaxed);

    SNAPSHOTS_EVICTED.store(0, Ordering::Relaxed);
    SNAPSHOTS_DELETED.store(0, Ordering::Relaxed);

    RESTORES_OK.store(0, Ordering::Relaxed);
    RESTORES_FAILED.store(0, Ordering::Relaxed);
    COMPARISONS.store(0, Ordering::Relaxed);
}
