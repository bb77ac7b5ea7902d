//! statevault: versioned state snapshots for long-running simulation loops.
//!
//! Capture a host into a content-hashed SnapshotRecord, persist it (optionally gzip) with a
//! lightweight index, enforce a retention cap, and later load (verified), restore or compare.

// Base modules
pub mod config;
pub mod record;
pub mod host;
pub mod metrics;

// Integrity (SHA-256 over canonical JSON)
pub mod integrity;

// Capture: host -> record, phi fallback chain in extract/phi.rs
pub mod extract;

// Persistence: bodies, index, atomic io (src/store/{mod,index,io}.rs)
pub mod store;
pub mod retention;

// Read side
pub mod compare;
pub mod restore;

// Maintenance
pub mod doctor;

// Facade
pub mod manager;

// Convenience re-exports
pub use config::{VaultBuilder, VaultConfig};
pub use manager::{SnapshotManager, StorageStats};
pub use record::{
    ComparisonResult, ListFilter, SnapshotIndexEntry, SnapshotRecord, SnapshotTag, ValueMap,
};
pub use host::{CycleHistory, CycleRecord, LoopStatistics, NumericVector, SnapshotHost, Workspace};
pub use integrity::IntegrityVerifier;
pub use extract::StateExtractor;
pub use compare::{cosine_similarity, ComparisonEngine};
pub use restore::{RestoreEngine, RestoreReport};
pub use retention::RetentionManager;
pub use doctor::{DoctorReport, RepairSummary};
