//! Snapshot data model.
//!
//! - SnapshotRecord: unit of persistence (one body file per record).
//! - SnapshotTag: organizational label, no uniqueness constraint.
//! - SnapshotIndexEntry: summary projection kept in snapshots_index.json.
//! - ComparisonResult: output of ComparisonEngine.
//! - ListFilter: index-only filter used by listing.
//!
//! Maps are BTreeMap so the serialized form has a stable key order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Free-form string-keyed map carried in records (qualia, attention, statistics, metadata).
pub type ValueMap = BTreeMap<String, Value>;

/// Organizational label for a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotTag {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub experiment_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl SnapshotTag {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            description: None,
            experiment_id: None,
            version: None,
        }
    }

    pub fn with_description<S: Into<String>>(mut self, d: S) -> Self {
        self.description = Some(d.into());
        self
    }

    pub fn with_experiment_id<S: Into<String>>(mut self, id: S) -> Self {
        self.experiment_id = Some(id.into());
        self
    }

    pub fn with_version<S: Into<String>>(mut self, v: S) -> Self {
        self.version = Some(v.into());
        self
    }
}

/// Complete point-in-time capture of simulation state.
///
/// `content_hash` is the SHA-256 (lowercase hex) of the canonical JSON of every other field.
/// It is assigned once by the extractor and never recomputed for the same in-memory record.
/// Unknown fields are rejected on load: a mangled key must not silently fall back to a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotRecord {
    pub snapshot_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub tag: Option<SnapshotTag>,

    // Scalar metrics
    pub phi_value: f64,
    pub psi_value: f64,
    pub sigma_value: f64,
    pub integration_level: f64,

    #[serde(default)]
    pub qualia_signature: ValueMap,
    #[serde(default)]
    pub attention_state: ValueMap,

    // Workspace
    #[serde(default)]
    pub workspace_embeddings: BTreeMap<String, Vec<f64>>,
    pub workspace_history_size: u64,
    pub workspace_cycle_count: u64,
    pub workspace_cross_predictions_count: u64,

    // Loop
    pub loop_cycle_count: u64,
    pub loop_total_cycles_executed: u64,
    #[serde(default)]
    pub loop_statistics: ValueMap,
    #[serde(default)]
    pub loop_phi_progression: Vec<f64>,

    // Last executed cycle
    pub last_cycle_phi: f64,
    #[serde(default)]
    pub last_cycle_gozo: Option<f64>,
    #[serde(default)]
    pub last_cycle_delta: Option<f64>,
    #[serde(default)]
    pub last_cycle_control_effectiveness: Option<f64>,
    #[serde(default)]
    pub last_cycle_imagination_shape: Option<Vec<usize>>,

    #[serde(default)]
    pub recent_cycles: Vec<ValueMap>,
    #[serde(default)]
    pub metadata: ValueMap,

    #[serde(default)]
    pub content_hash: Option<String>,
}

impl SnapshotRecord {
    /// Blank record with a fresh id and the current UTC time. All metrics zero, maps empty.
    pub fn empty(tag: Option<SnapshotTag>) -> Self {
        Self {
            snapshot_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            tag,
            phi_value: 0.0,
            psi_value: 0.0,
            sigma_value: 0.0,
            integration_level: 0.0,
            qualia_signature: ValueMap::new(),
            attention_state: ValueMap::new(),
            workspace_embeddings: BTreeMap::new(),
            workspace_history_size: 0,
            workspace_cycle_count: 0,
            workspace_cross_predictions_count: 0,
            loop_cycle_count: 0,
            loop_total_cycles_executed: 0,
            loop_statistics: ValueMap::new(),
            loop_phi_progression: Vec::new(),
            last_cycle_phi: 0.0,
            last_cycle_gozo: None,
            last_cycle_delta: None,
            last_cycle_control_effectiveness: None,
            last_cycle_imagination_shape: None,
            recent_cycles: Vec::new(),
            metadata: ValueMap::new(),
            content_hash: None,
        }
    }

    pub fn tag_name(&self) -> Option<&str> {
        self.tag.as_ref().map(|t| t.name.as_str())
    }

    /// Name of the first float field holding NaN or ±inf, if any.
    ///
    /// JSON has no encoding for those values (serde_json writes `null`), so such a record would
    /// persist but never load again. Free-form maps cannot hold them: `Value` has no NaN.
    pub fn non_finite_field(&self) -> Option<String> {
        let scalars = [
            ("phi_value", self.phi_value),
            ("psi_value", self.psi_value),
            ("sigma_value", self.sigma_value),
            ("integration_level", self.integration_level),
            ("last_cycle_phi", self.last_cycle_phi),
        ];
        if let Some((name, _)) = scalars.iter().find(|(_, v)| !v.is_finite()) {
            return Some(name.to_string());
        }
        let optional = [
            ("last_cycle_gozo", self.last_cycle_gozo),
            ("last_cycle_delta", self.last_cycle_delta),
            (
                "last_cycle_control_effectiveness",
                self.last_cycle_control_effectiveness,
            ),
        ];
        if let Some((name, _)) = optional
            .iter()
            .find(|(_, v)| v.map_or(false, |x| !x.is_finite()))
        {
            return Some(name.to_string());
        }
        if self.loop_phi_progression.iter().any(|x| !x.is_finite()) {
            return Some("loop_phi_progression".to_string());
        }
        self.workspace_embeddings
            .iter()
            .find(|(_, v)| v.iter().any(|x| !x.is_finite()))
            .map(|(k, _)| format!("workspace_embeddings.{k}"))
    }

    /// Index projection of this record.
    pub fn index_entry(&self, size_bytes: u64) -> SnapshotIndexEntry {
        SnapshotIndexEntry {
            snapshot_id: self.snapshot_id.clone(),
            timestamp: self.timestamp,
            tag: self.tag.clone(),
            phi_value: self.phi_value,
            size_bytes,
        }
    }
}

/// Summary row of snapshots_index.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotIndexEntry {
    pub snapshot_id: String,
    pub timestamp: DateTime<Utc>,
    pub tag: Option<SnapshotTag>,
    pub phi_value: f64,
    pub size_bytes: u64,
}

/// Result of comparing two loaded snapshots (record2 relative to record1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub snapshot_id1: String,
    pub snapshot_id2: String,
    pub differences: ValueMap,
    pub metrics_delta: BTreeMap<String, f64>,
    pub embeddings_similarity: BTreeMap<String, f64>,
    pub timestamp: DateTime<Utc>,
}

/// Index-only filter for listing.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Exact match on tag name.
    pub tag: Option<String>,
    /// Inclusive range on snapshot timestamp.
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Maximum number of results (newest first).
    pub limit: Option<usize>,
}

impl ListFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_date_range(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.date_range = Some((from, to));
        self
    }

    pub fn with_limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn matches(&self, e: &SnapshotIndexEntry) -> bool {
        if let Some(want) = &self.tag {
            match &e.tag {
                Some(t) if &t.name == want => {}
                _ => return false,
            }
        }
        if let Some((from, to)) = &self.date_range {
            if e.timestamp < *from || e.timestamp > *to {
                return false;
            }
        }
        true
    }
}
