//! host: capability interfaces the simulation loop may implement.
//!
//! The vault never owns the host. Extraction reads through these traits and restore writes
//! through them; every capability is optional and an absent one degrades to a default:
//! - SnapshotHost::workspace()               -> Workspace (embeddings, history, cycle counter, phi)
//! - SnapshotHost::loop_statistics()         -> LoopStatistics (counters, statistics, phi progression)
//! - SnapshotHost::extended_cycle_history()  -> CycleHistory (preferred)
//! - SnapshotHost::cycle_history()           -> CycleHistory (fallback)
//! - scalar accessors (psi, sigma, integration level, qualia, attention)
//!
//! Embeddings cross the boundary as NumericVector and are normalized to Vec<f64> here, so storage,
//! hashing and comparison never depend on the host's numeric representation.

use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::record::ValueMap;

/// Numeric vector as a host may hold it.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericVector {
    F32(Vec<f32>),
    F64(Vec<f64>),
    /// Row-major tensor; flattened on normalization.
    Tensor { data: Vec<f32>, shape: Vec<usize> },
    /// Loosely typed sequence (e.g. decoded from JSON).
    Values(Vec<Value>),
}

impl NumericVector {
    /// Normalize to an ordered sequence of finite f64.
    ///
    /// Non-finite components become 0.0 (they have no JSON representation).
    /// Returns None when a Values sequence holds a non-numeric item, or when a tensor's
    /// shape does not match its data length.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        let out: Vec<f64> = match self {
            NumericVector::F32(v) => v.iter().map(|&x| x as f64).collect(),
            NumericVector::F64(v) => v.clone(),
            NumericVector::Tensor { data, shape } => {
                let expect: usize = shape.iter().product();
                if !shape.is_empty() && expect != data.len() {
                    return None;
                }
                data.iter().map(|&x| x as f64).collect()
            }
            NumericVector::Values(v) => {
                let mut out = Vec::with_capacity(v.len());
                for x in v {
                    out.push(x.as_f64()?);
                }
                out
            }
        };
        Some(out.into_iter().map(finite_or_zero).collect())
    }

    pub fn len(&self) -> usize {
        match self {
            NumericVector::F32(v) => v.len(),
            NumericVector::F64(v) => v.len(),
            NumericVector::Tensor { data, .. } => data.len(),
            NumericVector::Values(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<f32>> for NumericVector {
    fn from(v: Vec<f32>) -> Self {
        NumericVector::F32(v)
    }
}

impl From<Vec<f64>> for NumericVector {
    fn from(v: Vec<f64>) -> Self {
        NumericVector::F64(v)
    }
}

#[inline]
pub(crate) fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// Shared workspace holding per-module embeddings and cross-module history.
pub trait Workspace {
    fn embeddings(&self) -> BTreeMap<String, NumericVector>;
    fn history_len(&self) -> usize;
    fn cycle_count(&self) -> u64;
    fn cross_predictions_len(&self) -> usize;

    /// Direct integration computation. Hosts return None (or 0.0) before warm-up.
    fn compute_phi(&self) -> Option<f64> {
        None
    }

    fn set_embeddings(&mut self, embeddings: BTreeMap<String, Vec<f64>>) -> Result<()>;
    fn set_cycle_count(&mut self, count: u64) -> Result<()>;
}

/// Loop-level counters and statistics.
pub trait LoopStatistics {
    fn cycle_count(&self) -> u64;
    fn total_cycles_executed(&self) -> u64;

    fn statistics(&self) -> ValueMap {
        ValueMap::new()
    }

    fn phi_progression(&self) -> Vec<f64> {
        Vec::new()
    }

    fn set_cycle_count(&mut self, count: u64) -> Result<()>;
    fn set_total_cycles_executed(&mut self, total: u64) -> Result<()>;
}

/// One executed simulation step.
pub trait CycleRecord {
    fn cycle_number(&self) -> u64;
    fn phi_estimate(&self) -> f64;

    fn success(&self) -> bool {
        true
    }

    fn modules_executed(&self) -> Vec<String> {
        Vec::new()
    }

    fn gozo(&self) -> Option<f64> {
        None
    }

    fn delta(&self) -> Option<f64> {
        None
    }

    fn control_effectiveness(&self) -> Option<f64> {
        None
    }

    /// Shape of the imagination output produced in this cycle, if any.
    fn imagination_shape(&self) -> Option<Vec<usize>> {
        None
    }

    /// Entries that know how to summarise themselves return Some; others get the default summary.
    fn to_summary(&self) -> Option<ValueMap> {
        None
    }
}

/// Ordered cycle history, oldest first.
pub trait CycleHistory {
    fn len(&self) -> usize;

    /// Entry at position `i` (0 = oldest).
    fn get(&self, i: usize) -> Option<&dyn CycleRecord>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn last(&self) -> Option<&dyn CycleRecord> {
        match self.len() {
            0 => None,
            n => self.get(n - 1),
        }
    }

    /// Last `n` entries, oldest first.
    fn recent(&self, n: usize) -> Vec<&dyn CycleRecord> {
        let len = self.len();
        let start = len.saturating_sub(n);
        (start..len).filter_map(|i| self.get(i)).collect()
    }
}

/// A plain vector of cycle records is a history.
impl<T: CycleRecord> CycleHistory for Vec<T> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn get(&self, i: usize) -> Option<&dyn CycleRecord> {
        self.as_slice().get(i).map(|c| c as &dyn CycleRecord)
    }
}

/// The simulation loop as seen by the vault. Every method defaults to "capability absent".
pub trait SnapshotHost {
    fn workspace(&self) -> Option<&dyn Workspace> {
        None
    }

    fn workspace_mut(&mut self) -> Option<&mut dyn Workspace> {
        None
    }

    fn loop_statistics(&self) -> Option<&dyn LoopStatistics> {
        None
    }

    fn loop_statistics_mut(&mut self) -> Option<&mut dyn LoopStatistics> {
        None
    }

    fn extended_cycle_history(&self) -> Option<&dyn CycleHistory> {
        None
    }

    fn cycle_history(&self) -> Option<&dyn CycleHistory> {
        None
    }

    fn psi_value(&self) -> Option<f64> {
        None
    }

    fn sigma_value(&self) -> Option<f64> {
        None
    }

    fn integration_level(&self) -> Option<f64> {
        None
    }

    fn qualia_signature(&self) -> Option<ValueMap> {
        None
    }

    fn attention_state(&self) -> Option<ValueMap> {
        None
    }
}
