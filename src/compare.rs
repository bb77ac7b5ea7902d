//! compare: scalar deltas and embedding-space similarity between two snapshots.
//!
//! - metrics_delta[m] = second.m - first.m (antisymmetric).
//! - embeddings_similarity: cosine over modules present in both records only. Vectors of
//!   different length are skipped (logged), never scored.
//! - differences: cycle-count deltas, embedding-map size delta, modules present on one side only,
//!   and elapsed seconds between the two records' own timestamps.

use chrono::Utc;
use log::warn;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::record::{ComparisonResult, SnapshotRecord, ValueMap};

/// Guards the cosine denominator against zero-norm vectors.
pub const COSINE_EPS: f64 = 1e-8;

/// Scalar metrics tracked in metrics_delta, in key order.
pub const TRACKED_METRICS: [&str; 4] = ["integration_level", "phi", "psi", "sigma"];

fn metric(r: &SnapshotRecord, name: &str) -> f64 {
    match name {
        "phi" => r.phi_value,
        "psi" => r.psi_value,
        "sigma" => r.sigma_value,
        "integration_level" => r.integration_level,
        _ => 0.0,
    }
}

/// dot(a,b) / (|a|·|b| + ε), clamped to [-1, 1]. None when lengths differ.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    let mut dot = 0.0;
    let mut na = 0.0;
    let mut nb = 0.0;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    let s = dot / (na.sqrt() * nb.sqrt() + COSINE_EPS);
    Some(s.clamp(-1.0, 1.0))
}

pub struct ComparisonEngine;

impl ComparisonEngine {
    pub fn compare(first: &SnapshotRecord, second: &SnapshotRecord) -> ComparisonResult {
        let metrics_delta: BTreeMap<String, f64> = TRACKED_METRICS
            .iter()
            .map(|m| (m.to_string(), metric(second, m) - metric(first, m)))
            .collect();

        let mut embeddings_similarity = BTreeMap::new();
        let mut only_first = Vec::new();
        for (name, e1) in &first.workspace_embeddings {
            match second.workspace_embeddings.get(name) {
                Some(e2) => match cosine_similarity(e1, e2) {
                    Some(s) => {
                        embeddings_similarity.insert(name.clone(), s);
                    }
                    None => warn!(
                        "compare: embedding '{}' has length {} vs {}, skipped",
                        name,
                        e1.len(),
                        e2.len()
                    ),
                },
                None => only_first.push(name.clone()),
            }
        }
        let only_second: Vec<String> = second
            .workspace_embeddings
            .keys()
            .filter(|k| !first.workspace_embeddings.contains_key(*k))
            .cloned()
            .collect();

        let elapsed = second.timestamp - first.timestamp;
        let elapsed_secs = elapsed
            .num_microseconds()
            .map(|us| us as f64 / 1e6)
            .unwrap_or_else(|| elapsed.num_seconds() as f64);

        let mut differences = ValueMap::new();
        differences.insert(
            "loop_cycle_count_delta".into(),
            Value::from(second.loop_cycle_count as i64 - first.loop_cycle_count as i64),
        );
        differences.insert(
            "workspace_cycle_count_delta".into(),
            Value::from(second.workspace_cycle_count as i64 - first.workspace_cycle_count as i64),
        );
        differences.insert(
            "embedding_modules_delta".into(),
            Value::from(
                second.workspace_embeddings.len() as i64 - first.workspace_embeddings.len() as i64,
            ),
        );
        differences.insert("elapsed_seconds".into(), Value::from(elapsed_secs));
        differences.insert("modules_only_in_first".into(), Value::from(only_first));
        differences.insert("modules_only_in_second".into(), Value::from(only_second));

        ComparisonResult {
            snapshot_id1: first.snapshot_id.clone(),
            snapshot_id2: second.snapshot_id.clone(),
            differences,
            metrics_delta,
            embeddings_similarity,
            timestamp: Utc::now(),
        }
    }
}
