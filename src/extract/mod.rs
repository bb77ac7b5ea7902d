//! extract: builds a normalized SnapshotRecord from a SnapshotHost.
//!
//! Every read goes through a capability; an absent capability yields its default
//! (0 / 0.0 / empty map / empty sequence) and is logged at debug level, never raised.
//! The content hash is assigned last, after every field (including metadata) is final.

pub mod phi;

use anyhow::{Context, Result};
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::DEFAULT_RECENT_CYCLE_LIMIT;
use crate::host::{finite_or_zero, CycleHistory, CycleRecord, SnapshotHost};
use crate::integrity::IntegrityVerifier;
use crate::record::{SnapshotRecord, SnapshotTag, ValueMap};

pub use phi::{PhiChain, PhiResolution, PhiResolver};

/// Metadata key recording which resolver produced phi_value.
pub const META_PHI_SOURCE: &str = "phi_source";

pub struct StateExtractor {
    phi: PhiChain,
    recent_cycle_limit: usize,
}

impl Default for StateExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_CYCLE_LIMIT)
    }
}

impl StateExtractor {
    pub fn new(recent_cycle_limit: usize) -> Self {
        Self {
            phi: PhiChain::default(),
            recent_cycle_limit,
        }
    }

    pub fn with_phi_chain(mut self, chain: PhiChain) -> Self {
        self.phi = chain;
        self
    }

    pub fn recent_cycle_limit(&self) -> usize {
        self.recent_cycle_limit
    }

    /// Capture the host into a sealed record (content_hash set).
    pub fn extract(
        &self,
        host: &dyn SnapshotHost,
        tag: Option<SnapshotTag>,
        metadata: ValueMap,
    ) -> Result<SnapshotRecord> {
        let mut r = SnapshotRecord::empty(tag);

        let phi = self.phi.resolve(host);
        r.phi_value = phi.value;
        r.psi_value = host.psi_value().map(finite_or_zero).unwrap_or(0.0);
        r.sigma_value = host.sigma_value().map(finite_or_zero).unwrap_or(0.0);
        r.integration_level = host.integration_level().map(finite_or_zero).unwrap_or(0.0);
        r.qualia_signature = host.qualia_signature().unwrap_or_default();
        r.attention_state = host.attention_state().unwrap_or_default();

        self.extract_workspace(host, &mut r);
        self.extract_loop(host, &mut r);
        self.extract_cycles(host, &mut r);

        r.metadata = metadata;
        r.metadata
            .insert(META_PHI_SOURCE.to_string(), Value::from(phi.source));

        IntegrityVerifier::seal(&mut r)
            .with_context(|| format!("seal snapshot {}", r.snapshot_id))?;
        Ok(r)
    }

    fn extract_workspace(&self, host: &dyn SnapshotHost, r: &mut SnapshotRecord) {
        let ws = match host.workspace() {
            Some(ws) => ws,
            None => {
                debug!("extract: host has no workspace, embeddings and counters default");
                return;
            }
        };

        let mut out = BTreeMap::new();
        for (name, v) in ws.embeddings() {
            match v.to_f64_vec() {
                Some(vec) => {
                    out.insert(name, vec);
                }
                None => debug!("extract: embedding '{}' is not numeric, skipped", name),
            }
        }
        r.workspace_embeddings = out;
        r.workspace_history_size = ws.history_len() as u64;
        r.workspace_cycle_count = ws.cycle_count();
        r.workspace_cross_predictions_count = ws.cross_predictions_len() as u64;
    }

    fn extract_loop(&self, host: &dyn SnapshotHost, r: &mut SnapshotRecord) {
        let ls = match host.loop_statistics() {
            Some(ls) => ls,
            None => {
                debug!("extract: host has no loop statistics");
                return;
            }
        };
        r.loop_cycle_count = ls.cycle_count();
        r.loop_total_cycles_executed = ls.total_cycles_executed();
        r.loop_statistics = ls.statistics();
        r.loop_phi_progression = ls
            .phi_progression()
            .into_iter()
            .map(finite_or_zero)
            .collect();
    }

    fn extract_cycles(&self, host: &dyn SnapshotHost, r: &mut SnapshotRecord) {
        let history = match active_history(host) {
            Some(h) => h,
            None => {
                debug!("extract: host has no cycle history");
                return;
            }
        };

        if let Some(last) = history.last() {
            r.last_cycle_phi = finite_or_zero(last.phi_estimate());
            r.last_cycle_gozo = last.gozo().filter(|x| x.is_finite());
            r.last_cycle_delta = last.delta().filter(|x| x.is_finite());
            r.last_cycle_control_effectiveness =
                last.control_effectiveness().filter(|x| x.is_finite());
            r.last_cycle_imagination_shape = last.imagination_shape();
        }

        r.recent_cycles = history
            .recent(self.recent_cycle_limit)
            .into_iter()
            .map(cycle_summary)
            .collect();
    }
}

/// Extended history if present and non-empty, else the basic one.
fn active_history(host: &dyn SnapshotHost) -> Option<&dyn CycleHistory> {
    match host.extended_cycle_history() {
        Some(h) if !h.is_empty() => Some(h),
        _ => host.cycle_history().filter(|h| !h.is_empty()),
    }
}

/// Plain summary map for one cycle.
pub fn cycle_summary(c: &dyn CycleRecord) -> ValueMap {
    if let Some(m) = c.to_summary() {
        return m;
    }
    let mut m = ValueMap::new();
    m.insert("cycle_number".into(), Value::from(c.cycle_number()));
    m.insert(
        "phi_estimate".into(),
        Value::from(finite_or_zero(c.phi_estimate())),
    );
    m.insert("success".into(), Value::from(c.success()));
    m.insert(
        "modules_executed".into(),
        Value::from(c.modules_executed()),
    );
    m
}
