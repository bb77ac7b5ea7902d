// Shared test fixtures: temp roots, logger, and a configurable simulation host.
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use statevault::{
    CycleHistory, CycleRecord, LoopStatistics, NumericVector, SnapshotHost, ValueMap, Workspace,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("svtest-{prefix}-{pid}-{t}-{id}"))
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ---------- host ----------

#[derive(Debug, Clone)]
pub struct Cycle {
    pub number: u64,
    pub phi: f64,
    pub gozo: Option<f64>,
    pub imagination: Option<Vec<usize>>,
}

impl Cycle {
    pub fn new(number: u64, phi: f64) -> Self {
        Self {
            number,
            phi,
            gozo: None,
            imagination: None,
        }
    }
}

impl CycleRecord for Cycle {
    fn cycle_number(&self) -> u64 {
        self.number
    }
    fn phi_estimate(&self) -> f64 {
        self.phi
    }
    fn modules_executed(&self) -> Vec<String> {
        vec!["visual".into(), "motor".into()]
    }
    fn gozo(&self) -> Option<f64> {
        self.gozo
    }
    fn imagination_shape(&self) -> Option<Vec<usize>> {
        self.imagination.clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeWorkspace {
    pub embeddings: BTreeMap<String, NumericVector>,
    pub history: usize,
    pub cycles: u64,
    pub cross_predictions: usize,
    pub phi: Option<f64>,
    pub fail_set_cycle_count: bool,
}

impl Workspace for FakeWorkspace {
    fn embeddings(&self) -> BTreeMap<String, NumericVector> {
        self.embeddings.clone()
    }
    fn history_len(&self) -> usize {
        self.history
    }
    fn cycle_count(&self) -> u64 {
        self.cycles
    }
    fn cross_predictions_len(&self) -> usize {
        self.cross_predictions
    }
    fn compute_phi(&self) -> Option<f64> {
        self.phi
    }
    fn set_embeddings(&mut self, embeddings: BTreeMap<String, Vec<f64>>) -> Result<()> {
        self.embeddings = embeddings
            .into_iter()
            .map(|(k, v)| (k, NumericVector::F64(v)))
            .collect();
        Ok(())
    }
    fn set_cycle_count(&mut self, count: u64) -> Result<()> {
        if self.fail_set_cycle_count {
            return Err(anyhow!("workspace cycle counter is read-only"));
        }
        self.cycles = count;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeLoop {
    pub cycles: u64,
    pub total: u64,
    pub progression: Vec<f64>,
    pub fail_set_total: bool,
}

impl LoopStatistics for FakeLoop {
    fn cycle_count(&self) -> u64 {
        self.cycles
    }
    fn total_cycles_executed(&self) -> u64 {
        self.total
    }
    fn statistics(&self) -> ValueMap {
        let mut m = ValueMap::new();
        m.insert("avg_phi".into(), Value::from(0.25));
        m.insert("cycles".into(), Value::from(self.cycles));
        m
    }
    fn phi_progression(&self) -> Vec<f64> {
        self.progression.clone()
    }
    fn set_cycle_count(&mut self, count: u64) -> Result<()> {
        self.cycles = count;
        Ok(())
    }
    fn set_total_cycles_executed(&mut self, total: u64) -> Result<()> {
        if self.fail_set_total {
            return Err(anyhow!("total counter locked"));
        }
        self.total = total;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeHost {
    pub workspace: Option<FakeWorkspace>,
    pub looop: Option<FakeLoop>,
    pub extended: Option<Vec<Cycle>>,
    pub basic: Option<Vec<Cycle>>,
    pub psi: Option<f64>,
}

impl SnapshotHost for FakeHost {
    fn workspace(&self) -> Option<&dyn Workspace> {
        self.workspace.as_ref().map(|w| w as &dyn Workspace)
    }
    fn workspace_mut(&mut self) -> Option<&mut dyn Workspace> {
        self.workspace.as_mut().map(|w| w as &mut dyn Workspace)
    }
    fn loop_statistics(&self) -> Option<&dyn LoopStatistics> {
        self.looop.as_ref().map(|l| l as &dyn LoopStatistics)
    }
    fn loop_statistics_mut(&mut self) -> Option<&mut dyn LoopStatistics> {
        self.looop.as_mut().map(|l| l as &mut dyn LoopStatistics)
    }
    fn extended_cycle_history(&self) -> Option<&dyn CycleHistory> {
        self.extended.as_ref().map(|h| h as &dyn CycleHistory)
    }
    fn cycle_history(&self) -> Option<&dyn CycleHistory> {
        self.basic.as_ref().map(|h| h as &dyn CycleHistory)
    }
    fn psi_value(&self) -> Option<f64> {
        self.psi
    }
}

/// Host exposing every capability, with phi coming from the extended history.
pub fn full_host(phi: f64) -> FakeHost {
    let mut embeddings = BTreeMap::new();
    embeddings.insert("visual".to_string(), NumericVector::F32(vec![0.5, 0.25, 1.0]));
    embeddings.insert(
        "motor".to_string(),
        NumericVector::Tensor {
            data: vec![1.0, 0.0, 0.0, 1.0],
            shape: vec![2, 2],
        },
    );
    FakeHost {
        workspace: Some(FakeWorkspace {
            embeddings,
            history: 12,
            cycles: 40,
            cross_predictions: 3,
            phi: Some(0.9),
            fail_set_cycle_count: false,
        }),
        looop: Some(FakeLoop {
            cycles: 41,
            total: 41,
            progression: vec![0.1, 0.2, phi],
            fail_set_total: false,
        }),
        extended: Some((0..15).map(|i| Cycle::new(i, if i == 14 { phi } else { 0.1 })).collect()),
        basic: None,
        psi: Some(0.5),
    }
}
