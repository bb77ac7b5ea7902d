//! restore: best-effort write-back of a loaded snapshot onto a host.
//!
//! Steps, each only if the host exposes the capability:
//! 1. workspace embeddings, 2. workspace cycle counter,
//! 3. loop cycle counter, 4. loop total-cycles counter.
//!
//! Not transactional. A failure after step 1 leaves the host partially restored; the error is
//! logged with the snapshot id and the steps already applied, and restore() returns false.
//! Callers must treat false as "host state of unknown provenance".

use anyhow::{Context, Result};
use log::{debug, error, info};

use crate::host::SnapshotHost;
use crate::metrics;
use crate::record::SnapshotRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub workspace_restored: bool,
    pub loop_restored: bool,
    /// Steps applied, in order.
    pub steps: Vec<&'static str>,
}

pub struct RestoreEngine;

impl RestoreEngine {
    pub fn restore(record: &SnapshotRecord, host: &mut dyn SnapshotHost) -> bool {
        let mut report = RestoreReport::default();
        let res = Self::apply(record, host, &mut report);
        metrics::record_restore(res.is_ok());
        match res {
            Ok(()) => {
                info!(
                    "restore: snapshot {} applied (workspace={}, loop={})",
                    record.snapshot_id, report.workspace_restored, report.loop_restored
                );
                true
            }
            Err(e) => {
                error!(
                    "restore: snapshot {} failed after steps [{}], host is partially restored: {e:#}",
                    record.snapshot_id,
                    report.steps.join(", ")
                );
                false
            }
        }
    }

    /// Same steps as restore(), returning the report or the first error.
    pub fn try_restore(record: &SnapshotRecord, host: &mut dyn SnapshotHost) -> Result<RestoreReport> {
        let mut report = RestoreReport::default();
        let res = Self::apply(record, host, &mut report);
        metrics::record_restore(res.is_ok());
        res.map(|()| report)
    }

    fn apply(
        record: &SnapshotRecord,
        host: &mut dyn SnapshotHost,
        report: &mut RestoreReport,
    ) -> Result<()> {
        match host.workspace_mut() {
            Some(ws) => {
                ws.set_embeddings(record.workspace_embeddings.clone())
                    .context("set workspace embeddings")?;
                report.steps.push("workspace_embeddings");
                ws.set_cycle_count(record.workspace_cycle_count)
                    .context("set workspace cycle count")?;
                report.steps.push("workspace_cycle_count");
                report.workspace_restored = true;
            }
            None => debug!("restore: host has no workspace, skipped"),
        }

        match host.loop_statistics_mut() {
            Some(ls) => {
                ls.set_cycle_count(record.loop_cycle_count)
                    .context("set loop cycle count")?;
                report.steps.push("loop_cycle_count");
                ls.set_total_cycles_executed(record.loop_total_cycles_executed)
                    .context("set loop total cycles executed")?;
                report.steps.push("loop_total_cycles_executed");
                report.loop_restored = true;
            }
            None => debug!("restore: host has no loop statistics, skipped"),
        }
        Ok(())
    }
}
