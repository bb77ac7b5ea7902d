//! extract/phi: ordered fallback chain resolving the integration value (Φ) of a host.
//!
//! Order (first present value wins):
//! 1. last entry of the extended cycle history, if its estimate is nonzero;
//! 2. last entry of the basic cycle history, if its estimate is nonzero;
//! 3. the workspace's direct integration computation, if it returns nonzero;
//! otherwise 0.0.
//!
//! The last executed cycle is preferred over a workspace-wide recomputation: it is cheaper and
//! defined before the workspace has warmed up.

use log::debug;

use crate::host::SnapshotHost;

/// One link of the chain. Returns None when it has nothing usable to offer.
pub trait PhiResolver {
    fn name(&self) -> &'static str;
    fn resolve(&self, host: &dyn SnapshotHost) -> Option<f64>;
}

pub struct ExtendedHistoryPhi;
pub struct BasicHistoryPhi;
pub struct WorkspacePhi;

impl PhiResolver for ExtendedHistoryPhi {
    fn name(&self) -> &'static str {
        "extended_cycle_history"
    }

    fn resolve(&self, host: &dyn SnapshotHost) -> Option<f64> {
        let last = host.extended_cycle_history()?.last()?;
        usable(last.phi_estimate())
    }
}

impl PhiResolver for BasicHistoryPhi {
    fn name(&self) -> &'static str {
        "cycle_history"
    }

    fn resolve(&self, host: &dyn SnapshotHost) -> Option<f64> {
        let last = host.cycle_history()?.last()?;
        usable(last.phi_estimate())
    }
}

impl PhiResolver for WorkspacePhi {
    fn name(&self) -> &'static str {
        "workspace"
    }

    // The workspace requires a minimum per-module history before this is defined;
    // that is the workspace's concern, the chain only consumes the result.
    fn resolve(&self, host: &dyn SnapshotHost) -> Option<f64> {
        usable(host.workspace()?.compute_phi()?)
    }
}

#[inline]
fn usable(v: f64) -> Option<f64> {
    if v.is_finite() && v != 0.0 {
        Some(v)
    } else {
        None
    }
}

/// Resolved value plus the name of the resolver that produced it ("default" for the fallback).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhiResolution {
    pub value: f64,
    pub source: &'static str,
}

pub struct PhiChain {
    resolvers: Vec<Box<dyn PhiResolver + Send + Sync>>,
}

impl Default for PhiChain {
    fn default() -> Self {
        Self {
            resolvers: vec![
                Box::new(ExtendedHistoryPhi),
                Box::new(BasicHistoryPhi),
                Box::new(WorkspacePhi),
            ],
        }
    }
}

impl PhiChain {
    /// Chain with a custom resolver order.
    pub fn with_resolvers(resolvers: Vec<Box<dyn PhiResolver + Send + Sync>>) -> Self {
        Self { resolvers }
    }

    pub fn resolve(&self, host: &dyn SnapshotHost) -> PhiResolution {
        for r in &self.resolvers {
            if let Some(value) = r.resolve(host) {
                debug!("phi resolved from {}: {}", r.name(), value);
                return PhiResolution {
                    value,
                    source: r.name(),
                };
            }
        }
        debug!("phi unavailable from every source, using 0.0 (usually insufficient history)");
        PhiResolution {
            value: 0.0,
            source: "default",
        }
    }
}
