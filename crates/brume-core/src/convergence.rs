//! Per-module convergence bookkeeping owned by the orchestrator.

use indexmap::IndexMap;

use crate::id::ZoneId;
use crate::kind::ModuleKind;

/// Table of "converged this outer step" flags keyed by zone and module.
///
/// The outer driver owns the table and lends it mutably through the
/// execution context, so no controller carries convergence state of its
/// own. Flags are cleared whenever the governing equations are re-solved:
/// on dual-time updates, before each load increment, and after a
/// multizone steady output.
#[derive(Debug, Default, Clone)]
pub struct ConvergenceTable {
    flags: IndexMap<(ZoneId, ModuleKind), bool>,
}

impl ConvergenceTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record whether a module converged this outer step.
    pub fn set(&mut self, zone: ZoneId, kind: ModuleKind, converged: bool) {
        self.flags.insert((zone, kind), converged);
    }

    /// Whether a module is marked converged. Unknown modules are not.
    pub fn is_converged(&self, zone: ZoneId, kind: ModuleKind) -> bool {
        self.flags.get(&(zone, kind)).copied().unwrap_or(false)
    }

    /// Whether every tracked module of a zone is converged.
    ///
    /// A zone with no tracked modules is not converged; an empty table
    /// must never read as a finished solve.
    pub fn zone_converged(&self, zone: ZoneId) -> bool {
        let mut seen = false;
        for (&(z, _), &flag) in &self.flags {
            if z == zone {
                seen = true;
                if !flag {
                    return false;
                }
            }
        }
        seen
    }

    /// Clear every flag belonging to one zone.
    pub fn clear_zone(&mut self, zone: ZoneId) {
        for (&(z, _), flag) in self.flags.iter_mut() {
            if z == zone {
                *flag = false;
            }
        }
    }

    /// Clear every flag in the table.
    pub fn clear_all(&mut self) {
        for flag in self.flags.values_mut() {
            *flag = false;
        }
    }

    /// Number of tracked (zone, module) pairs.
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Whether the table tracks nothing yet.
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}
