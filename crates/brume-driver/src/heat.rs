//! Thermal iteration for zones solving heat conduction alone.

use brume_physics::{SolveContext, StepReport, ZoneSet};

use crate::controller::{IterationController, MonitorRecord, SolveError};

/// Controller for solid zones whose primary system is the heat
/// equation. Iteration is the trait default: a single step of the
/// primary system, with no coupled secondaries.
pub struct HeatController {
    threshold: f64,
    records: Vec<MonitorRecord>,
}

impl HeatController {
    /// Controller converging when `log10` of the heat residual drops
    /// below `threshold`.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            records: Vec::new(),
        }
    }
}

impl IterationController for HeatController {
    fn name(&self) -> &str {
        "heat"
    }

    fn records(&self) -> &[MonitorRecord] {
        &self.records
    }

    fn monitor(
        &mut self,
        zone: &mut ZoneSet,
        ctx: &mut SolveContext<'_>,
        report: &StepReport,
    ) -> bool {
        let converged = report.residual.max(f64::MIN_POSITIVE).log10() < self.threshold;
        ctx.convergence_mut()
            .set(zone.key().zone, zone.primary_kind(), converged);
        self.records.push(MonitorRecord {
            time_iter: ctx.clock().time_iter(),
            outer_iter: ctx.clock().outer_iter(),
            inner_iter: ctx.clock().inner_iter(),
            residual: report.residual,
            converged,
        });
        converged
    }
}
