//! Fluid iteration: flow plus its coupled secondary systems.

use brume_core::ModuleKind;
use brume_physics::{SolveContext, StepReport, ZoneSet};

use crate::controller::{IterationController, MonitorRecord, SolveError};

/// Secondary systems refreshed and stepped after the flow solve, in
/// dependency order: turbulence closes the flow equations, heat and
/// radiation read flow and each other one level deep.
pub(crate) const COUPLED_ORDER: [ModuleKind; 3] = [
    ModuleKind::Turbulence,
    ModuleKind::Heat,
    ModuleKind::Radiation,
];

/// Controller for zones whose primary system is a flow solver.
pub struct FluidController {
    threshold: f64,
    records: Vec<MonitorRecord>,
}

impl FluidController {
    /// Controller converging when `log10` of the flow residual drops
    /// below `threshold`.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            records: Vec::new(),
        }
    }

    /// The configured `log10` convergence threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl IterationController for FluidController {
    fn name(&self) -> &str {
        "fluid"
    }

    fn records(&self) -> &[MonitorRecord] {
        &self.records
    }

    fn iterate(
        &mut self,
        zone: &mut ZoneSet,
        ctx: &mut SolveContext<'_>,
    ) -> Result<StepReport, SolveError> {
        let report = zone.step(ModuleKind::Flow, ctx)?;
        for kind in COUPLED_ORDER {
            if zone.contains(kind) {
                zone.refresh(kind, ctx)?;
                zone.step(kind, ctx)?;
            }
        }
        Ok(report)
    }

    fn monitor(
        &mut self,
        zone: &mut ZoneSet,
        ctx: &mut SolveContext<'_>,
        report: &StepReport,
    ) -> bool {
        let converged = report.residual.max(f64::MIN_POSITIVE).log10() < self.threshold;
        ctx.convergence_mut()
            .set(zone.key().zone, ModuleKind::Flow, converged);
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

// ── Tests ───────────────────────────────────────────────────────────────────
