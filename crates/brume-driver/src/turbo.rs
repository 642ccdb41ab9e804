//! Turbomachinery iteration: fluid flow through blade rows with span
//! averaging at the row interfaces.

use brume_core::{ModuleError, ModuleKind};
use brume_physics::{SolveContext, StepReport, TurboSummary, ZoneSet};

use crate::controller::{IterationController, MonitorRecord, SolveError};
use crate::fluid::COUPLED_ORDER;

/// Controller for flow zones running through turbomachinery rows.
///
/// Before every inner step the flow state is mixed out across span
/// sections; stage performance is gathered once per solve during
/// postprocess.
pub struct TurboController {
    threshold: f64,
    records: Vec<MonitorRecord>,
    performance: Vec<TurboSummary>,
}

impl TurboController {
    /// Controller converging when `log10` of the flow residual drops
    /// below `threshold`.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            records: Vec::new(),
            performance: Vec::new(),
        }
    }

    /// Stage performance gathered so far, one entry per solve.
    pub fn performance(&self) -> &[TurboSummary] {
        &self.performance
    }

    fn averaging<'z>(
        zone: &'z mut ZoneSet,
    ) -> Result<&'z mut (dyn brume_physics::TurboAveraging + 'z), SolveError> {
        let Some(module) = zone.module_mut(ModuleKind::Flow) else {
            return Err(SolveError::Module(ModuleError::Failed {
                module: ModuleKind::Flow.to_string(),
                reason: "module not present in zone".to_string(),
            }));
        };
        let name = module.name().to_string();
        module.turbo().ok_or(SolveError::Module(ModuleError::Unsupported {
            module: name,
            capability: "turbomachinery averaging",
        }))
    }
}

impl IterationController for TurboController {
    fn name(&self) -> &str {
        "turbo"
    }

    fn records(&self) -> &[MonitorRecord] {
        &self.records
    }

    fn iterate(
        &mut self,
        zone: &mut ZoneSet,
        ctx: &mut SolveContext<'_>,
    ) -> Result<StepReport, SolveError> {
        Self::averaging(zone)?.average_spans(ctx)?;
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

    fn postprocess(
        &mut self,
        zone: &mut ZoneSet,
        ctx: &mut SolveContext<'_>,
    ) -> Result<(), SolveError> {
        let summary = Self::averaging(zone)?.gather_performance(ctx)?;
        self.performance.push(summary);
        zone.postprocess_all(ctx)?;
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
