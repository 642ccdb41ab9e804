//! Coupled adjoint controller for fluid-led zones.
//!
//! Wraps a primal controller and replaces its forward semantics with
//! the reverse ones: each solve records one forward step at the
//! converged primal state, then iterates backward sweeps over that
//! tape until the adjoint residual meets the threshold. Unsteady runs
//! walk the physical steps in reverse, rebuilding the primal histories
//! from restart storage before each recording.

use std::sync::Arc;

use brume_core::DirectStep;
use brume_driver::{IterationController, MonitorRecord, SolveError};
use brume_physics::{RestartStorage, SolveContext, StepReport, ZoneSet};
use brume_sens::SensitivityTable;

use crate::config::{AdjointConfig, AdjointConfigError};
use crate::recorder::{adjoint_modules, Recorder};
use crate::rotation::HistoryRotator;

/// Reverse-mode counterpart of a forward coupled controller.
///
/// The wrapped primal controller supplies the forward step that gets
/// recorded; this type owns the tape, the history rotation, and the
/// sensitivity table the run accumulates into.
pub struct AdjointDriver {
    config: AdjointConfig,
    primal: Box<dyn IterationController>,
    recorder: Recorder,
    rotator: HistoryRotator,
    sens: SensitivityTable,
    records: Vec<MonitorRecord>,
}

impl AdjointDriver {
    /// Build a driver around a forward controller and the storage the
    /// primal run wrote its snapshots to.
    ///
    /// # Errors
    ///
    /// Returns [`AdjointConfigError`] when the configuration does not
    /// validate.
    pub fn new(
        config: AdjointConfig,
        primal: Box<dyn IterationController>,
        storage: Arc<dyn RestartStorage>,
    ) -> Result<Self, AdjointConfigError> {
        config.validate()?;
        let rotator = HistoryRotator::new(storage, config.total_steps);
        Ok(Self {
            config,
            primal,
            recorder: Recorder::new(),
            rotator,
            sens: SensitivityTable::new(),
            records: Vec::new(),
        })
    }

    /// The configuration the driver was built with.
    pub fn config(&self) -> &AdjointConfig {
        &self.config
    }

    /// The recorder, exposing the tape and clearing-pass count.
    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Sensitivities accumulated so far.
    pub fn sensitivities(&self) -> &SensitivityTable {
        &self.sens
    }

    /// The primal step index currently being differentiated, for
    /// unsteady marching only.
    fn direct(&self, ctx: &SolveContext<'_>) -> Option<DirectStep> {
        ctx.marching()
            .is_dual_time()
            .then(|| self.rotator.direct_step(ctx.clock().time_iter()))
    }

    /// Pull per-variable gradients out of the active tape into the
    /// table, keyed by the current reverse step.
    fn extract_rows(&mut self, zone: &mut ZoneSet, step: u64) {
        for adjoint in adjoint_modules(zone) {
            let names = adjoint.variable_names();
            let values = adjoint.extract_variables(self.recorder.tape());
            for (name, value) in names.iter().zip(values.iter()) {
                self.sens.add(name, step, *value);
            }
        }
    }
}

impl IterationController for AdjointDriver {
    fn name(&self) -> &str {
        "coupled-adjoint"
    }

    fn records(&self) -> &[MonitorRecord] {
        &self.records
    }

    /// Rebuild primal histories for the step under differentiation,
    /// stash the converged primal state, and record the main tape.
    fn preprocess(
        &mut self,
        zone: &mut ZoneSet,
        ctx: &mut SolveContext<'_>,
    ) -> Result<(), SolveError> {
        zone.preprocess_all(ctx)?;
        if ctx.marching().is_dual_time() {
            self.rotator.rotate(zone, ctx.clock().time_iter());
        }
        for adjoint in adjoint_modules(zone) {
            adjoint.store_primal();
        }
        let direct = self.direct(ctx);
        self.recorder
            .record(self.config.main_kind, direct, self.primal.as_mut(), zone, ctx)?;
        Ok(())
    }

    /// One backward sweep: seed the objective, evaluate the tape,
    /// extract the adjoint solution updates.
    fn iterate(
        &mut self,
        zone: &mut ZoneSet,
        _ctx: &mut SolveContext<'_>,
    ) -> Result<StepReport, SolveError> {
        for adjoint in adjoint_modules(zone) {
            adjoint.seed_outputs(self.recorder.tape());
        }
        self.recorder.tape_mut().evaluate()?;
        let mut residual = 0.0_f64;
        for adjoint in adjoint_modules(zone) {
            residual = residual.max(adjoint.extract_solution(self.recorder.tape()));
        }
        Ok(StepReport::residual(residual))
    }

    fn monitor(
        &mut self,
        zone: &mut ZoneSet,
        ctx: &mut SolveContext<'_>,
        report: &StepReport,
    ) -> bool {
        let converged = report.residual.max(f64::MIN_POSITIVE).log10() < self.config.threshold;
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

    /// The reverse walk rebuilds its own histories before each step,
    /// so nothing advances here; dual-time runs drop their convergence
    /// flags because the next step re-solves the adjoint equations.
    fn update(&mut self, zone: &mut ZoneSet, ctx: &mut SolveContext<'_>) -> Result<(), SolveError> {
        if ctx.marching().is_dual_time() {
            ctx.convergence_mut().clear_zone(zone.key().zone);
        }
        Ok(())
    }

    /// Record the geometric tape when configured, then emit one
    /// sensitivity row per design variable for this step.
    fn postprocess(
        &mut self,
        zone: &mut ZoneSet,
        ctx: &mut SolveContext<'_>,
    ) -> Result<(), SolveError> {
        if let Some(kind) = self.config.geometry_kind {
            let direct = self.direct(ctx);
            self.recorder
                .record(kind, direct, self.primal.as_mut(), zone, ctx)?;
            for adjoint in adjoint_modules(zone) {
                adjoint.seed_outputs(self.recorder.tape());
            }
            self.recorder.tape_mut().evaluate()?;
        }
        let step = ctx.clock().time_iter();
        self.extract_rows(zone, step);
        zone.postprocess_all(ctx)?;
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
