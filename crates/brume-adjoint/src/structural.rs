//! Reverse-mode controller for structural zones.
//!
//! Static problems behave like the coupled driver: one recording, then
//! backward sweeps to the threshold. Dynamic problems walk the physical
//! steps in reverse and reload the displacement pair `direct − 1` /
//! `direct` from restart storage before every recording; a step that
//! reaches past the start of the primal run substitutes the undeformed
//! configuration instead.

use std::sync::Arc;

use brume_core::DirectStep;
use brume_driver::{IterationController, MonitorRecord, SolveError, StructuralController};
use brume_physics::{RestartStorage, SolveContext, StepReport, ZoneSet};
use brume_sens::SensitivityTable;

use crate::config::{AdjointConfig, AdjointConfigError};
use crate::recorder::{adjoint_modules, Recorder};
use crate::rotation::HistoryRotator;

/// Reverse-mode counterpart of [`StructuralController`].
///
/// Owns its primal controller: the forward structural step that gets
/// recorded is always the plain Newton step, never the probe or ramp
/// machinery, so the tape holds exactly one displacement update.
pub struct AdjointStructuralDriver {
    config: AdjointConfig,
    primal: StructuralController,
    recorder: Recorder,
    rotator: HistoryRotator,
    sens: SensitivityTable,
    records: Vec<MonitorRecord>,
}

impl AdjointStructuralDriver {
    /// Build a driver around the structural controller whose run is
    /// being differentiated.
    ///
    /// # Errors
    ///
    /// Returns [`AdjointConfigError`] when the configuration does not
    /// validate.
    pub fn new(
        config: AdjointConfig,
        primal: StructuralController,
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

    /// The wrapped primal controller.
    pub fn primal(&self) -> &StructuralController {
        &self.primal
    }

    /// The recorder, exposing the tape and clearing-pass count.
    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Sensitivities accumulated so far, one row per step walked.
    pub fn sensitivities(&self) -> &SensitivityTable {
        &self.sens
    }

    fn direct(&self, ctx: &SolveContext<'_>) -> Option<DirectStep> {
        ctx.marching()
            .is_dual_time()
            .then(|| self.rotator.direct_step(ctx.clock().time_iter()))
    }
}

impl IterationController for AdjointStructuralDriver {
    fn name(&self) -> &str {
        "structural-adjoint"
    }

    fn records(&self) -> &[MonitorRecord] {
        &self.records
    }

    /// Reload the direct displacement pair for dynamic runs, stash the
    /// converged primal state, and record the tape.
    fn preprocess(
        &mut self,
        zone: &mut ZoneSet,
        ctx: &mut SolveContext<'_>,
    ) -> Result<(), SolveError> {
        zone.preprocess_all(ctx)?;
        if ctx.marching().is_dual_time() {
            self.rotator.reload(zone, ctx.clock().time_iter());
        }
        for adjoint in adjoint_modules(zone) {
            adjoint.store_primal();
        }
        let direct = self.direct(ctx);
        self.recorder
            .record(self.config.main_kind, direct, &mut self.primal, zone, ctx)?;
        Ok(())
    }

    /// One backward sweep over the recorded displacement update.
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

    /// History reloads happen in `preprocess`; dynamic runs only drop
    /// their convergence flags for the next reverse step.
    fn update(&mut self, zone: &mut ZoneSet, ctx: &mut SolveContext<'_>) -> Result<(), SolveError> {
        if ctx.marching().is_dual_time() {
            ctx.convergence_mut().clear_zone(zone.key().zone);
        }
        Ok(())
    }

    /// Emit one sensitivity row per design variable for the step just
    /// walked; dynamic runs accumulate a row set per physical step.
    fn postprocess(
        &mut self,
        zone: &mut ZoneSet,
        ctx: &mut SolveContext<'_>,
    ) -> Result<(), SolveError> {
        if let Some(kind) = self.config.geometry_kind {
            let direct = self.direct(ctx);
            self.recorder
                .record(kind, direct, &mut self.primal, zone, ctx)?;
            for adjoint in adjoint_modules(zone) {
                adjoint.seed_outputs(self.recorder.tape());
            }
            self.recorder.tape_mut().evaluate()?;
        }
        let step = ctx.clock().time_iter();
        for adjoint in adjoint_modules(zone) {
            let names = adjoint.variable_names();
            let values = adjoint.extract_variables(self.recorder.tape());
            for (name, value) in names.iter().zip(values.iter()) {
                self.sens.add(name, step, *value);
            }
        }
        zone.postprocess_all(ctx)?;
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
