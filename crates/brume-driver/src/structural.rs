//! Structural solves: linear statics, Newton-Raphson iteration, and
//! incremental load application.

use brume_core::ModuleError;
use brume_physics::{SolveContext, StepReport, ZoneSet};

use crate::config::{RampConfig, StructuralConfig};
use crate::controller::{IterationController, MonitorRecord, SolveError, SolveReport, StopReason};

/// Iterations of the full-load trial that decides how the load is
/// applied.
const PROBE_ITERATIONS: u64 = 2;

// ── Controller ──────────────────────────────────────────────────────────────

/// Controller for zones whose primary system is structural.
///
/// Linear problems finish in a single direct solve. Nonlinear problems
/// run Newton-Raphson iterations until the displacement, force, and
/// energy residual classes all drop below the configured tolerances;
/// the stop signal is honored from the second iteration onward.
///
/// With incremental loading configured, a two-iteration probe at full
/// load decides between three outcomes: the probe converges and the
/// solve is done; every residual class passes the ramp criteria and
/// iteration continues unrestricted from the probe state; or the probe
/// state is discarded, the zone returns to its initial condition, and
/// the load is applied in equal increments with the load multiplier
/// walking `1/N .. 1.0`. After the last increment the multiplier is
/// reset to `1.0`.
pub struct StructuralController {
    config: StructuralConfig,
    records: Vec<MonitorRecord>,
    increments_run: u32,
}

impl StructuralController {
    /// Create a controller from validated structural settings.
    pub fn new(config: StructuralConfig) -> Self {
        Self {
            config,
            records: Vec::new(),
            increments_run: 0,
        }
    }

    /// Load increments executed so far, across all solves.
    pub fn increments_run(&self) -> u32 {
        self.increments_run
    }

    /// `log10` of the primary module's residual classes, or `None`
    /// when the module has no load-stepping support.
    fn classes(zone: &mut ZoneSet) -> Option<[f64; 3]> {
        let kind = zone.primary_kind();
        let raw = zone.module_mut(kind)?.load_stepping()?.residual_classes();
        Some(raw.map(|class| class.max(f64::MIN_POSITIVE).log10()))
    }

    /// Whether every residual class is below its threshold.
    fn classes_below(zone: &mut ZoneSet, thresholds: [f64; 3]) -> bool {
        Self::classes(zone).is_some_and(|classes| {
            classes
                .iter()
                .zip(&thresholds)
                .all(|(class, threshold)| class < threshold)
        })
    }

    fn set_load_scale(&self, zone: &mut ZoneSet, multiplier: f64) -> Result<(), SolveError> {
        let kind = zone.primary_kind();
        let Some(module) = zone.module_mut(kind) else {
            return Err(SolveError::Module(ModuleError::Failed {
                module: kind.to_string(),
                reason: "module not present in zone".to_string(),
            }));
        };
        match module.load_stepping() {
            Some(stepping) => {
                stepping.set_load_scale(multiplier);
                Ok(())
            }
            None => {
                let module = module.name().to_string();
                Err(SolveError::Module(ModuleError::Unsupported {
                    module,
                    capability: "nonlinear load stepping",
                }))
            }
        }
    }

    /// Newton-Raphson loop over inner iterations `from..limit`.
    ///
    /// Returns the iterations performed, the last step report, and the
    /// stop reason. `last` is returned unchanged when the range is
    /// empty.
    fn newton(
        &mut self,
        zone: &mut ZoneSet,
        ctx: &mut SolveContext<'_>,
        from: u64,
        limit: u64,
        mut last: StepReport,
    ) -> Result<(u64, StepReport, StopReason), SolveError> {
        let mut performed = 0u64;
        let mut stop = StopReason::InnerLimit;
        for inner in from..limit {
            ctx.clock_mut().set_inner_iter(inner);
            last = self.iterate(zone, ctx)?;
            performed += 1;
            let done = self.monitor(zone, ctx, &last);
            // The first iteration has no reference magnitude yet; the
            // stop signal counts from the second.
            if done && inner >= 1 {
                stop = StopReason::Converged;
                break;
            }
        }
        Ok((performed, last, stop))
    }

    /// Two full-load trial iterations. The verdict is the monitor
    /// result of the second.
    fn probe(
        &mut self,
        zone: &mut ZoneSet,
        ctx: &mut SolveContext<'_>,
    ) -> Result<(StepReport, bool), SolveError> {
        let mut last = StepReport::residual(f64::INFINITY);
        let mut converged = false;
        for inner in 0..PROBE_ITERATIONS {
            ctx.clock_mut().set_inner_iter(inner);
            last = self.iterate(zone, ctx)?;
            converged = self.monitor(zone, ctx, &last);
        }
        Ok((last, converged))
    }

    /// Probe at full load, then either continue unrestricted or
    /// restart with incremental loading.
    fn ramped(
        &mut self,
        zone: &mut ZoneSet,
        ctx: &mut SolveContext<'_>,
        inner_limit: u64,
        ramp: &RampConfig,
    ) -> Result<SolveReport, SolveError> {
        self.set_load_scale(zone, 1.0)?;
        let (probe_last, probe_converged) = self.probe(zone, ctx)?;
        if probe_converged {
            return Ok(SolveReport {
                iterations: PROBE_ITERATIONS,
                final_residual: probe_last.residual,
                stop: StopReason::Converged,
            });
        }
        if Self::classes_below(zone, ramp.criteria) {
            // The full load is tractable: keep the probe state.
            let (performed, last, stop) =
                self.newton(zone, ctx, PROBE_ITERATIONS, inner_limit, probe_last)?;
            return Ok(SolveReport {
                iterations: PROBE_ITERATIONS + performed,
                final_residual: last.residual,
                stop,
            });
        }

        // The probe state is unusable: restart from the initial
        // condition and walk the load up in equal increments.
        zone.reset_initial_condition_all();
        let zone_id = zone.key().zone;
        let primary = zone.primary_kind();
        let mut iterations = PROBE_ITERATIONS;
        let mut last = probe_last;
        let mut stop = StopReason::InnerLimit;
        for increment in 1..=ramp.increments {
            let multiplier = f64::from(increment) / f64::from(ramp.increments);
            self.set_load_scale(zone, multiplier)?;
            // Each increment is judged on its own iterations.
            ctx.convergence_mut().set(zone_id, primary, false);
            self.increments_run += 1;
            let (performed, increment_last, increment_stop) =
                self.newton(zone, ctx, 0, inner_limit, last)?;
            iterations += performed;
            last = increment_last;
            stop = increment_stop;
        }
        self.set_load_scale(zone, 1.0)?;
        Ok(SolveReport {
            iterations,
            final_residual: last.residual,
            stop,
        })
    }
}

impl IterationController for StructuralController {
    fn name(&self) -> &str {
        "structural"
    }

    fn records(&self) -> &[MonitorRecord] {
        &self.records
    }

    fn preprocess(
        &mut self,
        zone: &mut ZoneSet,
        ctx: &mut SolveContext<'_>,
    ) -> Result<(), SolveError> {
        if self.config.nonlinear {
            let kind = zone.primary_kind();
            if let Some(module) = zone.module_mut(kind) {
                if module.load_stepping().is_none() {
                    let module = module.name().to_string();
                    return Err(SolveError::Module(ModuleError::Unsupported {
                        module,
                        capability: "nonlinear load stepping",
                    }));
                }
            }
        }
        zone.preprocess_all(ctx)?;
        Ok(())
    }

    fn monitor(
        &mut self,
        zone: &mut ZoneSet,
        ctx: &mut SolveContext<'_>,
        report: &StepReport,
    ) -> bool {
        let converged = if self.config.nonlinear {
            Self::classes_below(zone, self.config.tolerances)
        } else {
            // Linear statics solves directly.
            true
        };
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

    fn solve(
        &mut self,
        zone: &mut ZoneSet,
        ctx: &mut SolveContext<'_>,
        inner_limit: u64,
    ) -> Result<SolveReport, SolveError> {
        let zone_id = zone.key().zone;
        for kind in zone.kinds() {
            ctx.convergence_mut().set(zone_id, kind, false);
        }
        self.preprocess(zone, ctx)?;

        let report = if !self.config.nonlinear {
            ctx.clock_mut().set_inner_iter(0);
            let last = self.iterate(zone, ctx)?;
            self.monitor(zone, ctx, &last);
            SolveReport {
                iterations: 1,
                final_residual: last.residual,
                stop: StopReason::Converged,
            }
        } else if let Some(ramp) = self.config.ramp.clone() {
            self.ramped(zone, ctx, inner_limit, &ramp)?
        } else {
            let placeholder = StepReport::residual(f64::INFINITY);
            let (performed, last, stop) = self.newton(zone, ctx, 0, inner_limit, placeholder)?;
            SolveReport {
                iterations: performed,
                final_residual: last.residual,
                stop,
            }
        };

        if !ctx.multizone() && ctx.marching().is_steady() {
            self.output(zone, ctx)?;
        }
        self.postprocess(zone, ctx)?;
        Ok(report)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
