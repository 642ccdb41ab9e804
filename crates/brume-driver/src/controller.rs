//! The iteration-controller contract and its driving solve loop.

use std::error::Error;
use std::fmt;

use brume_core::{CommError, ModuleError, TapeError};
use brume_physics::{SolveContext, StepReport, ZoneSet};

// ── History records ─────────────────────────────────────────────────────────

/// One per-iteration history entry, appended by `Monitor`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MonitorRecord {
    /// Physical time step of the iteration.
    pub time_iter: u64,
    /// Outer (coupling) iteration.
    pub outer_iter: u64,
    /// Inner iteration within the solve.
    pub inner_iter: u64,
    /// Monitored residual, raw magnitude.
    pub residual: f64,
    /// Whether the convergence check passed at this iteration.
    pub converged: bool,
}

/// Why a solve finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// `Monitor` signalled stop before the limit.
    Converged,
    /// The inner-iteration limit was exhausted.
    InnerLimit,
}

/// Summary of one completed solve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveReport {
    /// Inner iterations performed.
    pub iterations: u64,
    /// Residual of the last iteration, raw magnitude.
    pub final_residual: f64,
    /// Why the loop ended.
    pub stop: StopReason,
}

impl SolveReport {
    /// Whether the solve stopped on convergence.
    pub fn converged(&self) -> bool {
        self.stop == StopReason::Converged
    }
}

// ── Errors ──────────────────────────────────────────────────────────────────

/// Failure that aborts a solve.
///
/// A failing iterate ends the solve immediately: no further `Update` or
/// `Postprocess` runs for that step, and the outer loop stops.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveError {
    /// A physics module failed.
    Module(ModuleError),
    /// A collective operation failed or desynchronized.
    Comm(CommError),
    /// The tape lifecycle was misused.
    Tape(TapeError),
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module(e) => write!(f, "module: {e}"),
            Self::Comm(e) => write!(f, "comm: {e}"),
            Self::Tape(e) => write!(f, "tape: {e}"),
        }
    }
}

impl Error for SolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Module(e) => Some(e),
            Self::Comm(e) => Some(e),
            Self::Tape(e) => Some(e),
        }
    }
}

impl From<ModuleError> for SolveError {
    fn from(e: ModuleError) -> Self {
        Self::Module(e)
    }
}

impl From<CommError> for SolveError {
    fn from(e: CommError) -> Self {
        Self::Comm(e)
    }
}

impl From<TapeError> for SolveError {
    fn from(e: TapeError) -> Self {
        Self::Tape(e)
    }
}

// ── Controller contract ─────────────────────────────────────────────────────

/// One solve strategy for one zone: fluid, thermal, structural,
/// turbomachinery, or an adjoint counterpart.
///
/// All variants share the control flow of the provided [`solve`]
/// (Preprocess, then Iterate/Monitor until stop or limit, then
/// Postprocess); they differ in what one iteration does and how
/// convergence is judged. `Monitor` owns the per-iteration history:
/// every call appends a [`MonitorRecord`] retrievable through
/// [`records`].
///
/// [`solve`]: IterationController::solve
/// [`records`]: IterationController::records
pub trait IterationController: Send {
    /// Short name for reports and logs.
    fn name(&self) -> &str;

    /// History records appended by `Monitor`, oldest first.
    fn records(&self) -> &[MonitorRecord];

    /// Once-per-solve setup. Default: every module's preprocess phase.
    fn preprocess(
        &mut self,
        zone: &mut ZoneSet,
        ctx: &mut SolveContext<'_>,
    ) -> Result<(), SolveError> {
        zone.preprocess_all(ctx)?;
        Ok(())
    }

    /// One inner iteration. Default: step the zone's primary system.
    fn iterate(
        &mut self,
        zone: &mut ZoneSet,
        ctx: &mut SolveContext<'_>,
    ) -> Result<StepReport, SolveError> {
        let kind = zone.primary_kind();
        Ok(zone.step(kind, ctx)?)
    }

    /// Convergence check plus history recording. Returns the stop flag.
    fn monitor(
        &mut self,
        zone: &mut ZoneSet,
        ctx: &mut SolveContext<'_>,
        report: &StepReport,
    ) -> bool;

    /// Post-step bookkeeping between physical time steps. Default:
    /// rotate time histories for dual-time runs.
    fn update(&mut self, zone: &mut ZoneSet, ctx: &mut SolveContext<'_>) -> Result<(), SolveError> {
        if ctx.marching().is_dual_time() {
            zone.advance_histories();
        }
        Ok(())
    }

    /// Checkpoint-style emission. Called by [`solve`] for single-zone
    /// steady runs and by the time loop on outer boundaries otherwise.
    /// Default: nothing.
    ///
    /// [`solve`]: IterationController::solve
    fn output(&mut self, zone: &mut ZoneSet, ctx: &mut SolveContext<'_>) -> Result<(), SolveError> {
        let _ = (zone, ctx);
        Ok(())
    }

    /// Once-per-solve teardown. Default: every module's postprocess
    /// phase.
    fn postprocess(
        &mut self,
        zone: &mut ZoneSet,
        ctx: &mut SolveContext<'_>,
    ) -> Result<(), SolveError> {
        zone.postprocess_all(ctx)?;
        Ok(())
    }

    /// The driving loop shared by every variant.
    ///
    /// Clears the zone's convergence flags (its equations are about to
    /// be re-solved), runs `preprocess`, then iterates `iterate` and
    /// `monitor` until `monitor` signals stop or `inner_limit` is
    /// reached. `output` runs only for single-zone steady solves;
    /// multizone and unsteady runs emit on outer boundaries instead. A
    /// failing iteration aborts immediately, skipping `postprocess`.
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

        let mut last = StepReport::residual(f64::INFINITY);
        let mut iterations = 0u64;
        let mut stop = StopReason::InnerLimit;
        for inner in 0..inner_limit {
            ctx.clock_mut().set_inner_iter(inner);
            last = self.iterate(zone, ctx)?;
            iterations += 1;
            if self.monitor(zone, ctx, &last) {
                stop = StopReason::Converged;
                break;
            }
        }

        if !ctx.multizone() && ctx.marching().is_steady() {
            self.output(zone, ctx)?;
        }
        self.postprocess(zone, ctx)?;
        Ok(SolveReport {
            iterations,
            final_residual: last.residual,
            stop,
        })
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
