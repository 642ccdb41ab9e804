//! The bounded recording scope around one forward primal step.
//!
//! Each adjoint evaluation needs a tape of exactly one forward
//! iteration, taken at the converged primal state, with the input set
//! selected by the requested [`RecordingKind`]. The recorder owns the
//! per-rank [`Tape`] and drives its whole lifecycle; everything here
//! must run in lockstep across ranks, and any divergence or scope
//! misuse is fatal.

use brume_core::{CommError, DirectStep, ModuleError, RecordingKind, Tape};
use brume_driver::{IterationController, SolveError};
use brume_physics::{AdjointModule, SolveContext, ZoneSet};

/// The adjoint-capable modules of a zone, in solve order.
pub(crate) fn adjoint_modules<'a>(
    zone: &'a mut ZoneSet,
) -> impl Iterator<Item = &'a mut dyn AdjointModule> {
    zone.modules_mut().filter_map(|module| module.adjoint())
}

// ── Report ──────────────────────────────────────────────────────────────────

/// What one completed recording looked like.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecordReport {
    /// The kind that was recorded.
    pub kind: RecordingKind,
    /// Tape generation holding the recording.
    pub generation: u64,
    /// Whether a clearing pass ran before the scope opened.
    pub cleared: bool,
    /// Input slots registered in the scope.
    pub inputs: u64,
    /// Output slots registered in the scope.
    pub outputs: u64,
    /// Residual reported by the recorded forward step.
    pub forward_residual: f64,
}

// ── Recorder ────────────────────────────────────────────────────────────────

/// Owns the tape and produces one internally consistent recording per
/// call.
///
/// The previously recorded kind is remembered across calls: switching
/// kinds changes which variables are active inputs, so a switch first
/// replays one forward step outside any scope to erase the stale index
/// bindings the old kind left in the modules.
pub struct Recorder {
    tape: Tape,
    current: Option<RecordingKind>,
    clearing_passes: u64,
}

impl Recorder {
    /// A recorder with a fresh passive tape and no recorded kind.
    pub fn new() -> Self {
        Self {
            tape: Tape::new(),
            current: None,
            clearing_passes: 0,
        }
    }

    /// The tape, for seeding and extraction.
    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    /// Mutable access to the tape, for backward sweeps.
    pub fn tape_mut(&mut self) -> &mut Tape {
        &mut self.tape
    }

    /// The kind of the most recent completed recording.
    pub fn current(&self) -> Option<RecordingKind> {
        self.current
    }

    /// Clearing passes performed so far.
    pub fn clearing_passes(&self) -> u64 {
        self.clearing_passes
    }

    /// Record one forward primal iteration under a fresh tape.
    ///
    /// `direct` positions the clock at the primal step being
    /// differentiated while the step replays; virtual steps leave the
    /// clock alone. The recorded scope holds exactly one forward step;
    /// a second step, a nested scope, or a rank disagreeing on the
    /// (kind, generation) pair is fatal.
    ///
    /// # Errors
    ///
    /// [`SolveError::Module`] when the zone has no adjoint-capable
    /// module or a replayed step fails; [`SolveError::Comm`] when ranks
    /// desynchronize; [`SolveError::Tape`] on scope misuse.
    pub fn record(
        &mut self,
        kind: RecordingKind,
        direct: Option<DirectStep>,
        primal: &mut dyn IterationController,
        zone: &mut ZoneSet,
        ctx: &mut SolveContext<'_>,
    ) -> Result<RecordReport, SolveError> {
        if adjoint_modules(zone).next().is_none() {
            return Err(SolveError::Module(ModuleError::Unsupported {
                module: zone.primary_kind().to_string(),
                capability: "reverse-mode differentiation",
            }));
        }

        let mark = ctx.clock().save();
        if let Some(index) = direct.and_then(DirectStep::stored_index) {
            ctx.clock_mut().set_time_iter(index);
        }

        // Outstanding bindings from the previous generation die here.
        self.tape.reset();

        // A kind switch changes the set of active inputs; one passive
        // forward pass erases the stale index bindings the old kind
        // left behind.
        let cleared = match self.current {
            Some(previous) if previous != kind => {
                tracing::debug!(
                    %previous,
                    requested = %kind,
                    "recording kind changed; running a clearing pass"
                );
                for adjoint in adjoint_modules(zone) {
                    adjoint.restore_primal();
                }
                if kind == RecordingKind::SolutionAndMesh {
                    propagate_dependencies(zone, ctx)?;
                }
                ctx.set_passive(true);
                let replay = primal.iterate(zone, ctx);
                ctx.set_passive(false);
                replay?;
                self.clearing_passes += 1;
                true
            }
            _ => false,
        };

        // The adjoint state returns to the converged primal values.
        // Idempotent, so running it again after a clearing pass is
        // harmless.
        for adjoint in adjoint_modules(zone) {
            adjoint.restore_primal();
        }

        // Every rank must open the same kind under the same generation.
        ctx.comm()
            .agree(CommError::recording_token(kind, self.tape.generation()))?;

        self.tape.start()?;

        if kind.registers_solution() {
            for adjoint in adjoint_modules(zone) {
                adjoint.register_solution(&mut self.tape)?;
                adjoint.register_variables(&mut self.tape)?;
            }
        }
        if kind.registers_coordinates() {
            zone.mesh_mut().register_coordinates(&mut self.tape)?;
        }
        if kind.registers_boundary_displacements() {
            for adjoint in adjoint_modules(zone) {
                adjoint.register_boundary_displacements(&mut self.tape)?;
            }
        }

        // Couplings are evaluated through current primal values, not
        // through their own tape inputs; refresh them now or the tape
        // records stale couplings.
        propagate_dependencies(zone, ctx)?;

        self.tape.note_forward_step()?;
        let forward = primal.iterate(zone, ctx)?;

        for adjoint in adjoint_modules(zone) {
            adjoint.register_output(&mut self.tape)?;
        }

        self.tape.stop()?;
        self.current = Some(kind);

        ctx.clock_mut().restore(mark);

        let report = RecordReport {
            kind,
            generation: self.tape.generation(),
            cleared,
            inputs: self.tape.input_count(),
            outputs: self.tape.output_count(),
            forward_residual: forward.residual,
        };
        tracing::debug!(
            kind = %report.kind,
            generation = report.generation,
            cleared = report.cleared,
            inputs = report.inputs,
            outputs = report.outputs,
            "recorded one forward step"
        );
        Ok(report)
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Push current primal values through every coupling in solve order,
/// then synchronize shared boundaries across ranks.
fn propagate_dependencies(zone: &mut ZoneSet, ctx: &SolveContext<'_>) -> Result<(), SolveError> {
    for kind in zone.kinds() {
        zone.refresh(kind, ctx)?;
    }
    for module in zone.modules_mut() {
        module.exchange_boundaries(ctx.comm())?;
    }
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────────────
