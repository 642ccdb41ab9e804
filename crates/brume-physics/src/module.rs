//! The physics-module contract and its optional capability seams.

use crate::adjoint::AdjointModule;
use crate::context::SolveContext;
use crate::history::SolutionHistory;
use brume_core::{CommError, ModuleError, ModuleKind};
use brume_domain::Communicator;

// ── Step report ─────────────────────────────────────────────────────────────

/// What one inner step of a module reports back to its controller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepReport {
    /// Root-mean-square residual after the step, raw magnitude.
    /// Controllers apply `log10` where thresholds live in log space.
    pub residual: f64,
}

impl StepReport {
    /// A report carrying only a residual.
    pub fn residual(residual: f64) -> Self {
        Self { residual }
    }
}

// ── Peer view ───────────────────────────────────────────────────────────────

/// Read access to the sibling modules of a zone while one of them is
/// being stepped.
///
/// A turbulence model reads the flow history through this view; a flow
/// step reads back coupled temperatures. The stepped module itself is
/// never visible through its own view.
pub struct PeerView<'a> {
    before: &'a [Box<dyn PhysicsModule>],
    after: &'a [Box<dyn PhysicsModule>],
}

impl<'a> PeerView<'a> {
    pub(crate) fn new(
        before: &'a [Box<dyn PhysicsModule>],
        after: &'a [Box<dyn PhysicsModule>],
    ) -> Self {
        Self { before, after }
    }

    /// A view with no peers, for modules stepped in isolation.
    pub fn empty() -> Self {
        Self {
            before: &[],
            after: &[],
        }
    }

    fn iter(&self) -> impl Iterator<Item = &dyn PhysicsModule> {
        self.before
            .iter()
            .chain(self.after.iter())
            .map(|module| module.as_ref())
    }

    /// Whether a peer of the given kind exists.
    pub fn contains(&self, kind: ModuleKind) -> bool {
        self.iter().any(|module| module.kind() == kind)
    }

    /// The solution history of the peer of the given kind.
    pub fn history(&self, kind: ModuleKind) -> Option<&SolutionHistory> {
        self.iter()
            .find(|module| module.kind() == kind)
            .map(|module| module.history())
    }
}

// ── Module contract ─────────────────────────────────────────────────────────

/// One discretised equation system on one zone.
///
/// A module owns its [`SolutionHistory`] and is driven through the
/// phase methods in a fixed order: `preprocess` once per solve, then
/// `step` per inner iteration, then `postprocess` once. Between sibling
/// steps the controller calls `refresh_dependencies` so a module can
/// pull updated state from its peers.
///
/// # Contract
///
/// * `step` must leave the history's `current` slot consistent with the
///   returned residual even when it returns an error.
/// * `apply_default_state` must be total: it is called on zones whose
///   restart data is missing and must not fail.
/// * The capability accessors return `None` when the capability is
///   absent; callers treat that as "not supported", never as an error
///   in itself.
///
/// # Object safety
///
/// The trait is object safe; zones store modules as
/// `Box<dyn PhysicsModule>`.
pub trait PhysicsModule: Send {
    /// Short human-readable name, used in reports and errors.
    fn name(&self) -> &str;

    /// The equation system this module discretises.
    fn kind(&self) -> ModuleKind;

    /// The module's solution buffers.
    fn history(&self) -> &SolutionHistory;

    /// Mutable access to the module's solution buffers.
    fn history_mut(&mut self) -> &mut SolutionHistory;

    /// Once-per-solve setup before the first inner iteration.
    fn preprocess(&mut self, ctx: &SolveContext<'_>) -> Result<(), ModuleError> {
        let _ = ctx;
        Ok(())
    }

    /// One inner iteration of the module's own equations.
    fn step(&mut self, peers: &PeerView<'_>, ctx: &SolveContext<'_>)
        -> Result<StepReport, ModuleError>;

    /// Pull updated coupling state from peers before this module's next
    /// step. Called after any sibling has stepped.
    fn refresh_dependencies(
        &mut self,
        peers: &PeerView<'_>,
        ctx: &SolveContext<'_>,
    ) -> Result<(), ModuleError> {
        let _ = (peers, ctx);
        Ok(())
    }

    /// Once-per-solve teardown after the last inner iteration.
    fn postprocess(&mut self, ctx: &SolveContext<'_>) -> Result<(), ModuleError> {
        let _ = ctx;
        Ok(())
    }

    /// Synchronize shared-boundary values with peer ranks after coupling
    /// state changed. Every rank must reach this collectively; the
    /// default is a plain barrier for modules without partition halos.
    fn exchange_boundaries(&mut self, comm: &dyn Communicator) -> Result<(), CommError> {
        comm.barrier()
    }

    /// Reset the working solution to the configured default state:
    /// freestream for flow systems, the undeformed state for structures.
    fn apply_default_state(&mut self);

    /// Reset to the run's initial condition. Defaults to the default
    /// state; load-ramping solvers restore the pre-increment solution.
    fn reset_initial_condition(&mut self) {
        self.apply_default_state();
    }

    /// Reverse-mode differentiation support, if any.
    fn adjoint(&mut self) -> Option<&mut dyn AdjointModule> {
        None
    }

    /// Incremental-load support, if any.
    fn load_stepping(&mut self) -> Option<&mut dyn LoadStepping> {
        None
    }

    /// Turbomachinery span-averaging support, if any.
    fn turbo(&mut self) -> Option<&mut dyn TurboAveraging> {
        None
    }
}

// ── Incremental loading ─────────────────────────────────────────────────────

/// Capability of structural modules whose external loads can be applied
/// in fractions of the full magnitude.
pub trait LoadStepping {
    /// Scale the applied external loads. `multiplier` is in `(0, 1]`;
    /// `1.0` restores the full load.
    fn set_load_scale(&mut self, multiplier: f64);

    /// The load scale currently applied.
    fn load_scale(&self) -> f64;

    /// Raw magnitudes of the three nonlinear residual classes, in the
    /// order displacement, force, energy.
    fn residual_classes(&self) -> [f64; 3];
}

// ── Turbomachinery ──────────────────────────────────────────────────────────

/// Stage performance gathered after a turbomachinery step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TurboSummary {
    /// Total pressure ratio across the machine.
    pub pressure_ratio: f64,
    /// Isentropic efficiency.
    pub efficiency: f64,
}

/// Capability of flow modules running through blade rows.
pub trait TurboAveraging {
    /// Mix out the flow state across span sections at the row
    /// interfaces. Runs before every inner step.
    fn average_spans(&mut self, ctx: &SolveContext<'_>) -> Result<(), ModuleError>;

    /// Collect machine performance once the step has finished.
    fn gather_performance(&mut self, ctx: &SolveContext<'_>) -> Result<TurboSummary, ModuleError>;
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use brume_core::TimeMarching;

    struct Inert {
        kind: ModuleKind,
        history: SolutionHistory,
    }

    impl Inert {
        fn new(kind: ModuleKind) -> Self {
            Self {
                kind,
                history: SolutionHistory::new(&[4], TimeMarching::Steady),
            }
        }
    }

    impl PhysicsModule for Inert {
        fn name(&self) -> &str {
            "inert"
        }

        fn kind(&self) -> ModuleKind {
            self.kind
        }

        fn history(&self) -> &SolutionHistory {
            &self.history
        }

        fn history_mut(&mut self) -> &mut SolutionHistory {
            &mut self.history
        }

        fn step(
            &mut self,
            _peers: &PeerView<'_>,
            _ctx: &SolveContext<'_>,
        ) -> Result<StepReport, ModuleError> {
            Ok(StepReport::residual(0.0))
        }

        fn apply_default_state(&mut self) {
            self.history.fill_current(0.0);
        }
    }

    #[test]
    fn capability_seams_default_to_none() {
        let mut module = Inert::new(ModuleKind::Flow);
        assert!(module.adjoint().is_none());
        assert!(module.load_stepping().is_none());
        assert!(module.turbo().is_none());
    }

    #[test]
    fn reset_initial_condition_defaults_to_default_state() {
        let mut module = Inert::new(ModuleKind::Flow);
        module.history_mut().fill_current(9.0);
        module.reset_initial_condition();
        assert_eq!(
            module.history().slot(crate::history::TimeSlot::Current, 0),
            Some(&[0.0; 4][..])
        );
    }

    #[test]
    fn empty_peer_view_finds_nothing() {
        let view = PeerView::empty();
        assert!(!view.contains(ModuleKind::Flow));
        assert!(view.history(ModuleKind::Turbulence).is_none());
    }

    #[test]
    fn peer_view_spans_both_sides() {
        let modules: Vec<Box<dyn PhysicsModule>> = vec![
            Box::new(Inert::new(ModuleKind::Flow)),
            Box::new(Inert::new(ModuleKind::Turbulence)),
            Box::new(Inert::new(ModuleKind::Heat)),
        ];
        let (before, rest) = modules.split_at(1);
        let view = PeerView::new(before, &rest[1..]);
        assert!(view.contains(ModuleKind::Flow));
        assert!(view.contains(ModuleKind::Heat));
        assert!(!view.contains(ModuleKind::Turbulence));
        assert!(view.history(ModuleKind::Flow).is_some());
    }
}
