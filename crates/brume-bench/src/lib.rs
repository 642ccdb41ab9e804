//! Benchmark profiles and utilities for the Brume solver framework.
//!
//! Provides pre-built zones and configurations for benchmarking and examples:
//!
//! - [`reference_zone`]: one steady flow system at a chosen point count
//! - [`coupled_zone`]: flow, turbulence, and heat systems coupled in one zone
//! - [`unsteady_zone`] / [`unsteady_config`]: second-order dual-time profiles
//! - [`seeded_archive`]: a restart store pre-filled for reverse-time walks
//!
//! All profiles step the built-in [`DecayModule`], whose residual falls
//! one decade per inner iteration and which supports reverse-mode
//! recording, so forward and adjoint paths can be measured with the
//! same zone.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use brume_core::{
    DomainKey, InstanceId, ModuleError, ModuleKind, Tape, TapeBinding, TapeError, TimeMarching,
    ZoneId,
};
use brume_driver::SolveConfig;
use brume_physics::{
    AdjointModule, MemoryStorage, MeshState, PeerView, PhysicsModule, SnapshotKey,
    SolutionHistory, SolveContext, StepReport, TimeSlot, VariableSens, ZoneSet,
};

/// Residual drop per inner iteration. One decade reaches the default
/// threshold of eight decades in nine steps.
pub const DECAY_RATE: f64 = 0.1;

/// A synthetic equation system for benchmarking.
///
/// Each step multiplies the residual by [`DECAY_RATE`] and rewrites the
/// whole working solution, so the per-iteration cost scales with the
/// point count the profile was built at. `preprocess` resets the
/// residual, making repeated solves of the same zone identical.
pub struct DecayModule {
    kind: ModuleKind,
    history: SolutionHistory,
    residual: f64,
    adjoint_residual: f64,
    stored: Option<Vec<f64>>,
}

impl DecayModule {
    /// A decaying system of the given kind over `points` unknowns.
    pub fn new(kind: ModuleKind, points: usize, marching: TimeMarching) -> Self {
        Self {
            kind,
            history: SolutionHistory::new(&[points], marching),
            residual: 1.0,
            adjoint_residual: 1.0,
            stored: None,
        }
    }
}

impl PhysicsModule for DecayModule {
    fn name(&self) -> &str {
        "decay"
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

    fn preprocess(&mut self, _ctx: &SolveContext<'_>) -> Result<(), ModuleError> {
        self.residual = 1.0;
        self.adjoint_residual = 1.0;
        Ok(())
    }

    fn step(
        &mut self,
        _peers: &PeerView<'_>,
        _ctx: &SolveContext<'_>,
    ) -> Result<StepReport, ModuleError> {
        self.residual *= DECAY_RATE;
        self.history.fill_current(self.residual);
        Ok(StepReport::residual(self.residual))
    }

    fn apply_default_state(&mut self) {
        self.history.fill_current(0.0);
    }

    fn adjoint(&mut self) -> Option<&mut dyn AdjointModule> {
        Some(self)
    }
}

impl AdjointModule for DecayModule {
    fn variable_names(&self) -> Vec<String> {
        vec!["rate".to_string()]
    }

    fn store_primal(&mut self) {
        self.stored = self.history.slot(TimeSlot::Current, 0).map(<[f64]>::to_vec);
    }

    fn restore_primal(&mut self) {
        if let Some(stored) = &self.stored {
            self.history.set_current(0, stored);
        }
    }

    fn register_solution(&mut self, tape: &mut Tape) -> Result<TapeBinding, TapeError> {
        tape.register_input(self.history.finest_points())
    }

    fn register_variables(&mut self, tape: &mut Tape) -> Result<TapeBinding, TapeError> {
        tape.register_input(1)
    }

    fn register_output(&mut self, tape: &mut Tape) -> Result<TapeBinding, TapeError> {
        tape.register_output(1)
    }

    fn seed_outputs(&mut self, _tape: &Tape) {}

    fn extract_solution(&mut self, _tape: &Tape) -> f64 {
        self.adjoint_residual *= DECAY_RATE;
        self.adjoint_residual
    }

    fn extract_variables(&mut self, _tape: &Tape) -> VariableSens {
        std::iter::once(DECAY_RATE).collect()
    }
}

/// Build a steady single-system zone: one flow [`DecayModule`] over
/// `points` unknowns.
pub fn reference_zone(points: usize) -> ZoneSet {
    ZoneSet::new(
        DomainKey::new(ZoneId(0), InstanceId(0)),
        vec![Box::new(DecayModule::new(
            ModuleKind::Flow,
            points,
            TimeMarching::Steady,
        ))],
        MeshState::new(points, TimeMarching::Steady, false),
    )
    .unwrap()
}

/// Build a steady coupled zone: flow, turbulence, and heat systems of
/// `points` unknowns each, flow leading.
pub fn coupled_zone(points: usize) -> ZoneSet {
    let module = |kind| {
        Box::new(DecayModule::new(kind, points, TimeMarching::Steady)) as Box<dyn PhysicsModule>
    };
    ZoneSet::new(
        DomainKey::new(ZoneId(0), InstanceId(0)),
        vec![
            module(ModuleKind::Flow),
            module(ModuleKind::Turbulence),
            module(ModuleKind::Heat),
        ],
        MeshState::new(points, TimeMarching::Steady, false),
    )
    .unwrap()
}

/// Build a second-order dual-time flow zone over `points` unknowns.
pub fn unsteady_zone(points: usize) -> ZoneSet {
    ZoneSet::new(
        DomainKey::new(ZoneId(0), InstanceId(0)),
        vec![Box::new(DecayModule::new(
            ModuleKind::Flow,
            points,
            TimeMarching::DualTime2nd,
        ))],
        MeshState::new(points, TimeMarching::DualTime2nd, false),
    )
    .unwrap()
}

/// A second-order dual-time configuration over `time_steps` physical
/// steps, otherwise at the defaults.
pub fn unsteady_config(time_steps: u64) -> SolveConfig {
    SolveConfig {
        marching: TimeMarching::DualTime2nd,
        time_steps,
        ..SolveConfig::default()
    }
}

/// A restart store holding flow states for steps `0..=steps` of a run
/// over `points` unknowns, as a forward pass would have written them.
pub fn seeded_archive(points: usize, steps: u64) -> MemoryStorage {
    let mut storage = MemoryStorage::new();
    for step in 0..=steps {
        let key = SnapshotKey::state(ZoneId(0), ModuleKind::Flow, step);
        storage.store(key, vec![step as f64; points]);
    }
    storage
}

#[cfg(test)]
mod tests {
    use super::*;
    use brume_core::{ConvergenceTable, IterationClock};
    use brume_domain::SoloComm;
    use brume_driver::{controller_for, IterationController};
    use brume_physics::RestartStorage;

    #[test]
    fn unsteady_config_validates() {
        unsteady_config(10).validate().unwrap();
    }

    #[test]
    fn coupled_zone_is_flow_led() {
        let zone = coupled_zone(64);
        assert_eq!(zone.primary_kind(), ModuleKind::Flow);
        assert_eq!(zone.module_count(), 3);
    }

    #[test]
    fn decay_profile_converges_in_nine_iterations() {
        let mut zone = reference_zone(64);
        let config = SolveConfig::default();
        let mut controller = controller_for(&zone, &config).unwrap();
        let comm = SoloComm;
        let mut table = ConvergenceTable::new();
        let mut clock = IterationClock::new(config.dt);
        let mut ctx =
            SolveContext::new(&comm, &mut table, &mut clock, TimeMarching::Steady, false);

        let report = controller
            .solve(&mut zone, &mut ctx, config.inner_limit)
            .unwrap();
        assert!(report.converged());
        assert_eq!(report.iterations, 9);
    }

    #[test]
    fn repeated_solves_are_identical() {
        let mut zone = reference_zone(64);
        let config = SolveConfig::default();
        let mut controller = controller_for(&zone, &config).unwrap();
        let comm = SoloComm;
        let mut table = ConvergenceTable::new();
        let mut clock = IterationClock::new(config.dt);
        let mut ctx =
            SolveContext::new(&comm, &mut table, &mut clock, TimeMarching::Steady, false);

        let first = controller
            .solve(&mut zone, &mut ctx, config.inner_limit)
            .unwrap();
        let second = controller
            .solve(&mut zone, &mut ctx, config.inner_limit)
            .unwrap();
        assert_eq!(first.iterations, second.iterations);
        assert_eq!(first.final_residual, second.final_residual);
    }

    #[test]
    fn seeded_archive_covers_every_step() {
        let storage = seeded_archive(32, 5);
        for step in 0..=5 {
            let key = SnapshotKey::state(ZoneId(0), ModuleKind::Flow, step);
            let data = storage.load(key).unwrap();
            assert_eq!(data, vec![step as f64; 32]);
        }
    }
}
