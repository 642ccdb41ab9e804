//! Scripted physics modules and test scenarios for Brume development.
//!
//! [`SyntheticModule`] is a physics module whose residuals, failures,
//! and capability seams are scripted from the outside. [`CallLog`]
//! records the order of lifecycle calls across the modules of a test,
//! and [`SyntheticProbe`] watches one module's counters after the
//! module has been boxed into a zone. [`seeded_storage`] pre-fills a
//! restart store with reproducible random states.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use brume_core::{
    CommError, ModuleError, ModuleKind, Tape, TapeBinding, TapeError, TimeMarching, ZoneId,
};
use brume_domain::Communicator;
use brume_physics::{
    AdjointModule, LoadStepping, MemoryStorage, PeerView, PhysicsModule, SnapshotKey,
    SolutionHistory, SolveContext, StepReport, TimeSlot, TurboAveraging, TurboSummary,
    VariableSens,
};
use rand::{RngExt, SeedableRng};
use rand_chacha::ChaCha8Rng;

// ── Call log ─────────────────────────────────────────────────────────

/// Order of lifecycle calls across the modules of one test. Clones
/// share the same log.
#[derive(Clone, Default)]
pub struct CallLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event.
    pub fn record(&self, event: &str) {
        self.events.lock().unwrap().push(event.to_string());
    }

    /// All events recorded so far, oldest first.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

// ── Shared counters ──────────────────────────────────────────────────

#[derive(Default)]
struct Shared {
    step_calls: AtomicU64,
    initial_resets: AtomicU64,
    default_states: AtomicU64,
    primal_stores: AtomicU64,
    primal_restores: AtomicU64,
    seeds: AtomicU64,
    solution_extracts: AtomicU64,
    variable_extracts: AtomicU64,
    load_scales: Mutex<Vec<f64>>,
}

/// Read handle on a [`SyntheticModule`]'s counters, valid after the
/// module has moved into a zone.
#[derive(Clone)]
pub struct SyntheticProbe {
    shared: Arc<Shared>,
}

impl SyntheticProbe {
    pub fn step_calls(&self) -> u64 {
        self.shared.step_calls.load(Ordering::Relaxed)
    }

    pub fn initial_resets(&self) -> u64 {
        self.shared.initial_resets.load(Ordering::Relaxed)
    }

    pub fn default_states(&self) -> u64 {
        self.shared.default_states.load(Ordering::Relaxed)
    }

    pub fn primal_stores(&self) -> u64 {
        self.shared.primal_stores.load(Ordering::Relaxed)
    }

    pub fn primal_restores(&self) -> u64 {
        self.shared.primal_restores.load(Ordering::Relaxed)
    }

    pub fn seeds(&self) -> u64 {
        self.shared.seeds.load(Ordering::Relaxed)
    }

    pub fn solution_extracts(&self) -> u64 {
        self.shared.solution_extracts.load(Ordering::Relaxed)
    }

    pub fn variable_extracts(&self) -> u64 {
        self.shared.variable_extracts.load(Ordering::Relaxed)
    }

    /// Every load multiplier applied, in application order.
    pub fn load_scales(&self) -> Vec<f64> {
        self.shared.load_scales.lock().unwrap().clone()
    }
}

// ── Synthetic module ─────────────────────────────────────────────────

/// A physics module driven entirely by scripts.
///
/// Each `step` fills the working solution with the cumulative call
/// count and reports the next scripted residual (the last script entry
/// repeats). Capability seams are off until the matching builder
/// enables them.
pub struct SyntheticModule {
    kind: ModuleKind,
    name: String,
    history: SolutionHistory,
    residuals: Vec<f64>,
    failure_at: Option<u64>,
    log: Option<CallLog>,
    turbo: Option<TurboSummary>,
    load_classes: Option<Vec<[f64; 3]>>,
    load_scale: f64,
    adjoint: bool,
    adjoint_residuals: Vec<f64>,
    variables: Vec<(String, f64)>,
    stored_primal: Option<Vec<f64>>,
    shared: Arc<Shared>,
}

impl SyntheticModule {
    pub fn new(kind: ModuleKind, points: usize, marching: TimeMarching) -> Self {
        Self {
            kind,
            name: kind.to_string(),
            history: SolutionHistory::new(&[points], marching),
            residuals: vec![1.0],
            failure_at: None,
            log: None,
            turbo: None,
            load_classes: None,
            load_scale: 1.0,
            adjoint: false,
            adjoint_residuals: vec![0.0],
            variables: Vec::new(),
            stored_primal: None,
            shared: Arc::default(),
        }
    }

    /// Residual reported by each step call; the last entry repeats.
    pub fn with_residuals(mut self, residuals: Vec<f64>) -> Self {
        assert!(!residuals.is_empty(), "residual script must not be empty");
        self.residuals = residuals;
        self
    }

    /// Fail the step with the given zero-based call index.
    pub fn with_failure_at(mut self, call: u64) -> Self {
        self.failure_at = Some(call);
        self
    }

    /// Record lifecycle calls as `"{kind}.{event}"` into `log`.
    pub fn with_log(mut self, log: &CallLog) -> Self {
        self.log = Some(log.clone());
        self
    }

    /// Enable the turbomachinery seam; `gather_performance` returns
    /// `summary`.
    pub fn with_turbo(mut self, summary: TurboSummary) -> Self {
        self.turbo = Some(summary);
        self
    }

    /// Enable the load-stepping seam with scripted residual classes,
    /// indexed by step count; the last entry repeats.
    pub fn with_load_stepping(mut self, classes: Vec<[f64; 3]>) -> Self {
        assert!(!classes.is_empty(), "class script must not be empty");
        self.load_classes = Some(classes);
        self
    }

    /// Enable the adjoint seam with default scripts.
    pub fn with_adjoint(mut self) -> Self {
        self.adjoint = true;
        self
    }

    /// Adjoint residual reported by each solution extraction; the last
    /// entry repeats. Implies [`SyntheticModule::with_adjoint`].
    pub fn with_adjoint_residuals(mut self, residuals: Vec<f64>) -> Self {
        assert!(!residuals.is_empty(), "residual script must not be empty");
        self.adjoint = true;
        self.adjoint_residuals = residuals;
        self
    }

    /// Design variables and the sensitivity each extraction reports.
    /// Implies [`SyntheticModule::with_adjoint`].
    pub fn with_variables(mut self, variables: Vec<(&str, f64)>) -> Self {
        self.adjoint = true;
        self.variables = variables
            .into_iter()
            .map(|(name, sens)| (name.to_string(), sens))
            .collect();
        self
    }

    /// Counter handle that stays valid after the module is boxed.
    pub fn probe(&self) -> SyntheticProbe {
        SyntheticProbe {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn points(&self) -> usize {
        self.history.finest_points()
    }

    pub fn marching(&self) -> TimeMarching {
        self.history.marching()
    }

    pub fn boxed(self) -> Box<dyn PhysicsModule> {
        Box::new(self)
    }

    fn note(&self, event: &str) {
        if let Some(log) = &self.log {
            log.record(&format!("{}.{event}", self.kind));
        }
    }
}

impl PhysicsModule for SyntheticModule {
    fn name(&self) -> &str {
        &self.name
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
        self.note("preprocess");
        Ok(())
    }

    fn step(
        &mut self,
        _peers: &PeerView<'_>,
        ctx: &SolveContext<'_>,
    ) -> Result<StepReport, ModuleError> {
        let call = self.shared.step_calls.fetch_add(1, Ordering::Relaxed);
        if ctx.is_passive() {
            self.note("step.passive");
        } else {
            self.note("step");
        }
        if self.failure_at == Some(call) {
            return Err(ModuleError::Failed {
                module: self.name.clone(),
                reason: format!("scripted failure at call {call}"),
            });
        }
        let count = call + 1;
        self.history.fill_current(count as f64);
        let index = (count - 1) as usize;
        let residual = self.residuals[index.min(self.residuals.len() - 1)];
        Ok(StepReport::residual(residual))
    }

    fn refresh_dependencies(
        &mut self,
        _peers: &PeerView<'_>,
        _ctx: &SolveContext<'_>,
    ) -> Result<(), ModuleError> {
        self.note("refresh");
        Ok(())
    }

    fn postprocess(&mut self, _ctx: &SolveContext<'_>) -> Result<(), ModuleError> {
        self.note("postprocess");
        Ok(())
    }

    fn exchange_boundaries(&mut self, comm: &dyn Communicator) -> Result<(), CommError> {
        self.note("exchange");
        comm.barrier()
    }

    fn apply_default_state(&mut self) {
        self.shared.default_states.fetch_add(1, Ordering::Relaxed);
        self.history.fill_current(0.0);
    }

    fn reset_initial_condition(&mut self) {
        self.shared.initial_resets.fetch_add(1, Ordering::Relaxed);
        self.history.fill_current(0.0);
    }

    fn adjoint(&mut self) -> Option<&mut dyn AdjointModule> {
        if self.adjoint {
            Some(self)
        } else {
            None
        }
    }

    fn load_stepping(&mut self) -> Option<&mut dyn LoadStepping> {
        if self.load_classes.is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn turbo(&mut self) -> Option<&mut dyn TurboAveraging> {
        if self.turbo.is_some() {
            Some(self)
        } else {
            None
        }
    }
}

impl LoadStepping for SyntheticModule {
    fn set_load_scale(&mut self, multiplier: f64) {
        self.load_scale = multiplier;
        self.shared.load_scales.lock().unwrap().push(multiplier);
    }

    fn load_scale(&self) -> f64 {
        self.load_scale
    }

    fn residual_classes(&self) -> [f64; 3] {
        let classes = self
            .load_classes
            .as_ref()
            .expect("load-stepping seam enabled without a class script");
        let calls = self.shared.step_calls.load(Ordering::Relaxed);
        let index = calls.saturating_sub(1) as usize;
        classes[index.min(classes.len() - 1)]
    }
}

impl TurboAveraging for SyntheticModule {
    fn average_spans(&mut self, _ctx: &SolveContext<'_>) -> Result<(), ModuleError> {
        self.note("average_spans");
        Ok(())
    }

    fn gather_performance(&mut self, _ctx: &SolveContext<'_>) -> Result<TurboSummary, ModuleError> {
        self.note("gather_performance");
        let summary = self
            .turbo
            .expect("turbomachinery seam enabled without a summary");
        Ok(summary)
    }
}

impl AdjointModule for SyntheticModule {
    fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|(name, _)| name.clone()).collect()
    }

    fn store_primal(&mut self) {
        self.note("store_primal");
        self.shared.primal_stores.fetch_add(1, Ordering::Relaxed);
        self.stored_primal = self.history.slot(TimeSlot::Current, 0).map(|s| s.to_vec());
    }

    fn restore_primal(&mut self) {
        self.note("restore_primal");
        self.shared.primal_restores.fetch_add(1, Ordering::Relaxed);
        if let Some(primal) = self.stored_primal.clone() {
            self.history.set_current(0, &primal);
        }
    }

    fn register_solution(&mut self, tape: &mut Tape) -> Result<TapeBinding, TapeError> {
        self.note("register_solution");
        tape.register_input(self.history.finest_points())
    }

    fn register_variables(&mut self, tape: &mut Tape) -> Result<TapeBinding, TapeError> {
        self.note("register_variables");
        tape.register_input(self.variables.len())
    }

    fn register_boundary_displacements(
        &mut self,
        tape: &mut Tape,
    ) -> Result<TapeBinding, TapeError> {
        self.note("register_displacements");
        tape.register_input(2)
    }

    fn register_output(&mut self, tape: &mut Tape) -> Result<TapeBinding, TapeError> {
        self.note("register_output");
        tape.register_output(1)
    }

    fn seed_outputs(&mut self, _tape: &Tape) {
        self.note("seed_outputs");
        self.shared.seeds.fetch_add(1, Ordering::Relaxed);
    }

    fn extract_solution(&mut self, _tape: &Tape) -> f64 {
        self.note("extract_solution");
        let count = self.shared.solution_extracts.fetch_add(1, Ordering::Relaxed) + 1;
        let index = (count - 1) as usize;
        self.adjoint_residuals[index.min(self.adjoint_residuals.len() - 1)]
    }

    fn extract_variables(&mut self, _tape: &Tape) -> VariableSens {
        self.note("extract_variables");
        self.shared.variable_extracts.fetch_add(1, Ordering::Relaxed);
        self.variables.iter().map(|&(_, sens)| sens).collect()
    }
}

// ── Seeded storage ───────────────────────────────────────────────────

/// A restart store holding reproducible random states for one module
/// over steps `0..steps`. The same seed always produces the same
/// states.
pub fn seeded_storage(
    zone: ZoneId,
    kind: ModuleKind,
    points: usize,
    steps: u64,
    seed: u64,
) -> MemoryStorage {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut storage = MemoryStorage::new();
    for step in 0..steps {
        let data: Vec<f64> = (0..points).map(|_| 2.0 * rng.random::<f64>() - 1.0).collect();
        storage.store(SnapshotKey::state(zone, kind, step), data);
    }
    storage
}

// ── Tests ────────────────────────────────────────────────────────────
