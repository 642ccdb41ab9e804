//! Zones: the module groups a controller iterates over.

use std::error::Error;
use std::fmt;

use crate::context::SolveContext;
use crate::history::SolutionHistory;
use crate::module::{PeerView, PhysicsModule, StepReport};
use brume_core::{DomainKey, ModuleError, ModuleKind, Tape, TapeBinding, TapeError, TimeMarching};

// ── Mesh state ──────────────────────────────────────────────────────────────

/// Node coordinates of one zone's mesh, with time levels when the grid
/// moves.
///
/// Coordinates use the same buffer layout as module solutions so the
/// rotation machinery treats both uniformly. The most recent tape
/// binding is kept so stale registrations stay observable after the
/// tape is cleared.
#[derive(Debug)]
pub struct MeshState {
    coords: SolutionHistory,
    moving: bool,
    binding: Option<TapeBinding>,
}

impl MeshState {
    /// Mesh with `points` coordinate entries. Moving grids retain time
    /// levels per `marching`; fixed grids may pass
    /// [`TimeMarching::Steady`] regardless of the run's scheme.
    pub fn new(points: usize, marching: TimeMarching, moving: bool) -> Self {
        Self {
            coords: SolutionHistory::new(&[points], marching),
            moving,
            binding: None,
        }
    }

    /// The coordinate buffers.
    pub fn coords(&self) -> &SolutionHistory {
        &self.coords
    }

    /// Mutable access to the coordinate buffers.
    pub fn coords_mut(&mut self) -> &mut SolutionHistory {
        &mut self.coords
    }

    /// Whether the grid moves during the run.
    pub fn is_moving(&self) -> bool {
        self.moving
    }

    /// Register the node coordinates as tape inputs and retain the
    /// binding.
    pub fn register_coordinates(&mut self, tape: &mut Tape) -> Result<TapeBinding, TapeError> {
        let binding = tape.register_input(self.coords.finest_points())?;
        self.binding = Some(binding);
        Ok(binding)
    }

    /// The most recent coordinate binding, live or stale.
    pub fn binding(&self) -> Option<TapeBinding> {
        self.binding
    }
}

// ── Zone validation ─────────────────────────────────────────────────────────

/// Rejected zone composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneError {
    /// A zone must hold at least one module.
    Empty {
        /// The offending zone.
        key: DomainKey,
    },
    /// Two modules of the same kind in one zone.
    DuplicateKind {
        /// The offending zone.
        key: DomainKey,
        /// The duplicated kind.
        kind: ModuleKind,
    },
}

impl fmt::Display for ZoneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { key } => write!(f, "zone {key} holds no modules"),
            Self::DuplicateKind { key, kind } => {
                write!(f, "zone {key} holds more than one {kind} module")
            }
        }
    }
}

impl Error for ZoneError {}

// ── Zone set ────────────────────────────────────────────────────────────────

/// The physics modules of one (zone, instance) pair, in solve order.
///
/// The first module is the zone's primary system; secondaries follow in
/// the order they are stepped. Stepping goes through the set so that the
/// stepped module sees its siblings read-only through a [`PeerView`].
pub struct ZoneSet {
    key: DomainKey,
    modules: Vec<Box<dyn PhysicsModule>>,
    mesh: MeshState,
}

impl ZoneSet {
    /// Builds a zone set, rejecting empty sets and duplicated kinds.
    pub fn new(
        key: DomainKey,
        modules: Vec<Box<dyn PhysicsModule>>,
        mesh: MeshState,
    ) -> Result<Self, ZoneError> {
        if modules.is_empty() {
            return Err(ZoneError::Empty { key });
        }
        for (index, module) in modules.iter().enumerate() {
            let kind = module.kind();
            if modules[..index].iter().any(|m| m.kind() == kind) {
                return Err(ZoneError::DuplicateKind { key, kind });
            }
        }
        Ok(Self { key, modules, mesh })
    }

    /// The (zone, instance) pair this set belongs to.
    pub fn key(&self) -> DomainKey {
        self.key
    }

    /// Number of modules.
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Module kinds in solve order.
    pub fn kinds(&self) -> Vec<ModuleKind> {
        self.modules.iter().map(|m| m.kind()).collect()
    }

    /// Whether a module of `kind` is present.
    pub fn contains(&self, kind: ModuleKind) -> bool {
        self.position(kind).is_some()
    }

    /// Solve-order position of the module of `kind`.
    pub fn position(&self, kind: ModuleKind) -> Option<usize> {
        self.modules.iter().position(|m| m.kind() == kind)
    }

    /// Kind of the zone's primary system. Construction guarantees at
    /// least one module.
    pub fn primary_kind(&self) -> ModuleKind {
        self.modules[0].kind()
    }

    /// The module of `kind`, if present.
    pub fn module(&self, kind: ModuleKind) -> Option<&dyn PhysicsModule> {
        self.position(kind).map(|i| self.modules[i].as_ref())
    }

    /// Mutable access to the module of `kind`, if present.
    pub fn module_mut(&mut self, kind: ModuleKind) -> Option<&mut dyn PhysicsModule> {
        let index = self.position(kind)?;
        Some(self.modules[index].as_mut())
    }

    /// Iterate over all modules in solve order.
    pub fn modules(&self) -> impl Iterator<Item = &dyn PhysicsModule> {
        self.modules.iter().map(|m| m.as_ref())
    }

    /// Iterate mutably over all modules in solve order.
    pub fn modules_mut(&mut self) -> impl Iterator<Item = &mut (dyn PhysicsModule + 'static)> + '_ {
        self.modules.iter_mut().map(|m| m.as_mut())
    }

    /// The zone's mesh.
    pub fn mesh(&self) -> &MeshState {
        &self.mesh
    }

    /// Mutable access to the zone's mesh.
    pub fn mesh_mut(&mut self) -> &mut MeshState {
        &mut self.mesh
    }

    /// Solution history of the module of `kind`.
    pub fn history(&self, kind: ModuleKind) -> Option<&SolutionHistory> {
        self.module(kind).map(|m| m.history())
    }

    fn split(
        &mut self,
        kind: ModuleKind,
    ) -> Result<(&mut Box<dyn PhysicsModule>, PeerView<'_>), ModuleError> {
        let Some(index) = self.position(kind) else {
            return Err(ModuleError::Failed {
                module: kind.to_string(),
                reason: "module not present in zone".to_string(),
            });
        };
        let (before, rest) = self.modules.split_at_mut(index);
        let Some((module, after)) = rest.split_first_mut() else {
            return Err(ModuleError::Failed {
                module: kind.to_string(),
                reason: "module not present in zone".to_string(),
            });
        };
        Ok((module, PeerView::new(before, after)))
    }

    /// Step the module of `kind`, giving it read access to its siblings.
    pub fn step(
        &mut self,
        kind: ModuleKind,
        ctx: &SolveContext<'_>,
    ) -> Result<StepReport, ModuleError> {
        let (module, peers) = self.split(kind)?;
        module.step(&peers, ctx)
    }

    /// Let the module of `kind` pull updated coupling state from its
    /// siblings.
    pub fn refresh(&mut self, kind: ModuleKind, ctx: &SolveContext<'_>) -> Result<(), ModuleError> {
        let (module, peers) = self.split(kind)?;
        module.refresh_dependencies(&peers, ctx)
    }

    /// Run every module's preprocess phase in solve order.
    pub fn preprocess_all(&mut self, ctx: &SolveContext<'_>) -> Result<(), ModuleError> {
        for module in &mut self.modules {
            module.preprocess(ctx)?;
        }
        Ok(())
    }

    /// Run every module's postprocess phase in solve order.
    pub fn postprocess_all(&mut self, ctx: &SolveContext<'_>) -> Result<(), ModuleError> {
        for module in &mut self.modules {
            module.postprocess(ctx)?;
        }
        Ok(())
    }

    /// Reset every module to its default state.
    pub fn apply_default_state_all(&mut self) {
        for module in &mut self.modules {
            module.apply_default_state();
        }
    }

    /// Reset every module to the run's initial condition.
    pub fn reset_initial_condition_all(&mut self) {
        for module in &mut self.modules {
            module.reset_initial_condition();
        }
    }

    /// End-of-step history rotation for every module, and for the mesh
    /// when the grid moves.
    pub fn advance_histories(&mut self) {
        for module in &mut self.modules {
            module.history_mut().advance();
        }
        if self.mesh.moving {
            self.mesh.coords.advance();
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
