//! Brume: multiphysics time marching with reverse-mode adjoint orchestration.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! Brume sub-crates. For most users, adding `brume` as a single dependency is
//! sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use brume::prelude::*;
//! use brume::driver::controller_for;
//!
//! // A minimal system whose residual drops three decades per step.
//! struct Decay {
//!     history: SolutionHistory,
//!     residual: f64,
//! }
//! impl PhysicsModule for Decay {
//!     fn name(&self) -> &str { "decay" }
//!     fn kind(&self) -> ModuleKind { ModuleKind::Flow }
//!     fn history(&self) -> &SolutionHistory { &self.history }
//!     fn history_mut(&mut self) -> &mut SolutionHistory { &mut self.history }
//!     fn step(&mut self, _: &PeerView<'_>, _: &SolveContext<'_>)
//!         -> Result<StepReport, ModuleError> {
//!         self.residual *= 1e-3;
//!         Ok(StepReport::residual(self.residual))
//!     }
//!     fn apply_default_state(&mut self) { self.history.fill_current(0.0); }
//! }
//!
//! // One steady zone led by the decaying system.
//! let module = Decay {
//!     history: SolutionHistory::new(&[8], TimeMarching::Steady),
//!     residual: 1.0,
//! };
//! let mut zone = ZoneSet::new(
//!     DomainKey::new(ZoneId(0), InstanceId(0)),
//!     vec![Box::new(module)],
//!     MeshState::new(8, TimeMarching::Steady, false),
//! )
//! .unwrap();
//!
//! // Solve it to the default threshold of eight decades.
//! let config = SolveConfig::default();
//! let mut controller = controller_for(&zone, &config).unwrap();
//! let comm = SoloComm;
//! let mut table = ConvergenceTable::new();
//! let mut clock = IterationClock::new(config.dt);
//! let mut ctx = SolveContext::new(&comm, &mut table, &mut clock, TimeMarching::Steady, false);
//! let report = controller.solve(&mut zone, &mut ctx, config.inner_limit).unwrap();
//!
//! assert!(report.converged());
//! assert_eq!(report.iterations, 3);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `brume-core` | IDs, kinds, the tape, clocks, convergence bookkeeping |
//! | [`domain`] | `brume-domain` | Zone layout and rank communicators |
//! | [`physics`] | `brume-physics` | Module contract, zones, histories, restart storage |
//! | [`driver`] | `brume-driver` | Iteration controllers and the outer time loop |
//! | [`adjoint`] | `brume-adjoint` | Tape recording, history rotation, reverse drivers |
//! | [`sens`] | `brume-sens` | Sensitivity accumulation and tabular output |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, IDs, and shared state (`brume-core`).
///
/// Contains the zone and instance identifiers, the module and recording
/// kinds, the [`types::Tape`] lifecycle, the [`types::IterationClock`],
/// and the [`types::ConvergenceTable`].
pub use brume_core as types;

/// Zone layout and rank communicators (`brume-domain`).
///
/// Provides the [`domain::Communicator`] trait and its two in-process
/// implementations, [`domain::SoloComm`] for single-rank runs and
/// [`domain::ChannelComm`] for multi-rank tests, plus the
/// [`domain::DomainLayout`] partition description.
pub use brume_domain as domain;

/// The physics-module contract and zone plumbing (`brume-physics`).
///
/// The [`physics::PhysicsModule`] trait is the main extension point for
/// user-defined equation systems; [`physics::AdjointModule`] is its
/// reverse-mode capability seam. Zones group modules with their
/// [`physics::MeshState`]; [`physics::RestartStorage`] persists
/// converged steps for reverse-time consumers.
pub use brume_physics as physics;

/// Iteration controllers and the outer time loop (`brume-driver`).
///
/// [`driver::IterationController`] drives one zone through a solve;
/// [`driver::controller_for`] picks the controller matching a zone's
/// primary system. The [`driver::TimeLoop`] marches controllers across
/// physical time and persists each converged step.
pub use brume_driver as driver;

/// Reverse-mode adjoint orchestration (`brume-adjoint`).
///
/// [`adjoint::AdjointDriver`] and [`adjoint::AdjointStructuralDriver`]
/// replay a converged forward run backward in time, recording one
/// forward step per scope through the [`adjoint::Recorder`] and
/// rebuilding primal histories through the [`adjoint::HistoryRotator`].
pub use brume_adjoint as adjoint;

/// Sensitivity accumulation and tabular output (`brume-sens`).
///
/// Reverse walks add rows into a [`sens::SensitivityTable`];
/// [`sens::SensitivityWriter`] streams the table as tab-separated
/// values in ascending step order.
pub use brume_sens as sens;

/// Common imports for typical Brume usage.
///
/// ```rust
/// use brume::prelude::*;
/// ```
///
/// This imports the most frequently used types: the module contract,
/// zones and histories, communicators, controllers, the time loop, and
/// the adjoint drivers.
pub mod prelude {
    // Identifiers and iteration bookkeeping
    pub use brume_core::{
        ConvergenceTable, DirectStep, DomainKey, InstanceId, IterationClock, ModuleKind,
        RecordingKind, TimeMarching, ZoneId,
    };

    // Errors
    pub use brume_core::{CommError, ModuleError, TapeError};

    // Physics modules and zones
    pub use brume_physics::{
        AdjointModule, MeshState, PeerView, PhysicsModule, SolutionHistory, SolveContext,
        StepReport, TimeSlot, ZoneSet,
    };

    // Restart storage
    pub use brume_physics::{MemoryStorage, RestartStorage, SnapshotKey};

    // Communicators
    pub use brume_domain::{ChannelComm, Communicator, SoloComm};

    // Controllers and the time loop
    pub use brume_driver::{
        IterationController, SolveConfig, SolveError, SolveReport, TimeLoop, TimeLoopReport,
        ZoneUnit,
    };

    // Reverse mode
    pub use brume_adjoint::{AdjointConfig, AdjointDriver, AdjointStructuralDriver};

    // Sensitivities
    pub use brume_sens::{SensitivityTable, SensitivityWriter};
}
