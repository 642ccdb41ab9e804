//! Physics-module abstractions for the Brume solver.
//!
//! A [`PhysicsModule`] is one discretised equation system living on one
//! zone: a flow solver, a turbulence model, a heat solver, a structural
//! solver. Modules own their [`SolutionHistory`] and expose optional
//! capability seams ([`AdjointModule`], [`LoadStepping`],
//! [`TurboAveraging`]) that drivers probe at runtime.
//!
//! [`ZoneSet`] groups the modules of one domain instance and mediates
//! stepping so that a module can read its siblings while being stepped
//! itself. [`SolveContext`] carries the per-run services every module
//! sees: the communicator, the convergence table, and the iteration
//! clock.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod adjoint;
pub mod context;
pub mod history;
pub mod module;
pub mod storage;
pub mod zone;

pub use adjoint::{AdjointModule, VariableSens};
pub use context::SolveContext;
pub use history::{SolutionHistory, TimeSlot};
pub use module::{
    LoadStepping, PeerView, PhysicsModule, StepReport, TurboAveraging, TurboSummary,
};
pub use storage::{MemoryStorage, RestartStorage, SnapshotKey, SnapshotTarget, StorageError};
pub use zone::{MeshState, ZoneError, ZoneSet};
