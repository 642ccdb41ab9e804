//! Core types for the Brume multiphysics stepping driver.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! vocabulary shared across the Brume workspace: typed identifiers, the
//! recording and time-marching enumerations, the iteration clock, the
//! control surface of the reverse-mode AD tape, convergence bookkeeping,
//! and the error types that cross crate boundaries.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod clock;
pub mod convergence;
pub mod error;
pub mod id;
pub mod kind;
pub mod tape;

pub use clock::{ClockMark, IterationClock};
pub use convergence::ConvergenceTable;
pub use error::{CommError, ModuleError};
pub use id::{DirectStep, DomainKey, InstanceId, MeshLevel, ZoneId};
pub use kind::{ModuleKind, RecordingKind, TimeMarching};
pub use tape::{Tape, TapeBinding, TapeError, TapeState};
