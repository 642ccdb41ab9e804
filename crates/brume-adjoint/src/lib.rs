//! Reverse-mode orchestration: tape recording, primal history
//! rotation, and the adjoint iteration drivers.
//!
//! A converged primal run leaves one snapshot per physical step in
//! restart storage. The drivers here walk those steps in reverse: the
//! [`HistoryRotator`] rebuilds the solution histories the step was
//! computed with, the [`Recorder`] replays exactly one forward
//! iteration under a fresh tape with the inputs selected by the
//! recording kind, and the drivers sweep that tape backward until the
//! adjoint residual converges, accumulating per-variable gradients
//! into a sensitivity table. Recording runs in lockstep across ranks;
//! a rank disagreeing on what to record is a fatal desync.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod config;
mod driver;
mod recorder;
mod rotation;
mod structural;

pub use config::{AdjointConfig, AdjointConfigError};
pub use driver::AdjointDriver;
pub use recorder::{RecordReport, Recorder};
pub use rotation::{HistoryRotator, RotationReport};
pub use structural::AdjointStructuralDriver;
