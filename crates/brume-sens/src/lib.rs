//! Design-variable sensitivities.
//!
//! Adjoint runs produce one sensitivity per design variable per outer
//! step. [`SensitivityTable`] accumulates them in whatever order the
//! drivers extract them, folding collisions by summation, and
//! [`SensitivityWriter`] streams the result as tab-separated rows
//! grouped by ascending step.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod table;
mod writer;

pub use table::{SensitivityRow, SensitivityTable};
pub use writer::{SensitivityWriter, WriteError};
