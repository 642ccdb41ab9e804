//! Reverse-mode differentiation seam for physics modules.

use brume_core::{Tape, TapeBinding, TapeError};
use smallvec::SmallVec;

/// Design-variable sensitivities pulled off a tape. Most modules expose
/// a handful of scalar variables, so the vector stays inline.
pub type VariableSens = SmallVec<[f64; 8]>;

/// Capability of modules that can be differentiated in reverse mode.
///
/// Registration methods are called only while the shared [`Tape`] is
/// recording; each returns the [`TapeBinding`] describing the block the
/// module occupies, which the module keeps for seeding and extraction.
/// Bindings die when the tape is reset, so modules must drop them on
/// re-registration rather than reuse them across recordings.
pub trait AdjointModule {
    /// Names of the module's free design variables, in the order used
    /// by sensitivity output headers. Empty when the module has none.
    fn variable_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Capture the converged primal state so later replays can restore
    /// it.
    fn store_primal(&mut self);

    /// Restore the working state captured by
    /// [`AdjointModule::store_primal`]. Idempotent.
    fn restore_primal(&mut self);

    /// Register the module's solution as tape inputs.
    fn register_solution(&mut self, tape: &mut Tape) -> Result<TapeBinding, TapeError>;

    /// Register scalar design variables as tape inputs.
    fn register_variables(&mut self, tape: &mut Tape) -> Result<TapeBinding, TapeError>;

    /// Register boundary-displacement design variables as tape inputs.
    /// Modules without surface parameters register an empty block.
    fn register_boundary_displacements(
        &mut self,
        tape: &mut Tape,
    ) -> Result<TapeBinding, TapeError> {
        tape.register_input(0)
    }

    /// Register the module's objective and solution outputs.
    fn register_output(&mut self, tape: &mut Tape) -> Result<TapeBinding, TapeError>;

    /// Write the objective weight and the stored adjoint solution into
    /// the registered outputs before a backward sweep.
    fn seed_outputs(&mut self, tape: &Tape);

    /// Pull the adjoint of the solution off the tape and adopt it as the
    /// module's adjoint state. Returns the raw magnitude of the change
    /// against the previous adjoint state.
    fn extract_solution(&mut self, tape: &Tape) -> f64;

    /// Pull design-variable adjoints off the tape, in
    /// [`AdjointModule::variable_names`] order.
    fn extract_variables(&mut self, tape: &Tape) -> VariableSens {
        let _ = tape;
        SmallVec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Minimal {
        stored: bool,
    }

    impl AdjointModule for Minimal {
        fn store_primal(&mut self) {
            self.stored = true;
        }

        fn restore_primal(&mut self) {}

        fn register_solution(&mut self, tape: &mut Tape) -> Result<TapeBinding, TapeError> {
            tape.register_input(4)
        }

        fn register_variables(&mut self, tape: &mut Tape) -> Result<TapeBinding, TapeError> {
            tape.register_input(0)
        }

        fn register_output(&mut self, tape: &mut Tape) -> Result<TapeBinding, TapeError> {
            tape.register_output(1)
        }

        fn seed_outputs(&mut self, _tape: &Tape) {}

        fn extract_solution(&mut self, _tape: &Tape) -> f64 {
            0.0
        }
    }

    #[test]
    fn defaults_cover_optional_surfaces() {
        let mut tape = Tape::new();
        tape.start().unwrap();
        let mut module = Minimal { stored: false };
        let binding = module.register_boundary_displacements(&mut tape).unwrap();
        assert_eq!(binding.len, 0);
        assert!(module.variable_names().is_empty());
        tape.stop().unwrap();
        assert!(module.extract_variables(&tape).is_empty());
    }
}
