//! Adjoint run configuration and validation.

use std::error::Error;
use std::fmt;

use brume_core::RecordingKind;

/// Configuration of an adjoint solve.
#[derive(Clone, Debug, PartialEq)]
pub struct AdjointConfig {
    /// Recording kind differentiated by the main iteration.
    pub main_kind: RecordingKind,
    /// Kind recorded once after the main iteration converged, to pull
    /// geometric sensitivities off a coordinate tape. `None` skips the
    /// secondary recording and extracts variables from the main tape.
    pub geometry_kind: Option<RecordingKind>,
    /// Number of recorded primal time steps. The final stored step of
    /// the forward run carries this index; the adjoint walks backward
    /// from it. Ignored for steady runs.
    pub total_steps: u64,
    /// Adjoint residual convergence threshold as `log10`. Default: `-8`.
    pub threshold: f64,
}

impl Default for AdjointConfig {
    fn default() -> Self {
        Self {
            main_kind: RecordingKind::SolutionVariables,
            geometry_kind: Some(RecordingKind::MeshCoords),
            total_steps: 1,
            threshold: -8.0,
        }
    }
}

impl AdjointConfig {
    /// Validate all structural invariants.
    pub fn validate(&self) -> Result<(), AdjointConfigError> {
        // 1. The convergence threshold must be comparable.
        if !self.threshold.is_finite() {
            return Err(AdjointConfigError::InvalidThreshold {
                value: self.threshold,
            });
        }
        // 2. A secondary recording exists to differentiate geometry.
        if let Some(kind) = self.geometry_kind {
            if !kind.registers_coordinates() {
                return Err(AdjointConfigError::NonGeometricSecondary { kind });
            }
        }
        Ok(())
    }
}

// ── Errors ──────────────────────────────────────────────────────────────────

/// Errors detected during [`AdjointConfig::validate`].
#[derive(Debug, Clone, PartialEq)]
pub enum AdjointConfigError {
    /// The convergence threshold is NaN or infinite.
    InvalidThreshold {
        /// The invalid value.
        value: f64,
    },
    /// The secondary recording kind does not register coordinates.
    NonGeometricSecondary {
        /// The offending kind.
        kind: RecordingKind,
    },
}

impl fmt::Display for AdjointConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidThreshold { value } => {
                write!(f, "adjoint convergence threshold must be finite, got {value}")
            }
            Self::NonGeometricSecondary { kind } => {
                write!(
                    f,
                    "secondary recording must register coordinates, got '{kind}'"
                )
            }
        }
    }
}

impl Error for AdjointConfigError {}

// ── Tests ───────────────────────────────────────────────────────────────────
