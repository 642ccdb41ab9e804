//! Run configuration and validation.

use std::error::Error;
use std::fmt;

use brume_core::{ModuleKind, TimeMarching};

// ── Structural configuration ────────────────────────────────────────────────

/// Incremental-load settings for a nonlinear structural solve.
#[derive(Clone, Debug, PartialEq)]
pub struct RampConfig {
    /// Residual-class criteria as `log10` thresholds, in the order
    /// displacement, force, energy. The two-iteration probe compares
    /// against these to decide whether ramping is needed.
    pub criteria: [f64; 3],
    /// Number of equal load increments when the probe fails. Minimum 1.
    pub increments: u32,
}

/// Configuration of a structural solve.
#[derive(Clone, Debug, PartialEq)]
pub struct StructuralConfig {
    /// Whether the problem is geometrically nonlinear. Linear problems
    /// finish in a single iteration.
    pub nonlinear: bool,
    /// Newton-Raphson stop tolerances as `log10` thresholds, in the
    /// order displacement, force, energy. Default: `-9` each.
    pub tolerances: [f64; 3],
    /// Incremental loading; `None` applies the full load directly.
    pub ramp: Option<RampConfig>,
}

impl Default for StructuralConfig {
    fn default() -> Self {
        Self {
            nonlinear: false,
            tolerances: [-9.0; 3],
            ramp: None,
        }
    }
}

// ── Solve configuration ─────────────────────────────────────────────────────

/// Complete configuration for a run.
#[derive(Clone, Debug, PartialEq)]
pub struct SolveConfig {
    /// Time-marching scheme shared by every zone.
    pub marching: TimeMarching,
    /// Physical step size in seconds. Ignored for steady runs.
    pub dt: f64,
    /// Number of physical time steps. `1` for steady runs.
    pub time_steps: u64,
    /// Coupling iterations per time step when more than one zone runs.
    /// Default: 1.
    pub outer_limit: u64,
    /// Inner iterations per solve before giving up. Default: 100.
    pub inner_limit: u64,
    /// Residual convergence threshold as `log10`. Default: `-8`.
    pub threshold: f64,
    /// Whether primary flow zones run turbomachinery span averaging.
    pub turbo: bool,
    /// Structural solve settings; required when a zone's primary system
    /// is structural.
    pub structural: Option<StructuralConfig>,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            marching: TimeMarching::Steady,
            dt: 1e-3,
            time_steps: 1,
            outer_limit: 1,
            inner_limit: 100,
            threshold: -8.0,
            turbo: false,
            structural: None,
        }
    }
}

impl SolveConfig {
    /// Validate all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1. Iteration limits must allow at least one pass.
        if self.inner_limit == 0 {
            return Err(ConfigError::InnerLimitZero);
        }
        if self.outer_limit == 0 {
            return Err(ConfigError::OuterLimitZero);
        }
        if self.time_steps == 0 {
            return Err(ConfigError::NoTimeSteps);
        }
        // 2. Unsteady runs need a usable physical step size.
        if self.marching.is_dual_time() && (!self.dt.is_finite() || self.dt <= 0.0) {
            return Err(ConfigError::InvalidDt { value: self.dt });
        }
        // 3. The convergence threshold must be comparable.
        if !self.threshold.is_finite() {
            return Err(ConfigError::InvalidThreshold {
                value: self.threshold,
            });
        }
        // 4. Structural settings, when present.
        if let Some(structural) = &self.structural {
            for &tolerance in &structural.tolerances {
                if !tolerance.is_finite() {
                    return Err(ConfigError::InvalidTolerance { value: tolerance });
                }
            }
            if let Some(ramp) = &structural.ramp {
                if !structural.nonlinear {
                    return Err(ConfigError::RampRequiresNonlinear);
                }
                if ramp.increments == 0 {
                    return Err(ConfigError::NoIncrements);
                }
                for &criterion in &ramp.criteria {
                    if !criterion.is_finite() {
                        return Err(ConfigError::InvalidCriterion { value: criterion });
                    }
                }
            }
        }
        Ok(())
    }
}

// ── Errors ──────────────────────────────────────────────────────────────────

/// Errors detected during [`SolveConfig::validate`] or controller
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// `inner_limit` is zero.
    InnerLimitZero,
    /// `outer_limit` is zero.
    OuterLimitZero,
    /// `time_steps` is zero.
    NoTimeSteps,
    /// `dt` is not finite and positive for an unsteady run.
    InvalidDt {
        /// The invalid value.
        value: f64,
    },
    /// The convergence threshold is NaN or infinite.
    InvalidThreshold {
        /// The invalid value.
        value: f64,
    },
    /// A Newton-Raphson tolerance is NaN or infinite.
    InvalidTolerance {
        /// The invalid value.
        value: f64,
    },
    /// An incremental-load criterion is NaN or infinite.
    InvalidCriterion {
        /// The invalid value.
        value: f64,
    },
    /// Incremental loading configured with zero increments.
    NoIncrements,
    /// Incremental loading configured on a linear problem.
    RampRequiresNonlinear,
    /// A zone's primary system is structural but no structural
    /// configuration was given.
    MissingStructuralConfig,
    /// No controller exists for a zone with this primary system.
    UnsupportedPrimary {
        /// The offending kind.
        kind: ModuleKind,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InnerLimitZero => write!(f, "inner_limit must be at least 1"),
            Self::OuterLimitZero => write!(f, "outer_limit must be at least 1"),
            Self::NoTimeSteps => write!(f, "time_steps must be at least 1"),
            Self::InvalidDt { value } => {
                write!(f, "dt must be finite and positive for unsteady runs, got {value}")
            }
            Self::InvalidThreshold { value } => {
                write!(f, "convergence threshold must be finite, got {value}")
            }
            Self::InvalidTolerance { value } => {
                write!(f, "Newton tolerance must be finite, got {value}")
            }
            Self::InvalidCriterion { value } => {
                write!(f, "incremental-load criterion must be finite, got {value}")
            }
            Self::NoIncrements => write!(f, "incremental loading needs at least 1 increment"),
            Self::RampRequiresNonlinear => {
                write!(f, "incremental loading requires a nonlinear problem")
            }
            Self::MissingStructuralConfig => {
                write!(f, "structural zone present but no structural config given")
            }
            Self::UnsupportedPrimary { kind } => {
                write!(f, "no controller available for primary system '{kind}'")
            }
        }
    }
}

impl Error for ConfigError {}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn nonlinear_with_ramp() -> SolveConfig {
        SolveConfig {
            structural: Some(StructuralConfig {
                nonlinear: true,
                tolerances: [-9.0; 3],
                ramp: Some(RampConfig {
                    criteria: [-6.0; 3],
                    increments: 4,
                }),
            }),
            ..SolveConfig::default()
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(SolveConfig::default().validate().is_ok());
    }

    #[test]
    fn ramped_nonlinear_config_is_valid() {
        assert!(nonlinear_with_ramp().validate().is_ok());
    }

    #[test]
    fn zero_inner_limit_fails() {
        let cfg = SolveConfig {
            inner_limit: 0,
            ..SolveConfig::default()
        };
        match cfg.validate() {
            Err(ConfigError::InnerLimitZero) => {}
            other => panic!("expected InnerLimitZero, got {other:?}"),
        }
    }

    #[test]
    fn steady_run_ignores_dt() {
        let cfg = SolveConfig {
            dt: f64::NAN,
            ..SolveConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn unsteady_run_rejects_bad_dt() {
        let cfg = SolveConfig {
            marching: TimeMarching::DualTime2nd,
            dt: 0.0,
            ..SolveConfig::default()
        };
        match cfg.validate() {
            Err(ConfigError::InvalidDt { .. }) => {}
            other => panic!("expected InvalidDt, got {other:?}"),
        }
    }

    #[test]
    fn nan_threshold_fails() {
        let cfg = SolveConfig {
            threshold: f64::NAN,
            ..SolveConfig::default()
        };
        match cfg.validate() {
            Err(ConfigError::InvalidThreshold { .. }) => {}
            other => panic!("expected InvalidThreshold, got {other:?}"),
        }
    }

    #[test]
    fn ramp_on_linear_problem_fails() {
        let mut cfg = nonlinear_with_ramp();
        if let Some(structural) = &mut cfg.structural {
            structural.nonlinear = false;
        }
        match cfg.validate() {
            Err(ConfigError::RampRequiresNonlinear) => {}
            other => panic!("expected RampRequiresNonlinear, got {other:?}"),
        }
    }

    #[test]
    fn zero_increments_fails() {
        let mut cfg = nonlinear_with_ramp();
        if let Some(structural) = &mut cfg.structural {
            if let Some(ramp) = &mut structural.ramp {
                ramp.increments = 0;
            }
        }
        match cfg.validate() {
            Err(ConfigError::NoIncrements) => {}
            other => panic!("expected NoIncrements, got {other:?}"),
        }
    }

    #[test]
    fn infinite_criterion_fails() {
        let mut cfg = nonlinear_with_ramp();
        if let Some(structural) = &mut cfg.structural {
            if let Some(ramp) = &mut structural.ramp {
                ramp.criteria[1] = f64::INFINITY;
            }
        }
        match cfg.validate() {
            Err(ConfigError::InvalidCriterion { .. }) => {}
            other => panic!("expected InvalidCriterion, got {other:?}"),
        }
    }
}
