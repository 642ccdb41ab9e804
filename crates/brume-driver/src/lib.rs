//! Iteration controllers and the outer time loop.
//!
//! Each zone is driven by an [`IterationController`] matched to its
//! primary system: plain fluid, turbomachinery, thermal, or structural.
//! Controllers share one driving solve loop and differ in what an
//! iteration does and how convergence is judged; [`controller_for`]
//! picks the right one from the run configuration. The [`TimeLoop`]
//! runs controllers across physical time, couples multiple zones
//! through outer iterations, and persists each converged step into the
//! restart store for reverse-time consumers.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod config;
mod controller;
mod fluid;
mod heat;
mod metrics;
mod structural;
mod timeloop;
mod turbo;

pub use config::{ConfigError, RampConfig, SolveConfig, StructuralConfig};
pub use controller::{IterationController, MonitorRecord, SolveError, SolveReport, StopReason};
pub use fluid::FluidController;
pub use heat::HeatController;
pub use metrics::SolveMetrics;
pub use structural::StructuralController;
pub use timeloop::{TimeLoop, TimeLoopReport, ZoneUnit};
pub use turbo::TurboController;

use brume_core::ModuleKind;
use brume_physics::ZoneSet;

/// Pick the controller for a zone from its primary system and the run
/// configuration.
///
/// Flow zones get the fluid controller, or the turbomachinery variant
/// when span averaging is enabled. Thermal zones get the heat
/// controller. Structural zones require structural settings in the
/// configuration.
///
/// # Errors
///
/// [`ConfigError::MissingStructuralConfig`] for a structural zone
/// without structural settings, [`ConfigError::UnsupportedPrimary`]
/// when no controller exists for the zone's primary system.
pub fn controller_for(
    zone: &ZoneSet,
    config: &SolveConfig,
) -> Result<Box<dyn IterationController>, ConfigError> {
    match zone.primary_kind() {
        ModuleKind::Flow => {
            if config.turbo {
                Ok(Box::new(TurboController::new(config.threshold)))
            } else {
                Ok(Box::new(FluidController::new(config.threshold)))
            }
        }
        ModuleKind::Heat => Ok(Box::new(HeatController::new(config.threshold))),
        ModuleKind::Structure => match &config.structural {
            Some(structural) => Ok(Box::new(StructuralController::new(structural.clone()))),
            None => Err(ConfigError::MissingStructuralConfig),
        },
        kind => Err(ConfigError::UnsupportedPrimary { kind }),
    }
}
