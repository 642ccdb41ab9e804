//! The outer time loop: physical steps, coupling iterations, history
//! rotation, and restart snapshots.

use std::time::Instant;

use brume_core::{ConvergenceTable, IterationClock};
use brume_domain::Communicator;
use brume_physics::{MemoryStorage, SnapshotKey, SolveContext, TimeSlot, ZoneSet};

use crate::config::{ConfigError, SolveConfig};
use crate::controller::{IterationController, SolveError, SolveReport};
use crate::metrics::SolveMetrics;

// ── Zone pairing ────────────────────────────────────────────────────────────

/// One zone paired with the controller that solves it.
pub struct ZoneUnit {
    /// The zone's modules and mesh.
    pub zone: ZoneSet,
    /// The solve strategy driving the zone.
    pub controller: Box<dyn IterationController>,
}

impl ZoneUnit {
    /// Pair a zone with its controller.
    pub fn new(zone: ZoneSet, controller: Box<dyn IterationController>) -> Self {
        Self { zone, controller }
    }
}

// ── Run report ──────────────────────────────────────────────────────────────

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct TimeLoopReport {
    /// Physical time steps completed.
    pub steps_completed: u64,
    /// Per-zone solve reports of the last coupling pass.
    pub final_reports: Vec<SolveReport>,
    /// Iteration-limit exhaustions over the whole run, inner and outer.
    pub limit_hits: u64,
}

impl TimeLoopReport {
    /// Whether every zone converged in the final coupling pass.
    pub fn all_converged(&self) -> bool {
        self.final_reports.iter().all(SolveReport::converged)
    }
}

// ── Time loop ───────────────────────────────────────────────────────────────

/// Drives zones through physical time.
///
/// Each step runs the coupling loop (every zone's controller solves
/// once per outer iteration, until all zones report convergence or the
/// outer limit is reached), emits on the outer boundary, rotates time
/// histories through the controllers' update phase, and snapshots every
/// module's converged solution into the restart store under the step
/// index. Ranks leave the step together through a barrier.
///
/// Iteration-limit exhaustion is a warning, not an error: the run
/// continues and the exhaustion is counted. A module failure aborts the
/// run immediately.
pub struct TimeLoop {
    config: SolveConfig,
    metrics: SolveMetrics,
}

impl TimeLoop {
    /// Build a loop from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] the configuration violates.
    pub fn new(config: SolveConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            metrics: SolveMetrics::default(),
        })
    }

    /// The configuration the loop runs under.
    pub fn config(&self) -> &SolveConfig {
        &self.config
    }

    /// Metrics accumulated so far.
    pub fn metrics(&self) -> &SolveMetrics {
        &self.metrics
    }

    /// Run all configured time steps over `units`.
    ///
    /// # Errors
    ///
    /// The first [`SolveError`] any controller reports; the run aborts
    /// at that point with no further update or snapshot for the step.
    pub fn run(
        &mut self,
        units: &mut [ZoneUnit],
        comm: &dyn Communicator,
        storage: &mut MemoryStorage,
    ) -> Result<TimeLoopReport, SolveError> {
        let run_start = Instant::now();
        let result = self.run_steps(units, comm, storage);
        self.metrics.total_us += run_start.elapsed().as_micros() as u64;
        result
    }

    fn run_steps(
        &mut self,
        units: &mut [ZoneUnit],
        comm: &dyn Communicator,
        storage: &mut MemoryStorage,
    ) -> Result<TimeLoopReport, SolveError> {
        let multizone = units.len() > 1;
        let marching = self.config.marching;
        let mut table = ConvergenceTable::new();
        let mut clock = IterationClock::new(self.config.dt);
        let mut limit_hits = 0u64;
        let mut final_reports = Vec::new();
        let mut steps_completed = 0u64;

        tracing::debug!(
            steps = self.config.time_steps,
            zones = units.len(),
            marching = %marching,
            "starting time loop"
        );

        for _ in 0..self.config.time_steps {
            let mut reports = Vec::with_capacity(units.len());
            for outer in 0..self.config.outer_limit {
                clock.set_outer_iter(outer);
                reports.clear();

                let solve_start = Instant::now();
                for unit in units.iter_mut() {
                    let mut ctx =
                        SolveContext::new(comm, &mut table, &mut clock, marching, multizone);
                    let report =
                        unit.controller
                            .solve(&mut unit.zone, &mut ctx, self.config.inner_limit)?;
                    self.metrics.solves += 1;
                    self.metrics.inner_iterations += report.iterations;
                    if !report.converged() {
                        self.metrics.limit_hits += 1;
                        limit_hits += 1;
                        tracing::warn!(
                            zone = %unit.zone.key(),
                            controller = unit.controller.name(),
                            iterations = report.iterations,
                            "inner iteration limit reached without convergence"
                        );
                    }
                    reports.push(report);
                }
                self.metrics.solve_us += solve_start.elapsed().as_micros() as u64;

                if reports.iter().all(SolveReport::converged) {
                    break;
                }
                if multizone && outer + 1 == self.config.outer_limit {
                    self.metrics.limit_hits += 1;
                    limit_hits += 1;
                    tracing::warn!(
                        step = clock.time_iter(),
                        "coupling iterations exhausted before all zones converged"
                    );
                }
            }

            // Emission on the outer boundary. Single-zone steady runs
            // already emitted inside solve.
            if multizone || !marching.is_steady() {
                for unit in units.iter_mut() {
                    let mut ctx =
                        SolveContext::new(comm, &mut table, &mut clock, marching, multizone);
                    unit.controller.output(&mut unit.zone, &mut ctx)?;
                }
            }

            let update_start = Instant::now();
            for unit in units.iter_mut() {
                let mut ctx = SolveContext::new(comm, &mut table, &mut clock, marching, multizone);
                unit.controller.update(&mut unit.zone, &mut ctx)?;
            }
            self.metrics.update_us += update_start.elapsed().as_micros() as u64;

            let snapshot_start = Instant::now();
            let step = clock.time_iter();
            for unit in units.iter() {
                Self::snapshot_zone(&unit.zone, step, storage);
            }
            self.metrics.snapshot_us += snapshot_start.elapsed().as_micros() as u64;

            final_reports = reports;
            steps_completed += 1;
            self.metrics.steps_completed = steps_completed;
            clock.advance_time();
            comm.barrier()?;
        }

        Ok(TimeLoopReport {
            steps_completed,
            final_reports,
            limit_hits,
        })
    }

    /// Persist every module solution of `zone`, and the mesh coordinates
    /// when the mesh moves, under `step`.
    fn snapshot_zone(zone: &ZoneSet, step: u64, storage: &mut MemoryStorage) {
        let zone_id = zone.key().zone;
        for kind in zone.kinds() {
            if let Some(history) = zone.history(kind) {
                if let Some(data) = history.slot(TimeSlot::Current, 0) {
                    storage.store(SnapshotKey::state(zone_id, kind, step), data.to_vec());
                }
            }
        }
        if zone.mesh().is_moving() {
            if let Some(coords) = zone.mesh().coords().slot(TimeSlot::Current, 0) {
                storage.store(SnapshotKey::coordinates(zone_id, step), coords.to_vec());
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use brume_core::{DomainKey, InstanceId, ModuleError, ModuleKind, TimeMarching, ZoneId};
    use brume_domain::SoloComm;
    use brume_physics::{MeshState, RestartStorage, StepReport};
    use brume_test_utils::{CallLog, SyntheticModule};

    use crate::controller::{MonitorRecord, StopReason};
    use crate::fluid::FluidController;
    use crate::heat::HeatController;

    /// Controller that converges immediately and logs its emissions.
    struct Counting {
        label: String,
        log: CallLog,
    }

    impl Counting {
        fn new(label: &str, log: &CallLog) -> Self {
            Self {
                label: label.to_string(),
                log: log.clone(),
            }
        }
    }

    impl IterationController for Counting {
        fn name(&self) -> &str {
            &self.label
        }

        fn records(&self) -> &[MonitorRecord] {
            &[]
        }

        fn monitor(
            &mut self,
            _zone: &mut ZoneSet,
            _ctx: &mut SolveContext<'_>,
            _report: &StepReport,
        ) -> bool {
            true
        }

        fn output(
            &mut self,
            _zone: &mut ZoneSet,
            _ctx: &mut SolveContext<'_>,
        ) -> Result<(), SolveError> {
            self.log.record(&format!("{}.output", self.label));
            Ok(())
        }
    }

    fn zone_of(module: SyntheticModule, zone: u16) -> ZoneSet {
        let points = module.points();
        let marching = module.marching();
        ZoneSet::new(
            DomainKey::new(ZoneId(zone), InstanceId(0)),
            vec![module.boxed()],
            MeshState::new(points, marching, false),
        )
        .unwrap()
    }

    fn fluid_unit(residuals: Vec<f64>, marching: TimeMarching) -> ZoneUnit {
        let module =
            SyntheticModule::new(ModuleKind::Flow, 4, marching).with_residuals(residuals);
        ZoneUnit::new(zone_of(module, 0), Box::new(FluidController::new(-8.0)))
    }

    // ── Steady ──────────────────────────────────────────────────────────────

    #[test]
    fn steady_single_zone_converges_and_snapshots() {
        let mut units = vec![fluid_unit(vec![1e-3, 1e-9], TimeMarching::Steady)];
        let mut storage = MemoryStorage::new();
        let mut time_loop = TimeLoop::new(SolveConfig::default()).unwrap();

        let report = time_loop
            .run(&mut units, &SoloComm, &mut storage)
            .unwrap();
        assert_eq!(report.steps_completed, 1);
        assert!(report.all_converged());
        assert_eq!(time_loop.metrics().solves, 1);
        assert_eq!(time_loop.metrics().inner_iterations, 2);

        // The converged state is stored under step 0.
        let key = SnapshotKey::state(ZoneId(0), ModuleKind::Flow, 0);
        assert_eq!(storage.load(key), Ok(vec![2.0; 4]));
        assert_eq!(storage.len(), 1);
    }

    // ── Unsteady ────────────────────────────────────────────────────────────

    #[test]
    fn dual_time_rotates_histories_and_snapshots_each_step() {
        let mut units = vec![fluid_unit(vec![1e-3, 1e-9], TimeMarching::DualTime2nd)];
        let mut storage = MemoryStorage::new();
        let config = SolveConfig {
            marching: TimeMarching::DualTime2nd,
            time_steps: 3,
            ..SolveConfig::default()
        };
        let mut time_loop = TimeLoop::new(config).unwrap();

        let report = time_loop
            .run(&mut units, &SoloComm, &mut storage)
            .unwrap();
        assert_eq!(report.steps_completed, 3);
        // Two iterations for the first step, one for each later step.
        assert_eq!(time_loop.metrics().inner_iterations, 4);
        assert_eq!(storage.len(), 3);
        let key = SnapshotKey::state(ZoneId(0), ModuleKind::Flow, 1);
        assert_eq!(storage.load(key), Ok(vec![3.0; 4]));

        // Updates rotated the two previous steps into the history.
        let history = units[0].zone.history(ModuleKind::Flow).unwrap();
        assert_eq!(history.slot(TimeSlot::TimeN, 0), Some(&[4.0; 4][..]));
        assert_eq!(history.slot(TimeSlot::TimeN1, 0), Some(&[3.0; 4][..]));
    }

    #[test]
    fn unsteady_single_zone_emits_once_per_step() {
        let log = CallLog::new();
        let module = SyntheticModule::new(ModuleKind::Flow, 4, TimeMarching::DualTime1st);
        let mut units = vec![ZoneUnit::new(
            zone_of(module, 0),
            Box::new(Counting::new("a", &log)),
        )];
        let config = SolveConfig {
            marching: TimeMarching::DualTime1st,
            time_steps: 2,
            ..SolveConfig::default()
        };
        let mut storage = MemoryStorage::new();
        TimeLoop::new(config)
            .unwrap()
            .run(&mut units, &SoloComm, &mut storage)
            .unwrap();

        assert_eq!(log.events(), vec!["a.output", "a.output"]);
    }

    // ── Multizone coupling ──────────────────────────────────────────────────

    #[test]
    fn multizone_emits_each_zone_on_the_outer_boundary() {
        let log = CallLog::new();
        let flow = SyntheticModule::new(ModuleKind::Flow, 4, TimeMarching::Steady);
        let heat = SyntheticModule::new(ModuleKind::Heat, 4, TimeMarching::Steady);
        let mut units = vec![
            ZoneUnit::new(zone_of(flow, 0), Box::new(Counting::new("a", &log))),
            ZoneUnit::new(zone_of(heat, 1), Box::new(Counting::new("b", &log))),
        ];
        let mut storage = MemoryStorage::new();
        let mut time_loop = TimeLoop::new(SolveConfig::default()).unwrap();

        let report = time_loop
            .run(&mut units, &SoloComm, &mut storage)
            .unwrap();
        assert!(report.all_converged());
        assert_eq!(log.events(), vec!["a.output", "b.output"]);
        // One snapshot per zone.
        assert_eq!(storage.len(), 2);
    }

    #[test]
    fn coupling_iterates_until_every_zone_converges() {
        // Zone 0 needs two coupling passes at one inner iteration each;
        // zone 1 converges from the start.
        let flow = SyntheticModule::new(ModuleKind::Flow, 4, TimeMarching::Steady)
            .with_residuals(vec![1.0, 1e-9]);
        let heat = SyntheticModule::new(ModuleKind::Heat, 4, TimeMarching::Steady)
            .with_residuals(vec![1e-9]);
        let mut units = vec![
            ZoneUnit::new(zone_of(flow, 0), Box::new(FluidController::new(-8.0))),
            ZoneUnit::new(zone_of(heat, 1), Box::new(HeatController::new(-8.0))),
        ];
        let config = SolveConfig {
            outer_limit: 10,
            inner_limit: 1,
            ..SolveConfig::default()
        };
        let mut storage = MemoryStorage::new();
        let mut time_loop = TimeLoop::new(config).unwrap();

        let report = time_loop
            .run(&mut units, &SoloComm, &mut storage)
            .unwrap();
        assert!(report.all_converged());
        assert_eq!(time_loop.metrics().solves, 4);

        let records = units[0].controller.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].outer_iter, 0);
        assert_eq!(records[1].outer_iter, 1);
    }

    // ── Limits and failures ─────────────────────────────────────────────────

    #[test]
    fn inner_limit_exhaustion_is_counted_not_fatal() {
        let mut units = vec![fluid_unit(vec![1.0], TimeMarching::Steady)];
        let config = SolveConfig {
            inner_limit: 5,
            ..SolveConfig::default()
        };
        let mut storage = MemoryStorage::new();
        let mut time_loop = TimeLoop::new(config).unwrap();

        let report = time_loop
            .run(&mut units, &SoloComm, &mut storage)
            .unwrap();
        assert_eq!(report.steps_completed, 1);
        assert!(!report.all_converged());
        assert_eq!(report.limit_hits, 1);
        assert_eq!(report.final_reports[0].stop, StopReason::InnerLimit);
        assert_eq!(time_loop.metrics().inner_iterations, 5);
        assert_eq!(time_loop.metrics().limit_hits, 1);
    }

    #[test]
    fn module_failure_aborts_the_run() {
        let module = SyntheticModule::new(ModuleKind::Flow, 4, TimeMarching::Steady)
            .with_failure_at(0);
        let mut units = vec![ZoneUnit::new(
            zone_of(module, 0),
            Box::new(FluidController::new(-8.0)),
        )];
        let mut storage = MemoryStorage::new();
        let mut time_loop = TimeLoop::new(SolveConfig::default()).unwrap();

        let result = time_loop.run(&mut units, &SoloComm, &mut storage);
        assert!(matches!(
            result,
            Err(SolveError::Module(ModuleError::Failed { .. }))
        ));
        assert_eq!(time_loop.metrics().steps_completed, 0);
        assert!(storage.is_empty());
    }
}
