//! Primal time-history rotation for reverse-time walks.
//!
//! An unsteady adjoint marches backward through the recorded primal
//! run, so each adjoint step must see the primal solutions of the step
//! it differentiates in the same slots the forward run kept them in.
//! The rotator loads what it must from restart storage and shifts the
//! rest in memory; a step with no stored solution is substituted by the
//! module's default state and reported, never an error.

use std::sync::Arc;

use brume_core::{DirectStep, TimeMarching, ZoneId};
use brume_physics::{
    MeshState, PhysicsModule, RestartStorage, SnapshotKey, SolutionHistory, ZoneSet,
};

// ── Report ──────────────────────────────────────────────────────────────────

/// What one rotation did, in request order.
#[derive(Clone, Debug, PartialEq)]
pub struct RotationReport {
    /// Adjoint time step the rotation served.
    pub time_iter: u64,
    /// Position in the recorded primal run after the rotation.
    pub direct: DirectStep,
    /// Keys successfully loaded from storage, in request order.
    pub loads: Vec<SnapshotKey>,
    /// Loads substituted by a default state: virtual steps, storage
    /// misses, and shape mismatches.
    pub substitutions: u32,
}

// ── Rotator ─────────────────────────────────────────────────────────────────

/// Supplies time-ordered primal buffers for one adjoint step.
///
/// The direct step counts backward from the final recorded primal step:
/// `direct = total_steps - time_iter`. The first adjoint step loads
/// every required level from storage; later steps load only the oldest
/// level and shift the rest down in memory, which must reproduce the
/// forward marching order exactly.
pub struct HistoryRotator {
    storage: Arc<dyn RestartStorage>,
    total_steps: u64,
}

impl HistoryRotator {
    /// A rotator over the primal run recorded in `storage`, whose final
    /// step carries index `total_steps`.
    pub fn new(storage: Arc<dyn RestartStorage>, total_steps: u64) -> Self {
        Self {
            storage,
            total_steps,
        }
    }

    /// Index of the final recorded primal step.
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// The primal step differentiated at adjoint step `time_iter`.
    pub fn direct_step(&self, time_iter: u64) -> DirectStep {
        DirectStep(self.total_steps as i64 - time_iter as i64)
    }

    /// Rotate every module history of `zone` (and the mesh coordinates
    /// when the grid moves) to the primal step differentiated at
    /// `time_iter`.
    ///
    /// Cold start (`time_iter == 0`) loads every retained level oldest
    /// first; warm steps load only the oldest level and rotate the rest
    /// through the scratch buffer. Steady histories hold no time levels
    /// and are left alone.
    pub fn rotate(&self, zone: &mut ZoneSet, time_iter: u64) -> RotationReport {
        let direct = self.direct_step(time_iter);
        let mut report = RotationReport {
            time_iter,
            direct,
            loads: Vec::new(),
            substitutions: 0,
        };
        let zone_id = zone.key().zone;
        let cold = time_iter == 0;

        for module in zone.modules_mut() {
            match module.history().marching() {
                TimeMarching::Steady => {}
                TimeMarching::DualTime1st if cold => {
                    self.load_state(zone_id, module, direct.back(1), &mut report);
                    module.history_mut().push_time_n();
                    self.load_state(zone_id, module, direct, &mut report);
                }
                TimeMarching::DualTime1st => {
                    self.load_state(zone_id, module, direct.back(1), &mut report);
                    let history = module.history_mut();
                    history.stash_old();
                    history.set_current_from_time_n();
                    history.set_time_n_from_old();
                }
                TimeMarching::DualTime2nd if cold => {
                    self.load_state(zone_id, module, direct.back(2), &mut report);
                    let history = module.history_mut();
                    history.push_time_n();
                    history.push_time_n1();
                    self.load_state(zone_id, module, direct.back(1), &mut report);
                    module.history_mut().push_time_n();
                    self.load_state(zone_id, module, direct, &mut report);
                }
                TimeMarching::DualTime2nd => {
                    self.load_state(zone_id, module, direct.back(2), &mut report);
                    let history = module.history_mut();
                    history.stash_old();
                    history.set_current_from_time_n();
                    history.set_time_n_from_time_n1();
                    history.set_time_n1_from_old();
                }
            }
        }

        if zone.mesh().is_moving() {
            self.rotate_coordinates(zone_id, zone.mesh_mut(), direct, cold, &mut report);
        }

        tracing::debug!(
            zone = %zone.key(),
            time_iter,
            direct = %direct,
            loads = report.loads.len(),
            substitutions = report.substitutions,
            "rotated primal histories"
        );
        report
    }

    /// Reload the pair of primal steps a dynamic structural adjoint
    /// reads each step: `direct - 1` into `t_n` and `direct` into the
    /// working solution, from storage every time. Steady histories are
    /// left alone; the mesh never takes part.
    pub fn reload(&self, zone: &mut ZoneSet, time_iter: u64) -> RotationReport {
        let direct = self.direct_step(time_iter);
        let mut report = RotationReport {
            time_iter,
            direct,
            loads: Vec::new(),
            substitutions: 0,
        };
        let zone_id = zone.key().zone;

        for module in zone.modules_mut() {
            if module.history().marching().is_steady() {
                continue;
            }
            self.load_state(zone_id, module, direct.back(1), &mut report);
            module.history_mut().push_time_n();
            self.load_state(zone_id, module, direct, &mut report);
        }

        tracing::debug!(
            zone = %zone.key(),
            time_iter,
            direct = %direct,
            loads = report.loads.len(),
            substitutions = report.substitutions,
            "reloaded primal displacement pair"
        );
        report
    }

    /// Load one module's solution at `step` into the working slot, or
    /// substitute the module's default state when the step is virtual,
    /// missing, or the wrong shape.
    fn load_state(
        &self,
        zone: ZoneId,
        module: &mut dyn PhysicsModule,
        step: DirectStep,
        report: &mut RotationReport,
    ) {
        let Some(index) = step.stored_index() else {
            tracing::warn!(
                module = module.name(),
                step = %step,
                "virtual primal step; substituting the default state"
            );
            module.apply_default_state();
            report.substitutions += 1;
            return;
        };
        let key = SnapshotKey::state(zone, module.kind(), index);
        match self.storage.load(key) {
            Ok(data) => {
                if module.history_mut().set_current(0, &data) {
                    report.loads.push(key);
                } else {
                    tracing::warn!(
                        %key,
                        "stored snapshot shape mismatch; substituting the default state"
                    );
                    module.apply_default_state();
                    report.substitutions += 1;
                }
            }
            Err(_) => {
                tracing::warn!(%key, "no stored primal step; substituting the default state");
                module.apply_default_state();
                report.substitutions += 1;
            }
        }
    }

    fn rotate_coordinates(
        &self,
        zone: ZoneId,
        mesh: &mut MeshState,
        direct: DirectStep,
        cold: bool,
        report: &mut RotationReport,
    ) {
        match mesh.coords().marching() {
            TimeMarching::Steady => {}
            TimeMarching::DualTime1st if cold => {
                self.load_coords(zone, mesh.coords_mut(), direct.back(1), report);
                mesh.coords_mut().push_time_n();
                self.load_coords(zone, mesh.coords_mut(), direct, report);
            }
            TimeMarching::DualTime1st => {
                self.load_coords(zone, mesh.coords_mut(), direct.back(1), report);
                let coords = mesh.coords_mut();
                coords.stash_old();
                coords.set_current_from_time_n();
                coords.set_time_n_from_old();
            }
            TimeMarching::DualTime2nd if cold => {
                self.load_coords(zone, mesh.coords_mut(), direct.back(2), report);
                let coords = mesh.coords_mut();
                coords.push_time_n();
                coords.push_time_n1();
                self.load_coords(zone, mesh.coords_mut(), direct.back(1), report);
                mesh.coords_mut().push_time_n();
                self.load_coords(zone, mesh.coords_mut(), direct, report);
            }
            TimeMarching::DualTime2nd => {
                self.load_coords(zone, mesh.coords_mut(), direct.back(2), report);
                let coords = mesh.coords_mut();
                coords.stash_old();
                coords.set_current_from_time_n();
                coords.set_time_n_from_time_n1();
                coords.set_time_n1_from_old();
            }
        }
    }

    /// Load the mesh coordinates at `step`. There is no default
    /// geometry to fall back to, so a miss keeps the coordinates in
    /// place.
    fn load_coords(
        &self,
        zone: ZoneId,
        coords: &mut SolutionHistory,
        step: DirectStep,
        report: &mut RotationReport,
    ) {
        let Some(index) = step.stored_index() else {
            tracing::warn!(step = %step, "virtual primal step; keeping current coordinates");
            report.substitutions += 1;
            return;
        };
        let key = SnapshotKey::coordinates(zone, index);
        match self.storage.load(key) {
            Ok(data) => {
                if coords.set_current(0, &data) {
                    report.loads.push(key);
                } else {
                    tracing::warn!(
                        %key,
                        "stored coordinates shape mismatch; keeping current coordinates"
                    );
                    report.substitutions += 1;
                }
            }
            Err(_) => {
                tracing::warn!(%key, "no stored coordinates; keeping current coordinates");
                report.substitutions += 1;
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use brume_core::{DomainKey, InstanceId, ModuleKind};
    use brume_physics::{MemoryStorage, TimeSlot};
    use brume_test_utils::SyntheticModule;

    fn zone_of(module: SyntheticModule, moving: bool) -> ZoneSet {
        let marching = module.marching();
        let points = module.points();
        ZoneSet::new(
            DomainKey::new(ZoneId(0), InstanceId(0)),
            vec![module.boxed()],
            MeshState::new(points, marching, moving),
        )
        .unwrap()
    }

    /// States `0..=last`, each a constant buffer holding its step index.
    fn stepped_states(kind: ModuleKind, points: usize, last: u64) -> MemoryStorage {
        let mut storage = MemoryStorage::new();
        for step in 0..=last {
            storage.store(
                SnapshotKey::state(ZoneId(0), kind, step),
                vec![step as f64; points],
            );
        }
        storage
    }

    fn slot_value(zone: &ZoneSet, slot: TimeSlot) -> f64 {
        zone.history(ModuleKind::Flow)
            .and_then(|h| h.slot(slot, 0))
            .map(|data| data[0])
            .unwrap()
    }

    fn steps_of(report: &RotationReport) -> Vec<u64> {
        report.loads.iter().map(|key| key.step).collect()
    }

    // ── Direct index ────────────────────────────────────────────────────────

    #[test]
    fn direct_step_counts_backward_from_the_end() {
        let rotator = HistoryRotator::new(Arc::new(MemoryStorage::new()), 10);
        assert_eq!(rotator.direct_step(0), DirectStep(10));
        assert_eq!(rotator.direct_step(3), DirectStep(7));
        assert_eq!(rotator.direct_step(12), DirectStep(-2));
    }

    // ── Cold start ──────────────────────────────────────────────────────────

    #[test]
    fn cold_second_order_loads_oldest_first() {
        let storage = stepped_states(ModuleKind::Flow, 4, 10);
        let rotator = HistoryRotator::new(Arc::new(storage), 10);
        let mut zone = zone_of(
            SyntheticModule::new(ModuleKind::Flow, 4, TimeMarching::DualTime2nd),
            false,
        );

        let report = rotator.rotate(&mut zone, 0);

        assert_eq!(steps_of(&report), vec![8, 9, 10]);
        assert_eq!(report.substitutions, 0);
        assert_eq!(slot_value(&zone, TimeSlot::Current), 10.0);
        assert_eq!(slot_value(&zone, TimeSlot::TimeN), 9.0);
        assert_eq!(slot_value(&zone, TimeSlot::TimeN1), 8.0);
    }

    #[test]
    fn cold_first_order_loads_one_history_level() {
        let storage = stepped_states(ModuleKind::Flow, 4, 10);
        let rotator = HistoryRotator::new(Arc::new(storage), 10);
        let mut zone = zone_of(
            SyntheticModule::new(ModuleKind::Flow, 4, TimeMarching::DualTime1st),
            false,
        );

        let report = rotator.rotate(&mut zone, 0);

        assert_eq!(steps_of(&report), vec![9, 10]);
        assert_eq!(slot_value(&zone, TimeSlot::Current), 10.0);
        assert_eq!(slot_value(&zone, TimeSlot::TimeN), 9.0);
    }

    #[test]
    fn steady_histories_are_left_alone() {
        let storage = stepped_states(ModuleKind::Flow, 4, 10);
        let rotator = HistoryRotator::new(Arc::new(storage), 10);
        let mut zone = zone_of(
            SyntheticModule::new(ModuleKind::Flow, 4, TimeMarching::Steady),
            false,
        );

        let report = rotator.rotate(&mut zone, 0);

        assert!(report.loads.is_empty());
        assert_eq!(report.substitutions, 0);
        assert_eq!(slot_value(&zone, TimeSlot::Current), 0.0);
    }

    // ── Warm steps ──────────────────────────────────────────────────────────

    #[test]
    fn warm_second_order_loads_only_the_oldest_level() {
        let storage = stepped_states(ModuleKind::Flow, 4, 10);
        let rotator = HistoryRotator::new(Arc::new(storage), 10);
        let mut zone = zone_of(
            SyntheticModule::new(ModuleKind::Flow, 4, TimeMarching::DualTime2nd),
            false,
        );

        rotator.rotate(&mut zone, 0);
        let report = rotator.rotate(&mut zone, 1);

        assert_eq!(steps_of(&report), vec![7]);
        assert_eq!(slot_value(&zone, TimeSlot::Current), 9.0);
        assert_eq!(slot_value(&zone, TimeSlot::TimeN), 8.0);
        assert_eq!(slot_value(&zone, TimeSlot::TimeN1), 7.0);
    }

    #[test]
    fn warm_first_order_shifts_through_the_scratch_buffer() {
        let storage = stepped_states(ModuleKind::Flow, 4, 10);
        let rotator = HistoryRotator::new(Arc::new(storage), 10);
        let mut zone = zone_of(
            SyntheticModule::new(ModuleKind::Flow, 4, TimeMarching::DualTime1st),
            false,
        );

        rotator.rotate(&mut zone, 0);
        let report = rotator.rotate(&mut zone, 1);

        assert_eq!(steps_of(&report), vec![8]);
        assert_eq!(slot_value(&zone, TimeSlot::Current), 9.0);
        assert_eq!(slot_value(&zone, TimeSlot::TimeN), 8.0);
    }

    #[test]
    fn warm_walk_matches_a_cold_reload_at_every_step() {
        let storage = Arc::new(stepped_states(ModuleKind::Flow, 4, 10));
        let rotator = HistoryRotator::new(storage, 10);

        let mut warm = zone_of(
            SyntheticModule::new(ModuleKind::Flow, 4, TimeMarching::DualTime2nd),
            false,
        );
        rotator.rotate(&mut warm, 0);

        for time_iter in 1..=7 {
            rotator.rotate(&mut warm, time_iter);

            let direct = rotator.direct_step(time_iter).0 as f64;
            assert_eq!(slot_value(&warm, TimeSlot::Current), direct);
            assert_eq!(slot_value(&warm, TimeSlot::TimeN), direct - 1.0);
            assert_eq!(slot_value(&warm, TimeSlot::TimeN1), direct - 2.0);
        }
    }

    // ── Substitution ────────────────────────────────────────────────────────

    #[test]
    fn virtual_steps_substitute_the_default_state() {
        let storage = stepped_states(ModuleKind::Flow, 4, 1);
        let rotator = HistoryRotator::new(Arc::new(storage), 1);
        let module = SyntheticModule::new(ModuleKind::Flow, 4, TimeMarching::DualTime2nd);
        let probe = module.probe();
        let mut zone = zone_of(module, false);

        // direct = 1, so the second-order level would sit at step -1.
        let report = rotator.rotate(&mut zone, 0);

        assert_eq!(steps_of(&report), vec![0, 1]);
        assert_eq!(report.substitutions, 1);
        assert_eq!(probe.default_states(), 1);
    }

    #[test]
    fn storage_misses_substitute_without_failing() {
        let rotator = HistoryRotator::new(Arc::new(MemoryStorage::new()), 10);
        let module = SyntheticModule::new(ModuleKind::Flow, 4, TimeMarching::DualTime1st);
        let probe = module.probe();
        let mut zone = zone_of(module, false);

        let report = rotator.rotate(&mut zone, 0);

        assert!(report.loads.is_empty());
        assert_eq!(report.substitutions, 2);
        assert_eq!(probe.default_states(), 2);
    }

    #[test]
    fn shape_mismatches_substitute_like_misses() {
        let mut storage = stepped_states(ModuleKind::Flow, 4, 10);
        storage.store(SnapshotKey::state(ZoneId(0), ModuleKind::Flow, 10), vec![1.0; 3]);
        let rotator = HistoryRotator::new(Arc::new(storage), 10);
        let mut zone = zone_of(
            SyntheticModule::new(ModuleKind::Flow, 4, TimeMarching::DualTime1st),
            false,
        );

        let report = rotator.rotate(&mut zone, 0);

        assert_eq!(steps_of(&report), vec![9]);
        assert_eq!(report.substitutions, 1);
    }

    // ── Coordinates ─────────────────────────────────────────────────────────

    #[test]
    fn moving_meshes_rotate_coordinates_alongside_solutions() {
        let mut storage = stepped_states(ModuleKind::Flow, 4, 10);
        for step in 0..=10u64 {
            storage.store(
                SnapshotKey::coordinates(ZoneId(0), step),
                vec![100.0 + step as f64; 4],
            );
        }
        let rotator = HistoryRotator::new(Arc::new(storage), 10);
        let mut zone = zone_of(
            SyntheticModule::new(ModuleKind::Flow, 4, TimeMarching::DualTime1st),
            true,
        );

        let report = rotator.rotate(&mut zone, 0);

        let coord_steps: Vec<u64> = report
            .loads
            .iter()
            .filter(|key| key.target == brume_physics::SnapshotTarget::Coordinates)
            .map(|key| key.step)
            .collect();
        assert_eq!(coord_steps, vec![9, 10]);
        let coords = zone.mesh().coords();
        assert_eq!(coords.slot(TimeSlot::Current, 0).unwrap()[0], 110.0);
        assert_eq!(coords.slot(TimeSlot::TimeN, 0).unwrap()[0], 109.0);
    }

    #[test]
    fn missing_coordinates_stay_in_place() {
        let storage = stepped_states(ModuleKind::Flow, 4, 10);
        let rotator = HistoryRotator::new(Arc::new(storage), 10);
        let mut zone = zone_of(
            SyntheticModule::new(ModuleKind::Flow, 4, TimeMarching::DualTime1st),
            true,
        );
        zone.mesh_mut().coords_mut().fill_current(5.0);

        let report = rotator.rotate(&mut zone, 0);

        // Both coordinate loads miss; the geometry keeps its values.
        assert_eq!(report.substitutions, 2);
        let coords = zone.mesh().coords();
        assert_eq!(coords.slot(TimeSlot::Current, 0).unwrap()[0], 5.0);
    }

    // ── Dynamic reload ──────────────────────────────────────────────────────

    #[test]
    fn reload_fetches_the_pair_every_step() {
        let storage = stepped_states(ModuleKind::Structure, 4, 10);
        let rotator = HistoryRotator::new(Arc::new(storage), 10);
        let mut zone = zone_of(
            SyntheticModule::new(ModuleKind::Structure, 4, TimeMarching::DualTime1st),
            false,
        );

        let cold = rotator.reload(&mut zone, 0);
        assert_eq!(steps_of(&cold), vec![9, 10]);

        let warm = rotator.reload(&mut zone, 1);
        assert_eq!(steps_of(&warm), vec![8, 9]);
        let history = zone.history(ModuleKind::Structure).unwrap();
        assert_eq!(history.slot(TimeSlot::Current, 0).unwrap()[0], 9.0);
        assert_eq!(history.slot(TimeSlot::TimeN, 0).unwrap()[0], 8.0);
    }

    #[test]
    fn reload_skips_steady_histories() {
        let storage = stepped_states(ModuleKind::Structure, 4, 10);
        let rotator = HistoryRotator::new(Arc::new(storage), 10);
        let mut zone = zone_of(
            SyntheticModule::new(ModuleKind::Structure, 4, TimeMarching::Steady),
            false,
        );

        let report = rotator.reload(&mut zone, 0);
        assert!(report.loads.is_empty());
    }
}
