//! End-to-end unsteady adjoint example.
//!
//! Demonstrates: forward dual-time run storing restart snapshots →
//! reverse walk rebuilding histories from the archive → sensitivity
//! table streamed as tab-separated values.

use std::sync::Arc;

use brume_adjoint::{AdjointConfig, AdjointDriver};
use brume_bench::{unsteady_config, unsteady_zone};
use brume_core::{ConvergenceTable, IterationClock, TimeMarching};
use brume_domain::SoloComm;
use brume_driver::{controller_for, FluidController, IterationController, TimeLoop, ZoneUnit};
use brume_physics::{MemoryStorage, SolveContext};
use brume_sens::SensitivityWriter;

const POINTS: usize = 4_096;
const TIME_STEPS: u64 = 10;

fn main() {
    println!("=== Brume Unsteady Adjoint Example ===\n");

    let comm = SoloComm;

    // --- Forward pass: march and archive ---
    println!("Forward: {TIME_STEPS} dual-time steps over {POINTS} points");
    let config = unsteady_config(TIME_STEPS);
    let zone = unsteady_zone(POINTS);
    let controller = controller_for(&zone, &config).unwrap();
    let mut units = vec![ZoneUnit::new(zone, controller)];
    let mut storage = MemoryStorage::new();

    let mut timeloop = TimeLoop::new(config.clone()).unwrap();
    let report = timeloop.run(&mut units, &comm, &mut storage).unwrap();
    println!(
        "  steps={}, converged={}, solves={}, inner_iterations={}",
        report.steps_completed,
        report.all_converged(),
        timeloop.metrics().solves,
        timeloop.metrics().inner_iterations,
    );
    println!("  archived snapshots: {}\n", storage.len());

    // --- Reverse pass: walk the archive backward ---
    // The forward loop stored steps 0..TIME_STEPS, so the walk starts
    // from the last stored step.
    let last_stored = TIME_STEPS - 1;
    println!("Reverse: {TIME_STEPS} adjoint steps from direct step {last_stored}");
    let mut zone = unsteady_zone(POINTS);
    let mut driver = AdjointDriver::new(
        AdjointConfig {
            total_steps: last_stored,
            ..AdjointConfig::default()
        },
        Box::new(FluidController::new(config.threshold)),
        Arc::new(storage),
    )
    .unwrap();

    let mut table = ConvergenceTable::new();
    let mut clock = IterationClock::new(config.dt);
    let mut ctx = SolveContext::new(
        &comm,
        &mut table,
        &mut clock,
        TimeMarching::DualTime2nd,
        false,
    );

    for step in 0..TIME_STEPS {
        ctx.clock_mut().set_time_iter(step);
        let report = driver.solve(&mut zone, &mut ctx, config.inner_limit).unwrap();
        println!(
            "  adjoint step {:>2} (direct step {:>2}): sweeps={:>2}, residual={:.2e}",
            step,
            last_stored as i64 - step as i64,
            report.iterations,
            report.final_residual,
        );
        driver.update(&mut zone, &mut ctx).unwrap();
    }

    // --- Sensitivities ---
    println!("\nSensitivities ({} rows):", driver.sensitivities().len());
    let stdout = std::io::stdout();
    let mut writer = SensitivityWriter::new(stdout.lock()).unwrap();
    writer.write_table(driver.sensitivities()).unwrap();

    println!("\nDone.");
}
