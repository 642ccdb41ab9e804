//! Wall-clock metrics collected by the time loop.

/// Timing and progress counters for one run.
///
/// Durations are in microseconds, accumulated across the whole run. The
/// time loop populates these after each phase; consumers read them from
/// the finished loop.
#[derive(Clone, Debug, Default)]
pub struct SolveMetrics {
    /// Wall-clock time for the entire run, in microseconds.
    pub total_us: u64,
    /// Time spent inside controller solves, in microseconds.
    pub solve_us: u64,
    /// Time spent in post-step updates (history rotation), in
    /// microseconds.
    pub update_us: u64,
    /// Time spent writing restart snapshots, in microseconds.
    pub snapshot_us: u64,
    /// Physical time steps completed.
    pub steps_completed: u64,
    /// Controller solves performed.
    pub solves: u64,
    /// Inner iterations performed across all solves.
    pub inner_iterations: u64,
    /// Solves that stopped at the inner-iteration limit without
    /// converging.
    pub limit_hits: u64,
}
