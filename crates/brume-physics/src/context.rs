//! Per-run services handed to modules and controllers.

use brume_core::{ConvergenceTable, IterationClock, TimeMarching};
use brume_domain::Communicator;

/// Everything a module may consult while it runs: the communicator of
/// its rank, the shared convergence table, and the iteration clock.
///
/// Controllers hold the context mutably and hand modules a shared
/// borrow, so modules can read convergence flags and the clock but only
/// the orchestrating layer writes them. The `passive` flag marks
/// iterations replayed under tape recording, where modules must skip
/// work that would register fresh tape entries.
pub struct SolveContext<'a> {
    comm: &'a dyn Communicator,
    convergence: &'a mut ConvergenceTable,
    clock: &'a mut IterationClock,
    marching: TimeMarching,
    multizone: bool,
    passive: bool,
}

impl<'a> SolveContext<'a> {
    /// Builds a context over borrowed run state. Starts active.
    pub fn new(
        comm: &'a dyn Communicator,
        convergence: &'a mut ConvergenceTable,
        clock: &'a mut IterationClock,
        marching: TimeMarching,
        multizone: bool,
    ) -> Self {
        Self {
            comm,
            convergence,
            clock,
            marching,
            multizone,
            passive: false,
        }
    }

    /// The communicator of this rank.
    pub fn comm(&self) -> &dyn Communicator {
        self.comm
    }

    /// Read access to the convergence table.
    pub fn convergence(&self) -> &ConvergenceTable {
        self.convergence
    }

    /// Write access to the convergence table.
    pub fn convergence_mut(&mut self) -> &mut ConvergenceTable {
        self.convergence
    }

    /// Read access to the iteration clock.
    pub fn clock(&self) -> &IterationClock {
        self.clock
    }

    /// Write access to the iteration clock.
    pub fn clock_mut(&mut self) -> &mut IterationClock {
        self.clock
    }

    /// The time-marching scheme of the run.
    pub fn marching(&self) -> TimeMarching {
        self.marching
    }

    /// Whether the run couples more than one zone.
    pub fn multizone(&self) -> bool {
        self.multizone
    }

    /// Whether the current iteration is a passive replay.
    pub fn is_passive(&self) -> bool {
        self.passive
    }

    /// Marks iterations as passive replays (or active again).
    pub fn set_passive(&mut self, passive: bool) {
        self.passive = passive;
    }
}
