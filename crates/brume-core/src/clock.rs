//! Iteration counters threaded through every controller call.

/// Wall positions of the nested iteration loops.
///
/// The outer driver owns the clock. Controllers set the inner counter as
/// they loop; the recorder temporarily overrides the time counter while
/// taping a dynamic step and restores it afterwards via [`ClockMark`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IterationClock {
    time_iter: u64,
    outer_iter: u64,
    inner_iter: u64,
    dt: f64,
}

impl IterationClock {
    /// A clock at the start of a run with the given physical step size.
    ///
    /// Steady problems pass any positive `dt`; it is never read for them.
    pub fn new(dt: f64) -> Self {
        Self {
            time_iter: 0,
            outer_iter: 0,
            inner_iter: 0,
            dt,
        }
    }

    /// Current physical time step.
    pub fn time_iter(&self) -> u64 {
        self.time_iter
    }

    /// Current outer (multizone coupling) iteration.
    pub fn outer_iter(&self) -> u64 {
        self.outer_iter
    }

    /// Current inner iteration within one solve.
    pub fn inner_iter(&self) -> u64 {
        self.inner_iter
    }

    /// Physical step size.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Physical time elapsed at the start of the current step.
    pub fn physical_time(&self) -> f64 {
        self.time_iter as f64 * self.dt
    }

    /// Set the inner-iteration counter.
    pub fn set_inner_iter(&mut self, inner: u64) {
        self.inner_iter = inner;
    }

    /// Set the outer-iteration counter.
    pub fn set_outer_iter(&mut self, outer: u64) {
        self.outer_iter = outer;
    }

    /// Override the time counter. Pair with [`IterationClock::save`] and
    /// [`IterationClock::restore`] when the override is temporary.
    pub fn set_time_iter(&mut self, time: u64) {
        self.time_iter = time;
    }

    /// Advance to the next physical time step and rewind the inner counter.
    pub fn advance_time(&mut self) {
        self.time_iter += 1;
        self.inner_iter = 0;
    }

    /// Snapshot the counters a temporary override may touch.
    pub fn save(&self) -> ClockMark {
        ClockMark {
            time_iter: self.time_iter,
            inner_iter: self.inner_iter,
        }
    }

    /// Restore counters saved with [`IterationClock::save`].
    pub fn restore(&mut self, mark: ClockMark) {
        self.time_iter = mark.time_iter;
        self.inner_iter = mark.inner_iter;
    }
}

/// Saved clock counters, restored after a temporary override.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockMark {
    time_iter: u64,
    inner_iter: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clock_starts_at_zero() {
        let clock = IterationClock::new(0.1);
        assert_eq!(clock.time_iter(), 0);
        assert_eq!(clock.outer_iter(), 0);
        assert_eq!(clock.inner_iter(), 0);
        assert_eq!(clock.dt(), 0.1);
    }

    #[test]
    fn advance_time_rewinds_inner() {
        let mut clock = IterationClock::new(0.5);
        clock.set_inner_iter(7);
        clock.advance_time();
        assert_eq!(clock.time_iter(), 1);
        assert_eq!(clock.inner_iter(), 0);
        assert_eq!(clock.physical_time(), 0.5);
    }

    #[test]
    fn save_restore_round_trips_override() {
        let mut clock = IterationClock::new(0.1);
        clock.set_time_iter(4);
        clock.set_inner_iter(2);

        let mark = clock.save();
        clock.set_time_iter(9);
        clock.set_inner_iter(0);
        clock.restore(mark);

        assert_eq!(clock.time_iter(), 4);
        assert_eq!(clock.inner_iter(), 2);
    }

    #[test]
    fn outer_iter_untouched_by_restore() {
        let mut clock = IterationClock::new(0.1);
        clock.set_outer_iter(3);
        let mark = clock.save();
        clock.set_outer_iter(5);
        clock.restore(mark);
        assert_eq!(clock.outer_iter(), 5);
    }
}
