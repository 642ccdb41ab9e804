//! Per-module solution storage across mesh levels and time levels.
//!
//! Every physics module owns one [`SolutionHistory`]. The history holds
//! a `current` buffer per mesh level plus, depending on the time-marching
//! scheme, the retained time levels `t_n` and `t_{n-1}` and a scratch
//! buffer used while histories are rotated. Restart loads write the
//! finest level only; slot-to-slot copies apply to every level.

use brume_core::TimeMarching;

// ── Slots ───────────────────────────────────────────────────────────────────

/// One of the named buffers of a [`SolutionHistory`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeSlot {
    /// The working solution of the current iteration.
    Current,
    /// Scratch buffer used while rotating histories in memory.
    Old,
    /// The solution at physical time `t_n`.
    TimeN,
    /// The solution at physical time `t_{n-1}`.
    TimeN1,
}

// ── History ─────────────────────────────────────────────────────────────────

/// Solution buffers for one module, indexed by mesh level.
///
/// Which slots exist is fixed at construction from the time-marching
/// scheme: steady runs keep only `current`, first-order dual time adds
/// `t_n` and the scratch buffer, second-order dual time adds `t_{n-1}`.
/// Copies into a slot that does not exist are silent no-ops, so rotation
/// code can run the same sequence for both dual-time orders.
#[derive(Clone, Debug, PartialEq)]
pub struct SolutionHistory {
    marching: TimeMarching,
    levels: Vec<LevelBuffers>,
}

#[derive(Clone, Debug, PartialEq)]
struct LevelBuffers {
    current: Vec<f64>,
    old: Option<Vec<f64>>,
    time_n: Option<Vec<f64>>,
    time_n1: Option<Vec<f64>>,
}

impl LevelBuffers {
    fn new(points: usize, marching: TimeMarching) -> Self {
        let retained = marching.history_levels();
        Self {
            current: vec![0.0; points],
            old: (retained >= 1).then(|| vec![0.0; points]),
            time_n: (retained >= 1).then(|| vec![0.0; points]),
            time_n1: (retained >= 2).then(|| vec![0.0; points]),
        }
    }
}

impl SolutionHistory {
    /// Creates a history with one entry of `points_per_level` per mesh
    /// level, every slot zero-filled. Level `0` is the finest mesh.
    pub fn new(points_per_level: &[usize], marching: TimeMarching) -> Self {
        Self {
            marching,
            levels: points_per_level
                .iter()
                .map(|&points| LevelBuffers::new(points, marching))
                .collect(),
        }
    }

    /// The time-marching scheme the slot layout was built for.
    pub fn marching(&self) -> TimeMarching {
        self.marching
    }

    /// Number of mesh levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Number of points stored at `level`, or `None` if out of range.
    pub fn points(&self, level: usize) -> Option<usize> {
        self.levels.get(level).map(|l| l.current.len())
    }

    /// Number of points at the finest level. Zero for an empty history.
    pub fn finest_points(&self) -> usize {
        self.points(0).unwrap_or(0)
    }

    /// Read access to one slot at one level. `None` if the level is out
    /// of range or the slot is not allocated for this scheme.
    pub fn slot(&self, slot: TimeSlot, level: usize) -> Option<&[f64]> {
        let buffers = self.levels.get(level)?;
        match slot {
            TimeSlot::Current => Some(buffers.current.as_slice()),
            TimeSlot::Old => buffers.old.as_deref(),
            TimeSlot::TimeN => buffers.time_n.as_deref(),
            TimeSlot::TimeN1 => buffers.time_n1.as_deref(),
        }
    }

    /// Mutable access to the working solution at `level`.
    pub fn current_mut(&mut self, level: usize) -> Option<&mut [f64]> {
        self.levels.get_mut(level).map(|l| l.current.as_mut_slice())
    }

    /// Overwrites the working solution at `level` with `data`.
    ///
    /// Returns `false`, writing nothing, when the level is out of range
    /// or `data` does not match the level's point count. Restart loads
    /// use this on the finest level only.
    pub fn set_current(&mut self, level: usize, data: &[f64]) -> bool {
        match self.levels.get_mut(level) {
            Some(buffers) if buffers.current.len() == data.len() => {
                buffers.current.copy_from_slice(data);
                true
            }
            _ => false,
        }
    }

    /// Fills the working solution of every level with `value`.
    pub fn fill_current(&mut self, value: f64) {
        for buffers in &mut self.levels {
            buffers.current.fill(value);
        }
    }

    // ── Slot-to-slot copies (all levels) ────────────────────────────────────

    /// `t_n` takes the working solution.
    pub fn push_time_n(&mut self) {
        for buffers in &mut self.levels {
            if let Some(time_n) = &mut buffers.time_n {
                time_n.copy_from_slice(&buffers.current);
            }
        }
    }

    /// `t_{n-1}` takes `t_n`.
    pub fn push_time_n1(&mut self) {
        for buffers in &mut self.levels {
            if let (Some(time_n1), Some(time_n)) = (&mut buffers.time_n1, &buffers.time_n) {
                time_n1.copy_from_slice(time_n);
            }
        }
    }

    /// The scratch buffer takes the working solution.
    pub fn stash_old(&mut self) {
        for buffers in &mut self.levels {
            if let Some(old) = &mut buffers.old {
                old.copy_from_slice(&buffers.current);
            }
        }
    }

    /// The working solution takes `t_n`.
    pub fn set_current_from_time_n(&mut self) {
        for buffers in &mut self.levels {
            if let Some(time_n) = &buffers.time_n {
                buffers.current.copy_from_slice(time_n);
            }
        }
    }

    /// `t_n` takes `t_{n-1}`.
    pub fn set_time_n_from_time_n1(&mut self) {
        for buffers in &mut self.levels {
            if let (Some(time_n), Some(time_n1)) = (&mut buffers.time_n, &buffers.time_n1) {
                time_n.copy_from_slice(time_n1);
            }
        }
    }

    /// `t_n` takes the scratch buffer.
    pub fn set_time_n_from_old(&mut self) {
        for buffers in &mut self.levels {
            if let (Some(time_n), Some(old)) = (&mut buffers.time_n, &buffers.old) {
                time_n.copy_from_slice(old);
            }
        }
    }

    /// `t_{n-1}` takes the scratch buffer.
    pub fn set_time_n1_from_old(&mut self) {
        for buffers in &mut self.levels {
            if let (Some(time_n1), Some(old)) = (&mut buffers.time_n1, &buffers.old) {
                time_n1.copy_from_slice(old);
            }
        }
    }

    /// End-of-step rotation for a forward run: second-order dual time
    /// moves `t_n` into `t_{n-1}` and then the working solution into
    /// `t_n`; first order moves the working solution into `t_n`; steady
    /// runs keep nothing.
    pub fn advance(&mut self) {
        match self.marching {
            TimeMarching::Steady => {}
            TimeMarching::DualTime1st => self.push_time_n(),
            TimeMarching::DualTime2nd => {
                self.push_time_n1();
                self.push_time_n();
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn constant(history: &SolutionHistory, slot: TimeSlot, level: usize) -> f64 {
        let data = history.slot(slot, level).unwrap();
        assert!(data.windows(2).all(|w| w[0] == w[1]), "non-uniform slot");
        data[0]
    }

    // ── Construction ────────────────────────────────────────────────────────

    #[test]
    fn steady_history_has_only_current() {
        let history = SolutionHistory::new(&[8, 4], TimeMarching::Steady);
        assert_eq!(history.level_count(), 2);
        assert_eq!(history.points(0), Some(8));
        assert_eq!(history.points(1), Some(4));
        assert!(history.slot(TimeSlot::Current, 0).is_some());
        assert!(history.slot(TimeSlot::Old, 0).is_none());
        assert!(history.slot(TimeSlot::TimeN, 0).is_none());
        assert!(history.slot(TimeSlot::TimeN1, 0).is_none());
    }

    #[test]
    fn first_order_allocates_time_n_and_scratch() {
        let history = SolutionHistory::new(&[8], TimeMarching::DualTime1st);
        assert!(history.slot(TimeSlot::Old, 0).is_some());
        assert!(history.slot(TimeSlot::TimeN, 0).is_some());
        assert!(history.slot(TimeSlot::TimeN1, 0).is_none());
    }

    #[test]
    fn second_order_allocates_both_time_levels() {
        let history = SolutionHistory::new(&[8], TimeMarching::DualTime2nd);
        assert!(history.slot(TimeSlot::TimeN, 0).is_some());
        assert!(history.slot(TimeSlot::TimeN1, 0).is_some());
    }

    #[test]
    fn out_of_range_level_is_none() {
        let history = SolutionHistory::new(&[8], TimeMarching::Steady);
        assert!(history.slot(TimeSlot::Current, 1).is_none());
        assert_eq!(history.points(3), None);
    }

    // ── Loads ───────────────────────────────────────────────────────────────

    #[test]
    fn set_current_writes_one_level() {
        let mut history = SolutionHistory::new(&[3, 2], TimeMarching::Steady);
        assert!(history.set_current(0, &[1.0, 2.0, 3.0]));
        assert_eq!(history.slot(TimeSlot::Current, 0), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(history.slot(TimeSlot::Current, 1), Some(&[0.0, 0.0][..]));
    }

    #[test]
    fn set_current_rejects_length_mismatch() {
        let mut history = SolutionHistory::new(&[3], TimeMarching::Steady);
        assert!(!history.set_current(0, &[1.0, 2.0]));
        assert_eq!(history.slot(TimeSlot::Current, 0), Some(&[0.0, 0.0, 0.0][..]));
    }

    #[test]
    fn set_current_rejects_bad_level() {
        let mut history = SolutionHistory::new(&[2], TimeMarching::Steady);
        assert!(!history.set_current(1, &[1.0, 2.0]));
    }

    // ── Slot copies ─────────────────────────────────────────────────────────

    #[test]
    fn copies_apply_to_every_level() {
        let mut history = SolutionHistory::new(&[4, 2], TimeMarching::DualTime1st);
        history.fill_current(3.5);
        history.push_time_n();
        assert_eq!(constant(&history, TimeSlot::TimeN, 0), 3.5);
        assert_eq!(constant(&history, TimeSlot::TimeN, 1), 3.5);
    }

    #[test]
    fn copies_into_missing_slots_are_no_ops() {
        let mut history = SolutionHistory::new(&[4], TimeMarching::Steady);
        history.fill_current(1.0);
        history.push_time_n();
        history.push_time_n1();
        history.stash_old();
        assert_eq!(constant(&history, TimeSlot::Current, 0), 1.0);
        assert!(history.slot(TimeSlot::TimeN, 0).is_none());
    }

    #[test]
    fn warm_shift_sequence_rotates_one_level_back() {
        // Second-order layout holding steps 7 (t_{n-1}), 8 (t_n), 9
        // (current); shifting to 8 with step 6 arriving from storage.
        let mut history = SolutionHistory::new(&[4], TimeMarching::DualTime2nd);
        history.fill_current(7.0);
        history.push_time_n();
        history.push_time_n1();
        history.fill_current(8.0);
        history.push_time_n();
        history.fill_current(9.0);

        history.set_current(0, &[6.0; 4]);
        history.stash_old();
        history.set_current_from_time_n();
        history.set_time_n_from_time_n1();
        history.set_time_n1_from_old();

        assert_eq!(constant(&history, TimeSlot::Current, 0), 8.0);
        assert_eq!(constant(&history, TimeSlot::TimeN, 0), 7.0);
        assert_eq!(constant(&history, TimeSlot::TimeN1, 0), 6.0);
    }

    // ── Advance ─────────────────────────────────────────────────────────────

    #[test]
    fn advance_is_inert_for_steady() {
        let mut history = SolutionHistory::new(&[4], TimeMarching::Steady);
        history.fill_current(2.0);
        history.advance();
        assert!(history.slot(TimeSlot::TimeN, 0).is_none());
    }

    #[test]
    fn advance_second_order_preserves_lineage() {
        let mut history = SolutionHistory::new(&[4], TimeMarching::DualTime2nd);
        history.fill_current(1.0);
        history.advance();
        history.fill_current(2.0);
        history.advance();
        history.fill_current(3.0);
        assert_eq!(constant(&history, TimeSlot::Current, 0), 3.0);
        assert_eq!(constant(&history, TimeSlot::TimeN, 0), 2.0);
        assert_eq!(constant(&history, TimeSlot::TimeN1, 0), 1.0);
    }

    #[test]
    fn advance_first_order_keeps_single_level() {
        let mut history = SolutionHistory::new(&[4], TimeMarching::DualTime1st);
        history.fill_current(5.0);
        history.advance();
        history.fill_current(6.0);
        assert_eq!(constant(&history, TimeSlot::TimeN, 0), 5.0);
    }

    // ── Lineage law ─────────────────────────────────────────────────────────

    fn arb_marching() -> impl Strategy<Value = TimeMarching> {
        prop_oneof![
            Just(TimeMarching::DualTime1st),
            Just(TimeMarching::DualTime2nd),
        ]
    }

    proptest! {
        /// Whatever the walk, the retained levels hold the most recent
        /// advanced values, newest in `t_n`.
        #[test]
        fn advance_retains_the_newest_values(
            marching in arb_marching(),
            values in prop::collection::vec(-1e3..1e3f64, 2..16),
        ) {
            let mut history = SolutionHistory::new(&[4, 2], marching);
            for &value in &values {
                history.fill_current(value);
                history.advance();
            }

            let last = values[values.len() - 1];
            for level in 0..history.level_count() {
                prop_assert_eq!(constant(&history, TimeSlot::TimeN, level), last);
            }
            if marching == TimeMarching::DualTime2nd {
                let prior = values[values.len() - 2];
                prop_assert_eq!(constant(&history, TimeSlot::TimeN1, 0), prior);
            }
        }
    }
}
