//! Accumulation of design-variable sensitivities across time steps.

use indexmap::IndexMap;

// ── Rows ────────────────────────────────────────────────────────────────────

/// One emitted sensitivity: a design variable's derivative contribution
/// at one physical step.
#[derive(Clone, Debug, PartialEq)]
pub struct SensitivityRow {
    /// Design-variable name.
    pub variable: String,
    /// Physical step the contribution belongs to. `0` for steady runs.
    pub step: u64,
    /// The derivative value.
    pub value: f64,
}

// ── Table ───────────────────────────────────────────────────────────────────

/// Sensitivities keyed by design variable and physical step.
///
/// Reverse-time drivers visit steps newest first and several modules
/// may contribute to the same variable, so the table accepts additions
/// in any order and accumulates collisions. [`rows`] emits everything
/// in ascending step order regardless of insertion order; within one
/// step, variables keep their first-seen order.
///
/// [`rows`]: SensitivityTable::rows
#[derive(Debug, Default)]
pub struct SensitivityTable {
    entries: IndexMap<(String, u64), f64>,
}

impl SensitivityTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a contribution for `variable` at `step`. Contributions to
    /// the same key accumulate.
    pub fn add(&mut self, variable: &str, step: u64, value: f64) {
        *self
            .entries
            .entry((variable.to_string(), step))
            .or_insert(0.0) += value;
    }

    /// The accumulated value for `variable` at `step`, if any.
    pub fn value(&self, variable: &str, step: u64) -> Option<f64> {
        self.entries.get(&(variable.to_string(), step)).copied()
    }

    /// Sum of a variable's contributions over all steps.
    pub fn total(&self, variable: &str) -> f64 {
        self.entries
            .iter()
            .filter(|((name, _), _)| name == variable)
            .map(|(_, value)| value)
            .sum()
    }

    /// Design-variable names in first-seen order.
    pub fn variables(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (name, _) in self.entries.keys() {
            if !names.iter().any(|seen| seen == name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Number of distinct (variable, step) entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries as rows in ascending step order. The sort is stable,
    /// so variables within one step keep their first-seen order.
    pub fn rows(&self) -> Vec<SensitivityRow> {
        let mut rows: Vec<SensitivityRow> = self
            .entries
            .iter()
            .map(|((variable, step), value)| SensitivityRow {
                variable: variable.clone(),
                step: *step,
                value: *value,
            })
            .collect();
        rows.sort_by_key(|row| row.step);
        rows
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
