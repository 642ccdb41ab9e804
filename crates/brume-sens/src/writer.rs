//! Tab-separated sensitivity output.

use std::error::Error;
use std::fmt;
use std::io::{self, Write};

use crate::table::{SensitivityRow, SensitivityTable};

// ── Errors ──────────────────────────────────────────────────────────────────

/// Failure while emitting sensitivity rows.
#[derive(Debug)]
pub enum WriteError {
    /// The underlying sink failed.
    Io(io::Error),
    /// A row arrived for an earlier step than one already written.
    OrderViolation {
        /// Step of the last written row.
        written: u64,
        /// Step of the offending row.
        offered: u64,
    },
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "sensitivity output: {e}"),
            Self::OrderViolation { written, offered } => write!(
                f,
                "sensitivity rows must not step backwards: step {offered} after {written}"
            ),
        }
    }
}

impl Error for WriteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::OrderViolation { .. } => None,
        }
    }
}

impl From<io::Error> for WriteError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

// ── Writer ──────────────────────────────────────────────────────────────────

/// Streams sensitivity rows as tab-separated values.
///
/// The header goes out on construction. Rows must arrive grouped by
/// step in ascending order, the order [`SensitivityTable::rows`]
/// produces; a row for an earlier step than one already written is
/// rejected.
pub struct SensitivityWriter<W: Write> {
    out: W,
    last_step: Option<u64>,
    rows_written: u64,
}

impl<W: Write> SensitivityWriter<W> {
    /// Wrap `out` and emit the header line.
    ///
    /// # Errors
    ///
    /// [`WriteError::Io`] when the sink rejects the header.
    pub fn new(mut out: W) -> Result<Self, WriteError> {
        writeln!(out, "variable\tstep\tvalue")?;
        Ok(Self {
            out,
            last_step: None,
            rows_written: 0,
        })
    }

    /// Emit one row.
    ///
    /// # Errors
    ///
    /// [`WriteError::OrderViolation`] when `row.step` is earlier than
    /// the last written step; [`WriteError::Io`] when the sink fails.
    pub fn write_row(&mut self, row: &SensitivityRow) -> Result<(), WriteError> {
        if let Some(written) = self.last_step {
            if row.step < written {
                return Err(WriteError::OrderViolation {
                    written,
                    offered: row.step,
                });
            }
        }
        writeln!(self.out, "{}\t{}\t{}", row.variable, row.step, row.value)?;
        self.last_step = Some(row.step);
        self.rows_written += 1;
        Ok(())
    }

    /// Emit every row of `table` in its emission order.
    ///
    /// # Errors
    ///
    /// [`WriteError::Io`] when the sink fails. Table emission order is
    /// ascending by construction, so no order violation can occur.
    pub fn write_table(&mut self, table: &SensitivityTable) -> Result<(), WriteError> {
        for row in table.rows() {
            self.write_row(&row)?;
        }
        Ok(())
    }

    /// Rows written so far, excluding the header.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Flush and give the sink back.
    ///
    /// # Errors
    ///
    /// [`WriteError::Io`] when the flush fails.
    pub fn into_inner(mut self) -> Result<W, WriteError> {
        self.out.flush()?;
        Ok(self.out)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn row(variable: &str, step: u64, value: f64) -> SensitivityRow {
        SensitivityRow {
            variable: variable.to_string(),
            step,
            value,
        }
    }

    #[test]
    fn header_and_rows_are_tab_separated() {
        let mut writer = SensitivityWriter::new(Vec::new()).unwrap();
        writer.write_row(&row("alpha", 0, 0.5)).unwrap();
        writer.write_row(&row("mach", 0, -2.0)).unwrap();
        assert_eq!(writer.rows_written(), 2);

        let out = writer.into_inner().unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "variable\tstep\tvalue\nalpha\t0\t0.5\nmach\t0\t-2\n");
    }

    #[test]
    fn same_step_rows_are_accepted() {
        let mut writer = SensitivityWriter::new(Vec::new()).unwrap();
        writer.write_row(&row("alpha", 3, 1.0)).unwrap();
        writer.write_row(&row("mach", 3, 2.0)).unwrap();
        writer.write_row(&row("alpha", 4, 3.0)).unwrap();
        assert_eq!(writer.rows_written(), 3);
    }

    #[test]
    fn stepping_backwards_is_rejected() {
        let mut writer = SensitivityWriter::new(Vec::new()).unwrap();
        writer.write_row(&row("alpha", 5, 1.0)).unwrap();

        match writer.write_row(&row("alpha", 4, 1.0)) {
            Err(WriteError::OrderViolation { written, offered }) => {
                assert_eq!(written, 5);
                assert_eq!(offered, 4);
            }
            other => panic!("expected OrderViolation, got {other:?}"),
        }
        // The rejected row is not counted.
        assert_eq!(writer.rows_written(), 1);
    }

    #[test]
    fn whole_table_emission_never_violates_order() {
        let mut table = SensitivityTable::new();
        table.add("alpha", 2, 0.2);
        table.add("alpha", 0, 0.0);
        table.add("mach", 1, 0.1);

        let mut writer = SensitivityWriter::new(Vec::new()).unwrap();
        writer.write_table(&table).unwrap();
        assert_eq!(writer.rows_written(), 3);

        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let steps: Vec<&str> = text
            .lines()
            .skip(1)
            .map(|line| line.split('\t').nth(1).unwrap())
            .collect();
        assert_eq!(steps, vec!["0", "1", "2"]);
    }
}
