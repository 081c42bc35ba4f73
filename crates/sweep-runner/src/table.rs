//! The result table: one CSV row per experiment case.
//!
//! The table is both the checkpoint and the hand-off format between the
//! design generator, the engine and the aggregator. Cells are kept as text
//! so columns the runner does not know about, and values it did not write,
//! survive a load/save cycle unchanged.

use crate::config::FactorColumns;
use crate::error::{RunnerError, RunnerResult};
use crate::fsutil::atomic_write_bytes;
use crate::metrics::Metrics;
use crate::status::{CaseStatus, UnknownStatus};
use std::fs;
use std::io::Read;
use std::path::Path;

pub const EXECUTION_TIME: &str = "execution_time";
pub const COMMUNICATION_TIME: &str = "communication_time";
pub const STATUS: &str = "status";
pub const STDERR: &str = "stderr";

pub const RESULT_COLUMNS: [&str; 4] = [EXECUTION_TIME, COMMUNICATION_TIME, STATUS, STDERR];

/// Typed view of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentCase {
    pub index: usize,
    pub method: String,
    pub num_processes: u32,
    pub problem_size: u32,
    pub repetition: u32,
    pub execution_time: Option<f64>,
    pub communication_time: Option<f64>,
    pub status: Option<CaseStatus>,
    pub stderr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ResultTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn load(path: &Path) -> RunnerResult<Self> {
        if !path.is_file() {
            return Err(RunnerError::TableMissing(path.to_path_buf()));
        }
        let file = fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> RunnerResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut table = Self::new(columns);
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let mut cells: Vec<String> = record.iter().map(str::to_string).collect();
            if cells.len() > table.columns.len() {
                return Err(RunnerError::InvalidCase {
                    row: i + 1,
                    message: format!(
                        "{} cells but header has {} columns",
                        cells.len(),
                        table.columns.len()
                    ),
                });
            }
            cells.resize(table.columns.len(), String::new());
            table.rows.push(cells);
        }
        Ok(table)
    }

    pub fn to_csv_bytes(&self) -> RunnerResult<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| RunnerError::Io(std::io::Error::new(e.error().kind(), e.to_string())))
    }

    /// Rewrites the whole file through a temp file and rename.
    pub fn save_atomic(&self, path: &Path) -> RunnerResult<()> {
        let bytes = self.to_csv_bytes()?;
        atomic_write_bytes(path, &bytes)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row<I, S>(&mut self, cells: I) -> RunnerResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cells: Vec<String> = cells.into_iter().map(Into::into).collect();
        if cells.len() > self.columns.len() {
            return Err(RunnerError::InvalidCase {
                row: self.rows.len() + 1,
                message: format!(
                    "{} cells but header has {} columns",
                    cells.len(),
                    self.columns.len()
                ),
            });
        }
        cells.resize(self.columns.len(), String::new());
        self.rows.push(cells);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn add_column(&mut self, name: &str) -> usize {
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.columns.len() - 1
    }

    /// Appends any result column not already in the header.
    pub fn ensure_result_columns(&mut self) {
        for name in RESULT_COLUMNS {
            if self.column_index(name).is_none() {
                self.add_column(name);
            }
        }
    }

    /// Cell text, or `None` when the row or column does not exist.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|cells| cells[col].as_str())
    }

    /// Sets a cell, adding the column when missing.
    pub fn set(&mut self, row: usize, column: &str, value: impl Into<String>) {
        let col = match self.column_index(column) {
            Some(col) => col,
            None => self.add_column(column),
        };
        if let Some(cells) = self.rows.get_mut(row) {
            cells[col] = value.into();
        }
    }

    fn has_value(&self, row: usize, column: &str) -> bool {
        self.get(row, column)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false)
    }

    /// A row is complete once both timings are recorded. Always read from
    /// the cells, the file may have been edited between runs.
    pub fn is_complete(&self, row: usize) -> bool {
        self.has_value(row, EXECUTION_TIME) && self.has_value(row, COMMUNICATION_TIME)
    }

    /// `None` for a pending row.
    pub fn status(&self, row: usize) -> Option<Result<CaseStatus, UnknownStatus>> {
        self.get(row, STATUS)
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<CaseStatus>())
    }

    pub fn set_status(&mut self, row: usize, status: CaseStatus) {
        self.set(row, STATUS, status.to_string());
    }

    pub fn record_metrics(&mut self, row: usize, metrics: &Metrics) {
        self.set(row, EXECUTION_TIME, metrics.execution_text.as_str());
        self.set(row, COMMUNICATION_TIME, metrics.communication_text.as_str());
    }

    pub fn clear_metrics(&mut self, row: usize) {
        self.set(row, EXECUTION_TIME, "");
        self.set(row, COMMUNICATION_TIME, "");
    }

    pub fn set_stderr(&mut self, row: usize, excerpt: impl Into<String>) {
        self.set(row, STDERR, excerpt);
    }

    pub fn case(&self, row: usize, columns: &FactorColumns) -> RunnerResult<ExperimentCase> {
        let invalid = |message: String| RunnerError::InvalidCase {
            row: row + 1,
            message,
        };
        if row >= self.rows.len() {
            return Err(invalid("row does not exist".to_string()));
        }
        let required = |name: &str| -> RunnerResult<&str> {
            self.get(row, name)
                .ok_or_else(|| invalid(format!("missing column '{}'", name)))
        };
        let positive = |name: &str| -> RunnerResult<u32> {
            let raw = required(name)?.trim();
            match raw.parse::<u32>() {
                Ok(v) if v > 0 => Ok(v),
                _ => Err(invalid(format!(
                    "'{}' must be a positive integer (found '{}')",
                    name, raw
                ))),
            }
        };

        let method = required(&columns.method)?.trim().to_string();
        let num_processes = positive(&columns.num_processes)?;
        let problem_size = positive(&columns.problem_size)?;
        let repetition = match self.get(row, &columns.repetition).map(str::trim) {
            None | Some("") => 1,
            Some(_) => positive(&columns.repetition)?,
        };
        let number = |name: &str| {
            self.get(row, name)
                .and_then(|v| v.trim().parse::<f64>().ok())
        };

        Ok(ExperimentCase {
            index: row,
            method,
            num_processes,
            problem_size,
            repetition,
            execution_time: number(EXECUTION_TIME),
            communication_time: number(COMMUNICATION_TIME),
            status: self.status(row).and_then(Result::ok),
            stderr: self.get(row, STDERR).unwrap_or_default().to_string(),
        })
    }

    /// Typed views of every row; fails on the first malformed row.
    pub fn cases(&self, columns: &FactorColumns) -> RunnerResult<Vec<ExperimentCase>> {
        (0..self.rows.len())
            .map(|row| self.case(row, columns))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsutil::scratch_dir;

    const SAMPLE: &str = "\
mpi_method,num_processes,matrix_size,repetition,execution_time,communication_time
bloqueante,4,128,1,,
coletiva,2,256,2,1.5,0.25
";

    fn sample() -> ResultTable {
        ResultTable::from_reader(SAMPLE.as_bytes()).expect("parse sample")
    }

    #[test]
    fn load_reports_missing_file() {
        let root = scratch_dir("table_missing");
        let err = ResultTable::load(&root.join("nope.csv")).expect_err("missing");
        assert!(matches!(err, RunnerError::TableMissing(_)), "{err}");
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn result_columns_are_appended_once_in_order() {
        let mut table = sample();
        table.ensure_result_columns();
        table.ensure_result_columns();
        assert_eq!(
            table.columns(),
            &[
                "mpi_method",
                "num_processes",
                "matrix_size",
                "repetition",
                "execution_time",
                "communication_time",
                "status",
                "stderr"
            ]
        );
        assert_eq!(table.get(1, STATUS), Some(""));
    }

    #[test]
    fn completeness_follows_metric_cells() {
        let mut table = sample();
        assert!(!table.is_complete(0));
        assert!(table.is_complete(1));
        table.set(1, COMMUNICATION_TIME, "  ");
        assert!(!table.is_complete(1));
    }

    #[test]
    fn case_view_parses_factors() {
        let table = sample();
        let case = table.case(1, &FactorColumns::default()).expect("case");
        assert_eq!(case.method, "coletiva");
        assert_eq!(case.num_processes, 2);
        assert_eq!(case.problem_size, 256);
        assert_eq!(case.repetition, 2);
        assert_eq!(case.execution_time, Some(1.5));
        assert_eq!(case.status, None);
    }

    #[test]
    fn missing_repetition_column_defaults_to_one() {
        let table = ResultTable::from_reader(
            "mpi_method,num_processes,matrix_size\nbloqueante,4,128\n".as_bytes(),
        )
        .expect("parse");
        let case = table.case(0, &FactorColumns::default()).expect("case");
        assert_eq!(case.repetition, 1);
    }

    #[test]
    fn malformed_factor_is_rejected_with_row_number() {
        let table = ResultTable::from_reader(
            "mpi_method,num_processes,matrix_size\nbloqueante,4,128\ncoletiva,zero,128\n"
                .as_bytes(),
        )
        .expect("parse");
        let err = table.cases(&FactorColumns::default()).expect_err("bad row");
        let msg = err.to_string();
        assert!(msg.contains("row 2"), "{}", msg);
        assert!(msg.contains("num_processes"), "{}", msg);
    }

    #[test]
    fn short_rows_are_padded_and_long_rows_rejected() {
        let table = ResultTable::from_reader("a,b,c\n1\n".as_bytes()).expect("short row");
        assert_eq!(table.get(0, "c"), Some(""));
        assert!(ResultTable::from_reader("a,b\n1,2,3\n".as_bytes()).is_err());
    }

    #[test]
    fn save_and_load_preserve_quoting_and_unknown_columns() {
        let root = scratch_dir("table_roundtrip");
        let path = root.join("experimental_design.csv");
        let mut table = ResultTable::new(["mpi_method", "num_processes", "matrix_size", "note"]);
        table
            .push_row(["bloqueante", "4", "128", "hand edited"])
            .expect("row");
        table.ensure_result_columns();
        table.set_status(0, CaseStatus::ExitCode(139));
        table.set_stderr(0, "line one\nline \"two\", with comma");
        table.save_atomic(&path).expect("save");

        let loaded = ResultTable::load(&path).expect("load");
        assert_eq!(loaded, table);
        assert_eq!(loaded.get(0, "note"), Some("hand edited"));
        assert_eq!(loaded.status(0), Some(Ok(CaseStatus::ExitCode(139))));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn unrecognised_status_text_is_kept() {
        let mut table = sample();
        table.set(0, STATUS, "manual_rerun");
        assert!(matches!(table.status(0), Some(Err(_))));
        assert_eq!(table.get(0, STATUS), Some("manual_rerun"));
        assert_eq!(table.status(1), None);
    }
}
