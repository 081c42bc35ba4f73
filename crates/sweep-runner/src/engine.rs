//! The per-case control loop.
//!
//! Cases run one at a time in table order. Each benchmark is itself a
//! multi-process job sized to the machine, so overlapping two would skew
//! both timings. After every case, skipped ones included, the whole table
//! is checkpointed; a killed sweep loses at most the case that was running
//! and picks up from the first incomplete row on the next run.

use crate::config::HarnessConfig;
use crate::error::{RunnerError, RunnerResult};
use crate::invoke::{Launcher, MpiLauncher};
use crate::metrics::extract;
use crate::status::{classify, CaseOutcome, CaseStatus};
use crate::table::{ExperimentCase, ResultTable, STATUS};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Durable sink for table snapshots.
pub trait Checkpoint {
    fn save(&self, table: &ResultTable) -> RunnerResult<()>;
}

/// Checkpoints by atomically rewriting a CSV file.
#[derive(Debug, Clone)]
pub struct TableFile {
    path: PathBuf,
}

impl TableFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> RunnerResult<ResultTable> {
        ResultTable::load(&self.path)
    }
}

impl Checkpoint for TableFile {
    fn save(&self, table: &ResultTable) -> RunnerResult<()> {
        table
            .save_atomic(&self.path)
            .map_err(|e| RunnerError::Checkpoint {
                path: self.path.clone(),
                source: Box::new(e),
            })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub executed: usize,
    pub skipped: usize,
    /// Final status text of every row touched in this run.
    pub by_status: BTreeMap<String, usize>,
    pub started_at: String,
    pub finished_at: String,
}

/// Trims and caps diagnostic text stored in the `stderr` column.
pub fn excerpt(text: &str, cap: usize) -> String {
    text.trim().chars().take(cap).collect()
}

pub struct ExecutionEngine<'a, L> {
    config: &'a HarnessConfig,
    launcher: L,
}

impl<'a, L: Launcher> ExecutionEngine<'a, L> {
    pub fn new(config: &'a HarnessConfig, launcher: L) -> Self {
        Self { config, launcher }
    }

    /// Processes every row once, checkpointing after each. Case failures
    /// end up in the table; only a malformed table or a failed checkpoint
    /// write is returned as an error.
    pub fn run(
        &self,
        table: &mut ResultTable,
        checkpoint: &dyn Checkpoint,
    ) -> RunnerResult<RunSummary> {
        table.ensure_result_columns();
        let cases = table.cases(&self.config.columns)?;
        let mut summary = RunSummary {
            total: cases.len(),
            started_at: Utc::now().to_rfc3339(),
            ..RunSummary::default()
        };

        for (i, case) in cases.iter().enumerate() {
            info!(
                "Executing case {} of {} (repetition {}): {} np={} size={}",
                i + 1,
                cases.len(),
                case.repetition,
                case.method,
                case.num_processes,
                case.problem_size
            );
            if self.run_case(table, case) {
                summary.executed += 1;
            } else {
                summary.skipped += 1;
            }
            checkpoint.save(table)?;

            let status = table.get(case.index, STATUS).unwrap_or_default();
            *summary.by_status.entry(status.to_string()).or_insert(0) += 1;
        }

        summary.finished_at = Utc::now().to_rfc3339();
        info!(
            total = summary.total,
            executed = summary.executed,
            skipped = summary.skipped,
            "sweep finished"
        );
        Ok(summary)
    }

    /// Returns false when the row already had results.
    fn run_case(&self, table: &mut ResultTable, case: &ExperimentCase) -> bool {
        let row = case.index;
        if table.is_complete(row) {
            info!("Skipping existing results");
            if table.status(row).is_none() {
                table.set_status(row, CaseStatus::SkippedExistingResults);
            }
            return false;
        }

        let (outcome, stderr) = self.attempt(case);
        let status = classify(&outcome, self.config.stdout_flood_threshold);

        table.clear_metrics(row);
        if let (
            CaseStatus::Ok,
            CaseOutcome::Finished {
                metrics: Some(metrics),
                ..
            },
        ) = (status, &outcome)
        {
            table.record_metrics(row, metrics);
        }
        table.set_status(row, status);
        table.set_stderr(row, excerpt(&stderr, self.config.stderr_cap));

        if status.is_ok() {
            debug!(%status, "case finished");
        } else {
            warn!(
                %status,
                method = %case.method,
                np = case.num_processes,
                size = case.problem_size,
                "case failed"
            );
        }
        true
    }

    fn attempt(&self, case: &ExperimentCase) -> (CaseOutcome, String) {
        let Some(executable) = self.config.executable_for(&case.method) else {
            return (
                CaseOutcome::UnknownMethod,
                format!("Unknown method '{}'", case.method),
            );
        };
        if !executable.is_file() {
            return (
                CaseOutcome::ExecutableMissing,
                format!("Executable not found: {}", executable.display()),
            );
        }

        let invocation = self
            .launcher
            .invoke(&executable, case.num_processes, case.problem_size);
        let outcome = CaseOutcome::Finished {
            exit_code: invocation.exit_code,
            stdout_len: invocation.stdout.chars().count(),
            metrics: extract(&invocation.stdout),
        };
        (outcome, invocation.stderr)
    }
}

/// Loads the configured table, runs every case through `mpirun` and leaves
/// the updated table on disk.
pub fn run_sweep(
    config: &HarnessConfig,
    table_override: Option<&Path>,
) -> RunnerResult<RunSummary> {
    config.validate()?;
    let file = TableFile::new(
        table_override
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config.table_path()),
    );
    let mut table = file.load()?;
    info!(path = %file.path().display(), rows = table.len(), "loaded result table");
    let launcher = MpiLauncher::new(config.launcher.clone(), config.project_root.clone());
    ExecutionEngine::new(config, launcher).run(&mut table, &file)
}
