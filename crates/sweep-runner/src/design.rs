//! Full-factorial design generation.

use crate::config::{DesignLevels, FactorColumns};
use crate::error::{RunnerError, RunnerResult};
use crate::table::{ResultTable, COMMUNICATION_TIME, EXECUTION_TIME};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorialDesign {
    pub methods: Vec<String>,
    pub num_processes: Vec<u32>,
    pub problem_sizes: Vec<u32>,
    pub repetitions: u32,
}

impl From<&DesignLevels> for FactorialDesign {
    fn from(levels: &DesignLevels) -> Self {
        Self {
            methods: levels.methods.clone(),
            num_processes: levels.num_processes.clone(),
            problem_sizes: levels.problem_sizes.clone(),
            repetitions: levels.repetitions,
        }
    }
}

impl FactorialDesign {
    pub fn validate(&self) -> RunnerResult<()> {
        let mut problems = Vec::new();
        if self.methods.is_empty() {
            problems.push("no methods");
        }
        if self.methods.iter().any(|m| m.trim().is_empty()) {
            problems.push("empty method name");
        }
        if self.num_processes.is_empty() {
            problems.push("no process counts");
        }
        if self.num_processes.contains(&0) {
            problems.push("process count of zero");
        }
        if self.problem_sizes.is_empty() {
            problems.push("no problem sizes");
        }
        if self.problem_sizes.contains(&0) {
            problems.push("problem size of zero");
        }
        if self.repetitions == 0 {
            problems.push("zero repetitions");
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(RunnerError::Design(problems.join(", ")))
        }
    }

    pub fn case_count(&self) -> usize {
        self.methods.len()
            * self.num_processes.len()
            * self.problem_sizes.len()
            * self.repetitions as usize
    }

    /// Every combination, method outermost and repetition innermost, with
    /// empty metric columns ready for the engine.
    pub fn generate(&self, columns: &FactorColumns) -> RunnerResult<ResultTable> {
        self.validate()?;
        let mut header: Vec<&str> = columns.in_order().to_vec();
        header.extend([EXECUTION_TIME, COMMUNICATION_TIME]);
        let mut table = ResultTable::new(header);
        for method in &self.methods {
            for np in &self.num_processes {
                for size in &self.problem_sizes {
                    for rep in 1..=self.repetitions {
                        table.push_row([
                            method.clone(),
                            np.to_string(),
                            size.to_string(),
                            rep.to_string(),
                        ])?;
                    }
                }
            }
        }
        Ok(table)
    }

    /// Writes the design to `path`. An existing table holds results, so it is
    /// only replaced when `force` is set.
    pub fn write(&self, columns: &FactorColumns, path: &Path, force: bool) -> RunnerResult<usize> {
        if path.exists() && !force {
            return Err(RunnerError::Design(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }
        let table = self.generate(columns)?;
        table.save_atomic(path)?;
        info!(path = %path.display(), cases = table.len(), "design written");
        Ok(table.len())
    }
}
