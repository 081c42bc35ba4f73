//! Error type for the sweep runner.
//!
//! Only conditions that stop a whole sweep are errors. Anything that goes
//! wrong for a single case (bad method, missing binary, crash, garbled
//! output) is written into that case's `status` cell instead.

use std::path::PathBuf;
use thiserror::Error;

pub type RunnerResult<T> = std::result::Result<T, RunnerError>;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("result table not found: {}", .0.display())]
    TableMissing(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("row {row}: {message}")]
    InvalidCase { row: usize, message: String },

    #[error("checkpoint write to {} failed: {source}", path.display())]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: Box<RunnerError>,
    },

    #[error("invalid design: {0}")]
    Design(String),
}
