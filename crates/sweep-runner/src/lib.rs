//! Resumable runner for factorial MPI benchmark sweeps.
//!
//! A sweep is a CSV table with one row per (method, worker count, problem
//! size, repetition). [`engine::ExecutionEngine`] walks it in order, launches
//! each case through `mpirun`, classifies the outcome, pulls the two timing
//! lines out of stdout and rewrites the table after every case.

pub mod aggregate;
pub mod config;
pub mod design;
pub mod engine;
pub mod error;
pub mod fsutil;
pub mod invoke;
pub mod metrics;
pub mod overview;
pub mod status;
pub mod table;

pub use aggregate::{aggregate, run_aggregation, AggregateReport, Series, SeriesMetric};
pub use config::{AggregateSettings, DesignLevels, FactorColumns, HarnessConfig};
pub use design::FactorialDesign;
pub use engine::{run_sweep, Checkpoint, ExecutionEngine, RunSummary, TableFile};
pub use error::{RunnerError, RunnerResult};
pub use invoke::{Invocation, Launcher, MpiLauncher};
pub use metrics::{extract, Metrics};
pub use overview::TableOverview;
pub use status::{classify, CaseOutcome, CaseStatus};
pub use table::{ExperimentCase, ResultTable};
