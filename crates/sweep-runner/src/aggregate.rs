//! Per-size summary series computed from a finished (or partial) table.
//!
//! For every problem size three series are produced, each keyed by method
//! and worker count and averaged over repetitions: mean execution time,
//! mean share of time spent communicating, and speedup against the
//! baseline worker count. Each series is written as its own CSV file, ready
//! for whatever plotting tool the operator prefers.

use crate::config::{AggregateSettings, FactorColumns, HarnessConfig};
use crate::error::RunnerResult;
use crate::fsutil::{atomic_write_bytes, recreate_dir};
use crate::table::{ResultTable, COMMUNICATION_TIME, EXECUTION_TIME};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesMetric {
    ExecutionTime,
    CommunicationPercentage,
    Speedup,
}

impl SeriesMetric {
    pub const ALL: [SeriesMetric; 3] = [
        SeriesMetric::ExecutionTime,
        SeriesMetric::CommunicationPercentage,
        SeriesMetric::Speedup,
    ];

    pub fn file_name(&self, problem_size: u32) -> String {
        match self {
            SeriesMetric::ExecutionTime => format!("execution_time_methods_{}.csv", problem_size),
            SeriesMetric::CommunicationPercentage => {
                format!("communication_percentage_{}.csv", problem_size)
            }
            SeriesMetric::Speedup => format!("speedup_{}.csv", problem_size),
        }
    }
}

/// method -> worker count -> value
pub type MethodCurves = BTreeMap<String, BTreeMap<u32, f64>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub metric: SeriesMetric,
    pub problem_size: u32,
    pub curves: MethodCurves,
}

impl Series {
    pub fn is_empty(&self) -> bool {
        self.curves.values().all(BTreeMap::is_empty)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub output_dir: PathBuf,
    pub files: Vec<PathBuf>,
    pub empty_series: usize,
}

#[derive(Debug, Clone)]
struct Sample {
    method: String,
    num_processes: u32,
    problem_size: u32,
    execution_time: f64,
    communication_time: Option<f64>,
}

/// Rows whose factors or execution time do not parse are ignored.
fn samples(table: &ResultTable, columns: &FactorColumns) -> Vec<Sample> {
    let number = |row: usize, col: &str| table.get(row, col).map(str::trim);
    (0..table.len())
        .filter_map(|row| {
            let method = number(row, &columns.method)?.to_string();
            if method.is_empty() {
                return None;
            }
            Some(Sample {
                method,
                num_processes: number(row, &columns.num_processes)?.parse().ok()?,
                problem_size: number(row, &columns.problem_size)?.parse().ok()?,
                execution_time: number(row, EXECUTION_TIME)?.parse().ok()?,
                communication_time: number(row, COMMUNICATION_TIME)
                    .and_then(|v| v.parse().ok()),
            })
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn average(grouped: BTreeMap<String, BTreeMap<u32, Vec<f64>>>) -> MethodCurves {
    grouped
        .into_iter()
        .map(|(method, per_np)| {
            let curve = per_np
                .into_iter()
                .filter(|(_, values)| !values.is_empty())
                .map(|(np, values)| (np, mean(&values)))
                .collect();
            (method, curve)
        })
        .collect()
}

fn execution_curves(samples: &[Sample], size: u32) -> MethodCurves {
    let mut grouped: BTreeMap<String, BTreeMap<u32, Vec<f64>>> = BTreeMap::new();
    for s in samples.iter().filter(|s| s.problem_size == size) {
        if s.execution_time > 0.0 {
            grouped
                .entry(s.method.clone())
                .or_default()
                .entry(s.num_processes)
                .or_default()
                .push(s.execution_time);
        }
    }
    average(grouped)
}

fn communication_curves(samples: &[Sample], size: u32) -> MethodCurves {
    let mut grouped: BTreeMap<String, BTreeMap<u32, Vec<f64>>> = BTreeMap::new();
    for s in samples.iter().filter(|s| s.problem_size == size) {
        let Some(comm) = s.communication_time else {
            continue;
        };
        if s.execution_time > 0.0 && comm >= 0.0 {
            grouped
                .entry(s.method.clone())
                .or_default()
                .entry(s.num_processes)
                .or_default()
                .push(comm / s.execution_time * 100.0);
        }
    }
    average(grouped)
}

fn speedup_curves(samples: &[Sample], size: u32, baseline_np: u32) -> MethodCurves {
    let execution = execution_curves(samples, size);
    execution
        .into_iter()
        .filter_map(|(method, per_np)| {
            let baseline = *per_np.get(&baseline_np)?;
            let curve = per_np
                .into_iter()
                .map(|(np, exec)| (np, baseline / exec))
                .collect();
            Some((method, curve))
        })
        .collect()
}

/// Computes every series for every requested size.
pub fn aggregate(
    table: &ResultTable,
    columns: &FactorColumns,
    settings: &AggregateSettings,
) -> Vec<Series> {
    let samples = samples(table, columns);
    let sizes: BTreeSet<u32> = if settings.problem_sizes.is_empty() {
        samples.iter().map(|s| s.problem_size).collect()
    } else {
        settings.problem_sizes.iter().copied().collect()
    };

    let mut out = Vec::new();
    for size in sizes {
        for metric in SeriesMetric::ALL {
            let curves = match metric {
                SeriesMetric::ExecutionTime => execution_curves(&samples, size),
                SeriesMetric::CommunicationPercentage => communication_curves(&samples, size),
                SeriesMetric::Speedup => {
                    speedup_curves(&samples, size, settings.baseline_processes)
                }
            };
            out.push(Series {
                metric,
                problem_size: size,
                curves,
            });
        }
    }
    out
}

#[derive(Serialize)]
struct Point<'a> {
    method: &'a str,
    num_processes: u32,
    value: f64,
}

fn series_csv(series: &Series) -> RunnerResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for (method, curve) in &series.curves {
        for (np, value) in curve {
            writer.serialize(Point {
                method,
                num_processes: *np,
                value: *value,
            })?;
        }
    }
    writer
        .into_inner()
        .map_err(|e| std::io::Error::new(e.error().kind(), e.to_string()).into())
}

/// Clears `output_dir` and writes one file per non-empty series.
pub fn write_series(output_dir: &Path, series: &[Series]) -> RunnerResult<AggregateReport> {
    recreate_dir(output_dir)?;
    let mut report = AggregateReport {
        output_dir: output_dir.to_path_buf(),
        files: Vec::new(),
        empty_series: 0,
    };
    for s in series {
        if s.is_empty() {
            info!(metric = ?s.metric, size = s.problem_size, "no data for series");
            report.empty_series += 1;
            continue;
        }
        let path = output_dir.join(s.metric.file_name(s.problem_size));
        atomic_write_bytes(&path, &series_csv(s)?)?;
        info!(path = %path.display(), "series written");
        report.files.push(path);
    }
    Ok(report)
}

pub fn run_aggregation(
    config: &HarnessConfig,
    table_override: Option<&Path>,
    output_override: Option<&Path>,
) -> RunnerResult<AggregateReport> {
    let table_path = table_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.table_path());
    let table = ResultTable::load(&table_path)?;
    let output_dir = output_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.output_dir());
    let series = aggregate(&table, &config.columns, &config.aggregate);
    write_series(&output_dir, &series)
}
