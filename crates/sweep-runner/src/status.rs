//! Case status and the classifier that produces it.

use crate::metrics::Metrics;
use std::fmt;
use std::str::FromStr;

/// Outcome recorded in a row's `status` cell. A pending case has no status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseStatus {
    Ok,
    /// Exit 0 but the timing lines were not found.
    ParseError,
    /// Exit 0 with oversized stdout: the MPI runtime dumped diagnostics
    /// instead of the two timing lines.
    MpiError,
    /// Non-zero exit code.
    ExitCode(i32),
    UnknownMethod,
    ExecutableMissing,
    SkippedExistingResults,
}

impl CaseStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, CaseStatus::Ok | CaseStatus::SkippedExistingResults)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseStatus::Ok => f.write_str("ok"),
            CaseStatus::ParseError => f.write_str("parse_error"),
            CaseStatus::MpiError => f.write_str("mpi_error"),
            CaseStatus::ExitCode(code) => write!(f, "rc_{}", code),
            CaseStatus::UnknownMethod => f.write_str("unknown_method"),
            CaseStatus::ExecutableMissing => f.write_str("executable_missing"),
            CaseStatus::SkippedExistingResults => f.write_str("skipped_existing_results"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognised status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for CaseStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ok" => Ok(CaseStatus::Ok),
            "parse_error" => Ok(CaseStatus::ParseError),
            "mpi_error" => Ok(CaseStatus::MpiError),
            "unknown_method" => Ok(CaseStatus::UnknownMethod),
            "executable_missing" => Ok(CaseStatus::ExecutableMissing),
            "skipped_existing_results" => Ok(CaseStatus::SkippedExistingResults),
            other => other
                .strip_prefix("rc_")
                .and_then(|code| code.parse::<i32>().ok())
                .map(CaseStatus::ExitCode)
                .ok_or_else(|| UnknownStatus(other.to_string())),
        }
    }
}

/// What happened when the engine tried to run a case.
#[derive(Debug, Clone, PartialEq)]
pub enum CaseOutcome {
    UnknownMethod,
    ExecutableMissing,
    Finished {
        exit_code: i32,
        /// Length of captured stdout in characters.
        stdout_len: usize,
        metrics: Option<Metrics>,
    },
}

/// Maps an outcome to exactly one status. `flood_threshold` is the largest
/// stdout length still accepted on a clean exit.
pub fn classify(outcome: &CaseOutcome, flood_threshold: usize) -> CaseStatus {
    match outcome {
        CaseOutcome::UnknownMethod => CaseStatus::UnknownMethod,
        CaseOutcome::ExecutableMissing => CaseStatus::ExecutableMissing,
        CaseOutcome::Finished { exit_code, .. } if *exit_code != 0 => {
            CaseStatus::ExitCode(*exit_code)
        }
        CaseOutcome::Finished { stdout_len, .. } if *stdout_len > flood_threshold => {
            CaseStatus::MpiError
        }
        CaseOutcome::Finished {
            metrics: Some(_), ..
        } => CaseStatus::Ok,
        CaseOutcome::Finished { metrics: None, .. } => CaseStatus::ParseError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: usize = 200;

    fn finished(exit_code: i32, stdout_len: usize, parsed: bool) -> CaseOutcome {
        CaseOutcome::Finished {
            exit_code,
            stdout_len,
            metrics: parsed.then(|| Metrics::from_text("1.0", "0.1").expect("metrics")),
        }
    }

    #[test]
    fn display_and_parse_agree() {
        for status in [
            CaseStatus::Ok,
            CaseStatus::ParseError,
            CaseStatus::MpiError,
            CaseStatus::ExitCode(139),
            CaseStatus::ExitCode(-9),
            CaseStatus::UnknownMethod,
            CaseStatus::ExecutableMissing,
            CaseStatus::SkippedExistingResults,
        ] {
            let text = status.to_string();
            assert_eq!(text.parse::<CaseStatus>().expect("parse"), status);
        }
        assert_eq!(CaseStatus::ExitCode(139).to_string(), "rc_139");
        assert!("rc_".parse::<CaseStatus>().is_err());
        assert!("done".parse::<CaseStatus>().is_err());
    }

    #[test]
    fn configuration_outcomes_win_over_everything() {
        assert_eq!(
            classify(&CaseOutcome::UnknownMethod, THRESHOLD),
            CaseStatus::UnknownMethod
        );
        assert_eq!(
            classify(&CaseOutcome::ExecutableMissing, THRESHOLD),
            CaseStatus::ExecutableMissing
        );
    }

    #[test]
    fn nonzero_exit_ignores_stdout_shape() {
        assert_eq!(
            classify(&finished(139, 5000, true), THRESHOLD),
            CaseStatus::ExitCode(139)
        );
        assert_eq!(
            classify(&finished(1, 0, false), THRESHOLD),
            CaseStatus::ExitCode(1)
        );
    }

    #[test]
    fn flood_beats_parsed_metrics_and_boundary_is_inclusive() {
        assert_eq!(
            classify(&finished(0, 5000, true), THRESHOLD),
            CaseStatus::MpiError
        );
        assert_eq!(
            classify(&finished(0, THRESHOLD + 1, false), THRESHOLD),
            CaseStatus::MpiError
        );
        assert_eq!(
            classify(&finished(0, THRESHOLD, true), THRESHOLD),
            CaseStatus::Ok
        );
    }

    #[test]
    fn classifier_is_total_over_outcome_grid() {
        let mut seen = std::collections::HashSet::new();
        for exit_code in [-11, 0, 1, 2, 139] {
            for stdout_len in [0, 1, THRESHOLD, THRESHOLD + 1, 5000] {
                for parsed in [false, true] {
                    let status = classify(&finished(exit_code, stdout_len, parsed), THRESHOLD);
                    let expected = if exit_code != 0 {
                        CaseStatus::ExitCode(exit_code)
                    } else if stdout_len > THRESHOLD {
                        CaseStatus::MpiError
                    } else if parsed {
                        CaseStatus::Ok
                    } else {
                        CaseStatus::ParseError
                    };
                    assert_eq!(status, expected, "{exit_code}/{stdout_len}/{parsed}");
                    seen.insert(status.to_string());
                }
            }
        }
        for name in ["ok", "parse_error", "mpi_error", "rc_139", "rc_-11"] {
            assert!(seen.contains(name), "never produced {}", name);
        }
    }
}
