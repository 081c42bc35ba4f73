//! Timing extraction from the benchmark's stdout.
//!
//! The coordinating rank prints two labelled lines when it finishes:
//!
//! ```text
//! Execution time: 0.123456
//! Communication time: 0.012345
//! ```
//!
//! Labels must match exactly. Values are unsigned decimals without exponent.
//! The digits are kept as printed so the table holds exactly what the
//! benchmark reported.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub execution_time: f64,
    pub communication_time: f64,
    /// Matched text, written to the table verbatim.
    pub execution_text: String,
    pub communication_text: String,
}

impl Metrics {
    /// Builds metrics from the printed digits; `None` if either does not parse.
    pub fn from_text(execution: &str, communication: &str) -> Option<Self> {
        Some(Self {
            execution_time: execution.parse().ok()?,
            communication_time: communication.parse().ok()?,
            execution_text: execution.to_string(),
            communication_text: communication.to_string(),
        })
    }
}

fn execution_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Execution time:\s*([0-9]*\.?[0-9]+)").expect("valid execution time regex")
    })
}

fn communication_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Communication time:\s*([0-9]*\.?[0-9]+)")
            .expect("valid communication time regex")
    })
}

fn first_match<'t>(pattern: &Regex, text: &'t str) -> Option<&'t str> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Returns both timings, or `None` if either label is missing.
pub fn extract(stdout: &str) -> Option<Metrics> {
    let execution = first_match(execution_pattern(), stdout)?;
    let communication = first_match(communication_pattern(), stdout)?;
    Metrics::from_text(execution, communication)
}
