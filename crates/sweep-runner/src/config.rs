//! Harness configuration.
//!
//! Everything the engine needs to know about the outside world lives here:
//! where the table is, which binary each method maps to, how the launcher is
//! called and the output thresholds used by the classifier. A config file is
//! optional; every field has a default matching the stock MPI benchmark
//! layout (`build/` binaries next to `experimental_design.csv`).

use crate::error::{RunnerError, RunnerResult};
use crate::fsutil::resolve_under;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "sweep.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub project_root: PathBuf,
    pub table_path: PathBuf,
    pub build_dir: PathBuf,
    pub launcher: String,
    pub methods: BTreeMap<String, String>,
    pub columns: FactorColumns,
    /// Stdout longer than this (in characters) on a clean exit is treated as
    /// a diagnostic flood.
    pub stdout_flood_threshold: usize,
    pub stderr_cap: usize,
    pub design: DesignLevels,
    pub aggregate: AggregateSettings,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            table_path: PathBuf::from("experimental_design.csv"),
            build_dir: PathBuf::from("build"),
            launcher: "mpirun".to_string(),
            methods: default_methods(),
            columns: FactorColumns::default(),
            stdout_flood_threshold: 200,
            stderr_cap: 2000,
            design: DesignLevels::default(),
            aggregate: AggregateSettings::default(),
        }
    }
}

/// Column names of the four factors, in generation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorColumns {
    pub method: String,
    pub num_processes: String,
    pub problem_size: String,
    pub repetition: String,
}

impl Default for FactorColumns {
    fn default() -> Self {
        Self {
            method: "mpi_method".to_string(),
            num_processes: "num_processes".to_string(),
            problem_size: "matrix_size".to_string(),
            repetition: "repetition".to_string(),
        }
    }
}

impl FactorColumns {
    pub fn in_order(&self) -> [&str; 4] {
        [
            &self.method,
            &self.num_processes,
            &self.problem_size,
            &self.repetition,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignLevels {
    pub methods: Vec<String>,
    pub num_processes: Vec<u32>,
    pub problem_sizes: Vec<u32>,
    pub repetitions: u32,
}

impl Default for DesignLevels {
    fn default() -> Self {
        Self {
            methods: ["coletiva", "bloqueante", "nao_bloqueante"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            num_processes: vec![1, 2, 4, 8, 12, 16, 20, 24, 28, 32, 36, 40],
            problem_sizes: vec![128, 256, 512, 1024],
            repetitions: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateSettings {
    pub output_dir: PathBuf,
    /// Worker count whose mean execution time is the speedup baseline.
    pub baseline_processes: u32,
    /// Sizes to emit series for; empty means every size found in the table.
    pub problem_sizes: Vec<u32>,
}

impl Default for AggregateSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("graphs"),
            baseline_processes: 1,
            problem_sizes: Vec::new(),
        }
    }
}

fn default_methods() -> BTreeMap<String, String> {
    [
        ("coletiva", "mpi_coletiva"),
        ("bloqueante", "mpi_p2p_bloqueante"),
        ("nao_bloqueante", "mpi_p2p_naobloqueante"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl HarnessConfig {
    /// Reads a YAML config. Relative `project_root` values are taken
    /// relative to the directory holding the file.
    pub fn load(path: &Path) -> RunnerResult<Self> {
        let raw = fs::read_to_string(path)?;
        let mut config: HarnessConfig = serde_yaml::from_str(&raw)?;
        if config.project_root.is_relative() {
            let base = path.parent().unwrap_or(Path::new("."));
            config.project_root = base.join(&config.project_root);
        }
        config.validate()?;
        Ok(config)
    }

    /// Loads `explicit` when given, else `sweep.yaml` in the current
    /// directory when present, else defaults.
    pub fn discover(explicit: Option<&Path>) -> RunnerResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            return Self::load(local);
        }
        Ok(Self::default())
    }

    pub fn validate(&self) -> RunnerResult<()> {
        let mut problems = Vec::new();
        if self.launcher.trim().is_empty() {
            problems.push("launcher must not be empty".to_string());
        }
        if self.methods.is_empty() {
            problems.push("methods must map at least one method".to_string());
        }
        if self.stdout_flood_threshold == 0 {
            problems.push("stdout_flood_threshold must be positive".to_string());
        }
        if self.stderr_cap == 0 {
            problems.push("stderr_cap must be positive".to_string());
        }
        let cols = self.columns.in_order();
        for (i, name) in cols.iter().enumerate() {
            if name.trim().is_empty() {
                problems.push(format!("factor column {} has an empty name", i + 1));
            }
            if cols[..i].contains(name) {
                problems.push(format!("factor column '{}' is listed twice", name));
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(RunnerError::Config(problems.join("; ")))
        }
    }

    pub fn to_yaml(&self) -> RunnerResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn table_path(&self) -> PathBuf {
        resolve_under(&self.project_root, &self.table_path)
    }

    pub fn build_dir(&self) -> PathBuf {
        resolve_under(&self.project_root, &self.build_dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        resolve_under(&self.project_root, &self.aggregate.output_dir)
    }

    /// Path of the binary for `method`, or `None` if the method is not mapped.
    pub fn executable_for(&self, method: &str) -> Option<PathBuf> {
        self.methods
            .get(method)
            .map(|name| self.build_dir().join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsutil::scratch_dir;

    #[test]
    fn defaults_match_stock_layout() {
        let config = HarnessConfig::default();
        config.validate().expect("defaults are valid");
        assert_eq!(config.launcher, "mpirun");
        assert_eq!(config.stdout_flood_threshold, 200);
        assert_eq!(config.stderr_cap, 2000);
        assert_eq!(
            config.executable_for("bloqueante"),
            Some(PathBuf::from("./build/mpi_p2p_bloqueante"))
        );
        assert_eq!(config.executable_for("desconhecido"), None);
    }

    #[test]
    fn load_fills_missing_fields_and_anchors_root_at_file() {
        let root = scratch_dir("config_load");
        let path = root.join("sweep.yaml");
        fs::write(
            &path,
            "launcher: /usr/bin/mpiexec\nmethods:\n  ring: ring_bin\nstdout_flood_threshold: 512\n",
        )
        .expect("write config");
        let config = HarnessConfig::load(&path).expect("load");
        assert_eq!(config.launcher, "/usr/bin/mpiexec");
        assert_eq!(config.stdout_flood_threshold, 512);
        assert_eq!(config.stderr_cap, 2000);
        assert_eq!(config.project_root, root.join("."));
        assert_eq!(
            config.executable_for("ring"),
            Some(root.join(".").join("build").join("ring_bin"))
        );
        assert!(config.executable_for("coletiva").is_none());
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn template_round_trips_through_yaml() {
        let root = scratch_dir("config_template");
        let path = root.join("sweep.yaml");
        fs::write(&path, HarnessConfig::default().to_yaml().expect("yaml")).expect("write");
        let loaded = HarnessConfig::load(&path).expect("load");
        assert_eq!(loaded.methods, HarnessConfig::default().methods);
        assert_eq!(loaded.design.num_processes.len(), 12);
        assert_eq!(loaded.columns, FactorColumns::default());
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn validate_reports_every_problem() {
        let config = HarnessConfig {
            launcher: " ".to_string(),
            methods: BTreeMap::new(),
            stdout_flood_threshold: 0,
            columns: FactorColumns {
                repetition: "mpi_method".to_string(),
                ..FactorColumns::default()
            },
            ..HarnessConfig::default()
        };
        let msg = config.validate().expect_err("invalid").to_string();
        assert!(msg.contains("launcher"), "{}", msg);
        assert!(msg.contains("methods"), "{}", msg);
        assert!(msg.contains("stdout_flood_threshold"), "{}", msg);
        assert!(msg.contains("listed twice"), "{}", msg);
    }
}
