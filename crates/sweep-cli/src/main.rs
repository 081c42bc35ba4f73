use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use sweep_runner::{
    run_aggregation, run_sweep, FactorialDesign, HarnessConfig, ResultTable, RunSummary,
    TableOverview,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sweep", version = "0.3.0", about = "Resumable MPI benchmark sweep runner")]
struct Cli {
    /// Harness config (defaults to ./sweep.yaml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the full-factorial experiment table.
    Design {
        #[arg(long)]
        table: Option<PathBuf>,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        json: bool,
    },
    /// Run every incomplete case, checkpointing after each one.
    Run {
        #[arg(long)]
        table: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Show progress and outcome counts for a table.
    Describe {
        #[arg(long)]
        table: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Write per-size execution time, communication share and speedup as CSV
    /// series (no chart rendering).
    Aggregate {
        #[arg(long)]
        table: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Write a config file populated with the defaults.
    InitConfig {
        #[arg(long, default_value = "sweep.yaml")]
        path: PathBuf,
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let json_mode = command_json_mode(&cli.command);
    let result = run_command(cli.config.as_deref(), cli.command);
    match result {
        Ok(Some(payload)) => {
            emit_json(&payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                emit_json(&json_error("command_failed", err.to_string(), json!({})));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "sweep=debug,sweep_runner=debug"
    } else {
        "sweep=info,sweep_runner=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_command(config_path: Option<&Path>, command: Commands) -> Result<Option<Value>> {
    let load_config = || -> Result<HarnessConfig> {
        let config = HarnessConfig::discover(config_path)?;
        debug!(
            root = %config.project_root.display(),
            launcher = %config.launcher,
            methods = config.methods.len(),
            "config loaded"
        );
        Ok(config)
    };
    match command {
        Commands::InitConfig { path, force } => {
            write_config_template(&path, force)?;
            println!("config: {}", path.display());
        }
        Commands::Design { table, force, json } => {
            let config = load_config()?;
            let path = table.unwrap_or_else(|| config.table_path());
            let design = FactorialDesign::from(&config.design);
            let cases = design.write(&config.columns, &path, force)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "design",
                    "table": path.display().to_string(),
                    "cases": cases,
                })));
            }
            println!("table: {}", path.display());
            println!("cases: {}", cases);
        }
        Commands::Run { table, json } => {
            let config = load_config()?;
            let summary = run_sweep(&config, table.as_deref())?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "run",
                    "summary": serde_json::to_value(&summary)?,
                })));
            }
            print_run_summary(&summary);
        }
        Commands::Describe { table, json } => {
            let config = load_config()?;
            let path = table.unwrap_or_else(|| config.table_path());
            let overview = TableOverview::from_table(&ResultTable::load(&path)?);
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "describe",
                    "table": path.display().to_string(),
                    "overview": serde_json::to_value(&overview)?,
                })));
            }
            print_overview(&path, &overview);
        }
        Commands::Aggregate { table, out, json } => {
            let config = load_config()?;
            let report = run_aggregation(&config, table.as_deref(), out.as_deref())?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "aggregate",
                    "report": serde_json::to_value(&report)?,
                })));
            }
            println!("output_dir: {}", report.output_dir.display());
            for file in &report.files {
                println!("  {}", file.display());
            }
            println!("empty_series: {}", report.empty_series);
        }
    }
    Ok(None)
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\",\"details\":{{}}}}}}"
        ),
    }
}

fn json_error(code: &str, message: String, details: Value) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Design { json, .. }
        | Commands::Run { json, .. }
        | Commands::Describe { json, .. }
        | Commands::Aggregate { json, .. } => *json,
        Commands::InitConfig { .. } => false,
    }
}

fn print_run_summary(summary: &RunSummary) {
    println!("cases: {}", summary.total);
    println!("executed: {}", summary.executed);
    println!("skipped: {}", summary.skipped);
    for (status, count) in &summary.by_status {
        println!("  {}: {}", status, count);
    }
}

fn print_overview(path: &Path, overview: &TableOverview) {
    println!("table: {}", path.display());
    println!("rows: {}", overview.rows);
    println!("complete: {}", overview.complete);
    println!("remaining: {}", overview.remaining());
    println!("pending: {}", overview.pending);
    for (status, count) in &overview.by_status {
        println!("  {}: {}", status, count);
    }
}

fn write_config_template(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(anyhow::anyhow!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, HarnessConfig::default().to_yaml()?)?;
    Ok(())
}
