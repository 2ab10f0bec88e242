//! `simuforge` — thin command shell over the experiment harness.
//!
//! Exit codes: 0 when the overall status is `passed` (suite: all passed),
//! 1 on any `failed`, 2 on any `error` (including unusable inputs).

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use simuforge_core::baseline::BaselineRecord;
use simuforge_core::report::SimulationReport;
use simuforge_core::scenario::builtin_scenarios;
use simuforge_core::runner;
use simuforge_core::spec::ExperimentSpec;

#[derive(Parser)]
#[command(name = "simuforge", version, about = "Deterministic rigid-body experiment harness")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one experiment and print its report.
    Run {
        /// Experiment document (YAML or JSON).
        spec: PathBuf,
        /// Baseline record to compare against.
        #[arg(long)]
        baseline: Option<PathBuf>,
        /// Write the report here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run one experiment and store its aggregates as a baseline record.
    Baseline {
        /// Experiment document (YAML or JSON).
        spec: PathBuf,
        /// Where to write the baseline record.
        #[arg(long, default_value = "baseline.json")]
        output: PathBuf,
    },
    /// Run every experiment document in a directory.
    Suite {
        /// Directory containing experiment documents.
        dir: PathBuf,
    },
    /// Deserialise and validate a document without simulating.
    Validate {
        /// Experiment document (YAML or JSON).
        spec: PathBuf,
    },
    /// List builtin scenarios and their parameters.
    Scenarios,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match dispatch(cli.command) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn dispatch(command: Command) -> Result<u8> {
    match command {
        Command::Run {
            spec,
            baseline,
            output,
        } => cmd_run(&spec, baseline.as_deref(), output.as_deref()),
        Command::Baseline { spec, output } => cmd_baseline(&spec, &output),
        Command::Suite { dir } => cmd_suite(&dir),
        Command::Validate { spec } => cmd_validate(&spec),
        Command::Scenarios => cmd_scenarios(),
    }
}

/// Loads an experiment document, picking the parser by file extension.
fn load_spec(path: &Path) -> Result<ExperimentSpec> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading spec {}", path.display()))?;
    let spec = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&text)
            .with_context(|| format!("parsing JSON spec {}", path.display()))?,
        _ => serde_yaml::from_str(&text)
            .with_context(|| format!("parsing YAML spec {}", path.display()))?,
    };
    Ok(spec)
}

fn load_baseline(path: &Path) -> Result<BaselineRecord> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading baseline {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("parsing baseline record {}", path.display()))
}

fn emit_report(report: &SimulationReport, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    match output {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("writing report {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_run(spec_path: &Path, baseline: Option<&Path>, output: Option<&Path>) -> Result<u8> {
    let spec = load_spec(spec_path)?;
    let record = baseline.map(load_baseline).transpose()?;
    let report = runner::run(&spec, record.as_ref())?;
    emit_report(&report, output)?;
    Ok(report.exit_code())
}

fn cmd_baseline(spec_path: &Path, output: &Path) -> Result<u8> {
    let spec = load_spec(spec_path)?;
    let report = runner::run(&spec, None)?;
    match &report.metrics {
        Some(metrics) => {
            let record = BaselineRecord::new(spec.name(), metrics.clone());
            fs::write(output, serde_json::to_string_pretty(&record)?)
                .with_context(|| format!("writing baseline {}", output.display()))?;
            info!(baseline = %output.display(), "baseline stored");
        }
        None => eprintln!("run errored; no baseline written"),
    }
    emit_report(&report, None)?;
    Ok(report.exit_code())
}

fn cmd_suite(dir: &Path) -> Result<u8> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("reading suite directory {}", dir.display()))?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yaml" | "yml" | "json")
            )
        })
        .collect();
    // Sorted walk keeps suite output and exit codes reproducible.
    paths.sort();
    anyhow::ensure!(!paths.is_empty(), "no experiment documents in {}", dir.display());

    let mut worst = 0_u8;
    for path in &paths {
        let code = match load_spec(path).and_then(|spec| Ok(runner::run(&spec, None)?)) {
            Ok(report) => {
                println!("{:<40} {}", path.display(), report.status);
                report.exit_code()
            }
            Err(err) => {
                println!("{:<40} error: {err:#}", path.display());
                2
            }
        };
        worst = worst.max(code);
    }
    Ok(worst)
}

fn cmd_validate(spec_path: &Path) -> Result<u8> {
    let spec = load_spec(spec_path)?;
    spec.validate()?;
    println!(
        "{} ok: {} ({} steps)",
        spec_path.display(),
        spec.name(),
        spec.steps()
    );
    Ok(0)
}

fn cmd_scenarios() -> Result<u8> {
    for info in builtin_scenarios() {
        println!("{:<16} {}", info.name, info.summary);
        for param in info.params {
            println!("    {:<18} default {:<10} {}", param.name, param.default, param.doc);
        }
    }
    Ok(0)
}

// =============================================================================
// Tests
// =============================================================================
