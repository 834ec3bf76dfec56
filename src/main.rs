//! EYG CLI - run IR programs and fixture suites

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use eyg::{driver, ir, suite, Extrinsics, MachineConfig};

#[derive(Parser)]
#[command(name = "eyg")]
#[command(about = "Evaluate EYG IR on the abstract machine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an IR file and print the result as JSON
    Run {
        file: PathBuf,
        #[command(flatten)]
        machine: MachineArgs,
    },
    /// Run a JSON fixture suite
    Suite {
        file: PathBuf,
        #[command(flatten)]
        machine: MachineArgs,
    },
}

#[derive(Args)]
struct MachineArgs {
    /// Stop after this many steps
    #[arg(long)]
    step_limit: Option<u64>,
    /// Allow a captured continuation to be resumed more than once
    #[arg(long)]
    multi_shot: bool,
}

impl MachineArgs {
    fn config(&self) -> MachineConfig {
        let mut config = MachineConfig::new();
        if let Some(limit) = self.step_limit {
            config = config.with_step_limit(limit);
        }
        if self.multi_shot {
            config = config.multi_shot();
        }
        config
    }
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { file, machine } => run_file(&file, machine.config()),
        Commands::Suite { file, machine } => run_suite(&file, machine.config()),
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn run_file(path: &Path, config: MachineConfig) -> Result<ExitCode> {
    let source = ir::parse(&read(path)?).with_context(|| format!("decoding {}", path.display()))?;
    let mut extrinsics = Extrinsics::console();

    match driver::run_with_config(source, &mut extrinsics, config) {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&ir::to_json(&value))?);
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            eprintln!("error: {}", failure);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run_suite(path: &Path, config: MachineConfig) -> Result<ExitCode> {
    let cases = suite::load(&read(path)?).with_context(|| format!("parsing suite {}", path.display()))?;
    let report = suite::run_suite(&cases, &config);

    for (name, failure) in &report.failed {
        println!("FAIL {}: {}", name, failure);
    }
    println!("{} passed, {} failed", report.passed, report.failed.len());

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
