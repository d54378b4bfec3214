use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ps_engine::RunSpec;
use ps_search::{Execution, WalkMode};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Log every feasible grid point
    Space,
    /// Log the feasible interval of the last axis for every prefix
    Extrema,
}

impl From<Mode> for WalkMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Space => WalkMode::Space,
            Mode::Extrema => WalkMode::Extrema,
        }
    }
}

/// Map where an evaluator succeeds across a parameter space
#[derive(Parser)]
#[command(name = "ps-explore")]
#[command(about = "Map where an evaluator succeeds across a parameter space", long_about = None)]
#[command(version)]
struct Cli {
    /// Run file (search config, initial point, evaluator)
    run: PathBuf,

    /// JSON Lines file records are appended to
    #[arg(short, long, env = "PS_OUTPUT")]
    output: PathBuf,

    /// What to record for the last axis
    #[arg(short, long, value_enum, default_value = "space")]
    mode: Mode,

    /// Scan both directions of every sweep concurrently
    #[arg(long)]
    parallel: bool,

    /// Log level
    #[arg(long, env = "PS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "PS_LOG_JSON")]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    // Logs go to stderr; stdout carries the summary.
    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let spec = RunSpec::from_path(&cli.run)
        .with_context(|| format!("loading run file {}", cli.run.display()))?;

    let execution = if cli.parallel {
        Execution::Parallel
    } else {
        Execution::Sequential
    };
    let summary = spec
        .run(&cli.output, cli.mode.into(), execution)
        .context("exploration aborted")?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
