//! Argon CLI - Command-line interface for the Argon model lifecycle pipeline
//!
//! This CLI provides an `argon` command with one subcommand per pipeline
//! stage. Each invocation runs a single stage and exits; stages hand values
//! forward through `.env_*` files in the handoff directory.

mod commands;
mod config;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use argon_pipeline::PipelineError;
use commands::{evaluate, health, promote, register, train, ConfigCommand, StageContext};

/// Argon - model lifecycle pipeline
///
/// Trains, gates, registers, promotes and monitors a model on a managed
/// training and serving platform.
#[derive(Parser, Debug)]
#[command(
    name = "argon",
    author,
    version,
    about = "Argon - model lifecycle pipeline",
    long_about = "Argon drives a model through training, evaluation, registration, promotion and health monitoring.\nEvery stage reads its configuration from the environment and exits non-zero on failure."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Directory holding stage handoff files and the metrics artifact
    #[arg(long, default_value = ".", global = true)]
    handoff_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a training job and wait for it to finish
    ///
    /// Writes MODEL_ARTIFACTS and TRAINING_JOB_NAME to .env_artifacts and the
    /// job's final metrics to the metrics artifact.
    Train {
        /// Output the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply the quality gate to the training metrics
    ///
    /// Writes MODEL_OK to .env_gate before reporting the verdict.
    Evaluate {
        /// Output the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Register the trained artifact as a new model package
    ///
    /// Writes MODEL_PACKAGE_ARN to .env_model.
    Register {
        /// Output the package ARN as JSON
        #[arg(long)]
        json: bool,
    },

    /// Deploy the registered package behind the endpoint
    Promote {
        /// Output the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check the endpoint's error count over the recent window
    ///
    /// Exits with code 3 when the endpoint is unhealthy.
    Health {
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect stage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn parse_level(level: &str) -> Level {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn init_tracing(level: Level, format: LogFormat) -> anyhow::Result<()> {
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.without_time().finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }
    Ok(())
}

/// Exit code for a failed run: pipeline errors carry their own, anything else is fatal.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<PipelineError>().map_or(1, PipelineError::exit_code)
}

async fn run(args: Args) -> anyhow::Result<()> {
    let loaded = config::load_environment(&args.handoff_dir)?;

    let level = args.log_level.as_deref().or(loaded.log_level.as_deref()).unwrap_or("info");
    init_tracing(parse_level(level), args.log_format)?;
    debug!(dir = %args.handoff_dir.display(), entries = loaded.handoff_entries, "Loaded handoff files");

    let ctx = StageContext::new(loaded.env, args.handoff_dir);

    match args.command {
        Command::Train { json } => train::execute(&ctx, json).await?,
        Command::Evaluate { json } => evaluate::execute(&ctx, json)?,
        Command::Register { json } => register::execute(&ctx, json).await?,
        Command::Promote { json } => promote::execute(&ctx, json).await?,
        Command::Health { json } => health::execute(&ctx, json).await?,
        Command::Config(cmd) => commands::config::execute(&ctx, cmd)?,
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(err) = run(args).await {
        eprintln!("{} {}", "✗".red().bold(), err.to_string().red());
        std::process::exit(exit_code(&err));
    }
}
