//! Config command implementation.

use anyhow::Result;
use argon_pipeline::{
    required_keys, EnvSnapshot, EvaluationConfig, HealthConfig, PipelineResult, PlatformConfig,
    PromotionConfig, RegistrationConfig, Stage, TrainingConfig,
};
use clap::{Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::json;

use super::StageContext;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Verify that a stage's configuration resolves
    ///
    /// Lists the stage's required keys and reports every missing or invalid
    /// value at once. Exits with code 2 when the configuration is incomplete.
    Check {
        /// Stage to check
        #[arg(value_enum)]
        stage: StageArg,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StageArg {
    Train,
    Evaluate,
    Register,
    Promote,
    Health,
}

impl From<StageArg> for Stage {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Train => Stage::Training,
            StageArg::Evaluate => Stage::Evaluation,
            StageArg::Register => Stage::Registration,
            StageArg::Promote => Stage::Promotion,
            StageArg::Health => Stage::Health,
        }
    }
}

pub fn execute(ctx: &StageContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Check { stage, json } => check(ctx, stage.into(), json),
    }
}

/// Resolves the platform and stage configuration, discarding the result.
fn resolve_stage(stage: Stage, env: &EnvSnapshot) -> PipelineResult<()> {
    PlatformConfig::resolve(stage, env)?;
    match stage {
        Stage::Training => TrainingConfig::resolve(env).map(drop),
        Stage::Evaluation => EvaluationConfig::resolve(env).map(drop),
        Stage::Registration => RegistrationConfig::resolve(env).map(drop),
        Stage::Promotion => PromotionConfig::resolve(env).map(drop),
        Stage::Health => HealthConfig::resolve(env).map(drop),
    }
}

fn check(ctx: &StageContext, stage: Stage, json_output: bool) -> Result<()> {
    let required = required_keys(stage);
    let result = resolve_stage(stage, &ctx.env);

    if json_output {
        let keys: Vec<_> = required
            .iter()
            .map(|key| json!({ "key": key, "present": ctx.env.get(key).is_some() }))
            .collect();
        let out = json!({
            "stage": stage.as_str(),
            "required": keys,
            "ok": result.is_ok(),
            "error": result.as_ref().err().map(ToString::to_string),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        println!("{}", format!("Configuration: {stage}").bold().cyan());
        if required.is_empty() {
            println!("  {}", "No required keys".dimmed());
        }
        for key in required {
            if ctx.env.get(key).is_some() {
                println!("  {} {}", "✓".green(), key);
            } else {
                println!("  {} {}", "✗".red(), key);
            }
        }
        println!();
        if result.is_ok() {
            println!("{} {} stage is ready", "✓".green(), stage);
        }
    }

    result.map_err(Into::into)
}
