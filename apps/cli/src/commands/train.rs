//! Training command implementation.

use anyhow::Result;
use argon_pipeline::handoff::ARTIFACTS_FILE;
use argon_pipeline::{run_training, CancellationToken, ResourceNamer, Stage, TrainingConfig};
use colored::Colorize;
use serde_json::json;

use super::{cancel_on_ctrl_c, StageContext};

pub async fn execute(ctx: &StageContext, json_output: bool) -> Result<()> {
    let config = TrainingConfig::resolve(&ctx.env)?;
    let client = ctx.platform_client(Stage::Training)?;
    let mut store = ctx.store(ARTIFACTS_FILE);

    let cancel = CancellationToken::new();
    let interrupt = cancel_on_ctrl_c(cancel.clone());
    let result = run_training(&config, &client, &mut store, &ResourceNamer::new(), &cancel).await;
    interrupt.abort();
    let outcome = result?;

    if json_output {
        let out = json!({
            "job_name": outcome.job_name,
            "model_artifacts": outcome.artifact_uri,
            "metrics": outcome.metrics.metrics,
            "metrics_file": config.metrics_file,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("{}", "Training complete".bold().green());
    println!("  Job:       {}", outcome.job_name.cyan());
    println!("  Artifacts: {}", outcome.artifact_uri);
    if outcome.metrics.metrics.is_empty() {
        println!("  Metrics:   {}", "none reported".dimmed());
    } else {
        println!("  Metrics:");
        for (name, value) in &outcome.metrics.metrics {
            println!("    {:<28} {}", name, value);
        }
    }
    println!("  Handoff:   {}", store.path().display().to_string().dimmed());
    println!();
    Ok(())
}
