//! Evaluation command implementation.

use anyhow::Result;
use argon_pipeline::handoff::GATE_FILE;
use argon_pipeline::{evaluate, load_metric, EvaluationConfig};
use colored::Colorize;
use serde_json::json;

use super::StageContext;

/// Runs the gate. A failing gate still writes `MODEL_OK=false` before the
/// error is returned.
pub fn execute(ctx: &StageContext, json_output: bool) -> Result<()> {
    let config = EvaluationConfig::resolve(&ctx.env)?;
    let metric = load_metric(&config)?;
    let mut store = ctx.store(GATE_FILE);

    evaluate(&metric, config.threshold, config.direction, &mut store)?;

    if json_output {
        let out = json!({
            "metric": metric.name,
            "value": metric.value,
            "threshold": config.threshold,
            "direction": config.direction,
            "passed": true,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "{} {} = {} meets threshold {} ({})",
        "✓".green(),
        metric.name.cyan(),
        metric.value,
        config.threshold,
        config.direction
    );
    Ok(())
}
