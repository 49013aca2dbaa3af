//! Health command implementation.

use anyhow::Result;
use argon_pipeline::{check_health, HealthConfig, Stage};
use chrono::Utc;
use colored::Colorize;
use serde_json::json;

use super::StageContext;

/// Checks the endpoint. An unhealthy endpoint surfaces as an error so the
/// process exits with the monitoring exit code.
pub async fn execute(ctx: &StageContext, json_output: bool) -> Result<()> {
    let config = HealthConfig::resolve(&ctx.env)?;
    let client = ctx.platform_client(Stage::Health)?;

    let report = check_health(&config, &client, Utc::now()).await?;

    if json_output {
        let out = json!({
            "endpoint": report.endpoint,
            "metric": config.metric_name,
            "error_count": report.error_count,
            "threshold": report.threshold,
            "datapoints": report.datapoints,
            "window_start": report.window_start,
            "window_end": report.window_end,
            "healthy": true,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "{} {} healthy: {} {} in the last {} min (threshold {})",
        "✓".green(),
        report.endpoint.cyan(),
        report.error_count,
        config.metric_name,
        config.window.as_secs() / 60,
        report.threshold
    );
    Ok(())
}
