//! Registration command implementation.

use anyhow::Result;
use argon_pipeline::handoff::MODEL_FILE;
use argon_pipeline::{register_model, RegistrationConfig, Stage};
use colored::Colorize;
use serde_json::json;

use super::StageContext;

pub async fn execute(ctx: &StageContext, json_output: bool) -> Result<()> {
    let config = RegistrationConfig::resolve(&ctx.env)?;
    let client = ctx.platform_client(Stage::Registration)?;
    let mut store = ctx.store(MODEL_FILE);

    let package_arn = register_model(&config, &client, &mut store).await?;

    if json_output {
        let out = json!({
            "model_package_group": config.group_name,
            "model_package_arn": package_arn,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("{}", "Model registered".bold().green());
    println!("  Group:   {}", config.group_name.cyan());
    println!("  Package: {}", package_arn);
    println!("  Status:  {}", "PendingManualApproval".yellow());
    println!();
    Ok(())
}
