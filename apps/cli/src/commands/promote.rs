//! Promotion command implementation.

use anyhow::Result;
use argon_pipeline::{promote, PromotionConfig, ResourceNamer, Stage};
use colored::Colorize;
use serde_json::json;

use super::StageContext;

pub async fn execute(ctx: &StageContext, json_output: bool) -> Result<()> {
    let config = PromotionConfig::resolve(&ctx.env)?;
    let client = ctx.platform_client(Stage::Promotion)?;

    let outcome = promote(&config, &client, &ResourceNamer::new()).await?;

    if json_output {
        let out = json!({
            "endpoint": outcome.endpoint_name,
            "model": outcome.model_name,
            "endpoint_config": outcome.endpoint_config_name,
            "action": outcome.action.to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("{}", format!("Endpoint {}", outcome.action).bold().green());
    println!("  Endpoint: {}", outcome.endpoint_name.cyan());
    println!("  Model:    {}", outcome.model_name);
    println!("  Config:   {}", outcome.endpoint_config_name);
    println!();
    Ok(())
}
