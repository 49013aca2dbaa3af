//! CLI configuration loading and merging.

use argon_pipeline::config::DEFAULT_METRICS_FILE;
use argon_pipeline::{load_handoff_dir, ArgonConfig, EnvSnapshot, PipelineResult};
use std::path::Path;

/// Environment snapshot and settings for one invocation.
#[derive(Debug)]
pub struct LoadedEnvironment {
    pub env: EnvSnapshot,
    pub log_level: Option<String>,
    /// Number of values read from handoff files.
    pub handoff_entries: usize,
}

/// Builds the snapshot every stage resolves its configuration from.
///
/// Configuration precedence:
/// 1. Environment variables
/// 2. Stage handoff files in `handoff_dir`
/// 3. Local config file (./.argonrc)
/// 4. Global config file (~/.argon/config.toml)
/// 5. Defaults
pub fn load_environment(handoff_dir: &Path) -> PipelineResult<LoadedEnvironment> {
    let file_config = ArgonConfig::discover_and_load()?;
    let handoff = load_handoff_dir(handoff_dir)?;
    let handoff_entries = handoff.len();

    let mut env = EnvSnapshot::from_process();
    env.layer_defaults(handoff);
    env.layer_defaults(file_config.env);
    env.layer_defaults([("METRICS_FILE", handoff_dir.join(DEFAULT_METRICS_FILE).display().to_string())]);

    Ok(LoadedEnvironment { env, log_level: file_config.log_level, handoff_entries })
}
