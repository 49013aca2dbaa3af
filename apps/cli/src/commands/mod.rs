//! Command implementations for the Argon CLI.

pub mod config;
pub mod evaluate;
pub mod health;
pub mod promote;
pub mod register;
pub mod train;

pub use config::ConfigCommand;

use argon_clients::HttpPlatformClient;
use argon_pipeline::{CancellationToken, EnvSnapshot, FileHandoffStore, PipelineResult, PlatformConfig, Stage};
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// What every stage command needs.
#[derive(Debug)]
pub struct StageContext {
    pub env: EnvSnapshot,
    pub handoff_dir: PathBuf,
}

impl StageContext {
    pub fn new(env: EnvSnapshot, handoff_dir: PathBuf) -> Self {
        Self { env, handoff_dir }
    }

    /// HTTP client for the configured platform.
    pub fn platform_client(&self, stage: Stage) -> PipelineResult<HttpPlatformClient> {
        let platform = PlatformConfig::resolve(stage, &self.env)?;
        debug!(
            stage = %stage,
            region = %platform.region,
            execution_url = %platform.execution_url,
            metrics_url = %platform.metrics_url,
            "Using platform"
        );
        let client = HttpPlatformClient::new(platform.execution_url, platform.metrics_url);
        Ok(match platform.token {
            Some(token) => client.with_token(token),
            None => client,
        })
    }

    /// Fresh handoff store for `file` in the handoff directory.
    pub fn store(&self, file: &str) -> FileHandoffStore {
        FileHandoffStore::new(self.handoff_dir.join(file))
    }
}

/// Cancels `token` on Ctrl-C. Abort the handle once the wait is over.
pub fn cancel_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping the wait, the remote job keeps running");
            token.cancel();
        }
    })
}
