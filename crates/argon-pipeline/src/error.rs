use argon_platform::{PlatformError, TrainingJobStatus};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::evaluation::MetricDirection;

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// The five pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Training,
    Evaluation,
    Registration,
    Promotion,
    Health,
}

impl Stage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Training => "train",
            Self::Evaluation => "evaluate",
            Self::Registration => "register",
            Self::Promotion => "promote",
            Self::Health => "health",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configuration key whose value could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidKey {
    pub key: String,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for InvalidKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?} ({})", self.key, self.value, self.reason)
    }
}

fn describe_config_problems(missing: &[String], invalid: &[InvalidKey]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing required environment variables: {}", missing.join(", ")));
    }
    if !invalid.is_empty() {
        let listed: Vec<String> = invalid.iter().map(ToString::to_string).collect();
        parts.push(format!("invalid values: {}", listed.join(", ")));
    }
    parts.join("; ")
}

fn describe_reason(reason: Option<&String>) -> String {
    reason.map(|r| format!(": {r}")).unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Pre-flight failure listing every missing or malformed key.
    #[error("[{stage}] {}", describe_config_problems(.missing, .invalid))]
    Configuration { stage: Stage, missing: Vec<String>, invalid: Vec<InvalidKey> },

    /// A backend call failed and was not absorbed by an idempotency rule.
    #[error("[{stage}] remote call on {resource} failed: {source}")]
    Remote {
        stage: Stage,
        resource: String,
        #[source]
        source: PlatformError,
    },

    /// The training job reached a terminal status other than `Completed`.
    #[error("[train] training job {job_name} ended with status {status}{}", describe_reason(.reason.as_ref()))]
    TrainingFailed { job_name: String, status: TrainingJobStatus, reason: Option<String> },

    /// The quality metric did not meet the threshold.
    #[error("[evaluate] quality gate failed: {metric}={value} does not meet threshold {threshold} ({direction})")]
    QualityGateFailed { metric: String, value: f64, threshold: f64, direction: MetricDirection },

    /// A negative gate verdict reached the promotion stage.
    #[error("[promote] refusing to promote {package_arn}: quality gate verdict is negative")]
    GateNotPassed { package_arn: String },

    /// Endpoint resolution failed after the model and endpoint configuration were created.
    #[error(
        "[promote] endpoint {endpoint} was not resolved; model {model_name} and endpoint config \
         {endpoint_config_name} were left behind: {source}"
    )]
    EndpointResolution {
        endpoint: String,
        model_name: String,
        endpoint_config_name: String,
        #[source]
        source: PlatformError,
    },

    /// Creating the endpoint configuration failed after the model was created.
    #[error("[promote] endpoint config {endpoint_config_name} was not created; model {model_name} was left behind: {source}")]
    EndpointConfigCreation {
        endpoint_config_name: String,
        model_name: String,
        #[source]
        source: PlatformError,
    },

    /// The endpoint's error count exceeded the threshold.
    #[error("[health] endpoint {endpoint} unhealthy: {error_count} errors exceeds threshold {threshold}")]
    EndpointUnhealthy { endpoint: String, error_count: f64, threshold: f64 },

    /// Polling was aborted. The remote resource is left untouched.
    #[error("[{stage}] cancelled while waiting on {resource}")]
    Cancelled { stage: Stage, resource: String },

    #[error("handoff file {path}: {source}")]
    Handoff {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("metrics artifact {path}: {message}")]
    MetricsArtifact { path: PathBuf, message: String },

    #[error("config file {path}: {message}")]
    ConfigFile { path: PathBuf, message: String },
}

impl PipelineError {
    pub(crate) fn remote(stage: Stage, resource: impl Into<String>, source: PlatformError) -> Self {
        Self::Remote { stage, resource: resource.into(), source }
    }

    /// Process exit code for the CLI contract.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration { .. } | Self::ConfigFile { .. } => 2,
            Self::EndpointUnhealthy { .. } => 3,
            _ => 1,
        }
    }

    /// Backend error code, when the failure came from the platform.
    #[must_use]
    pub fn backend_code(&self) -> Option<&str> {
        match self {
            Self::Remote { source, .. }
            | Self::EndpointConfigCreation { source, .. }
            | Self::EndpointResolution { source, .. } => Some(source.code.as_str()),
            _ => None,
        }
    }
}
