//! Configuration resolution.
//!
//! Every stage reads its parameters once, at start, from an [`EnvSnapshot`]
//! and resolves them into an explicit config struct. Resolution is batched:
//! all missing and malformed keys are collected and reported together.
//!
//! Snapshot precedence:
//! 1. Process environment
//! 2. Stage handoff files (`.env_*`) from the handoff directory
//! 3. Local config file (`./.argonrc`)
//! 4. Global config file (`~/.argon/config.toml`)
//! 5. Documented defaults

use argon_platform::VpcConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{InvalidKey, PipelineError, PipelineResult, Stage};
use crate::evaluation::MetricDirection;
use crate::naming::is_usable_prefix;
use crate::poll::{PollSchedule, MAX_BACKOFF_MULTIPLIER};

/// Values treated as absent even when the variable is set.
const NULL_SENTINELS: &[&str] = &["null", "none", "undefined", "nil"];

pub const DEFAULT_REGION: &str = "ap-south-1";
pub const DEFAULT_PROJECT: &str = "credit-mlops";
pub const DEFAULT_INSTANCE_TYPE: &str = "ml.m5.large";
pub const DEFAULT_METRICS_FILE: &str = "metrics.json";
/// The metrics backend keeps datapoints for 15 months.
pub const MAX_HEALTH_WINDOW_MINUTES: u64 = 455 * 24 * 60;

/// An immutable snapshot of configuration variables.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Captures the current process environment.
    #[must_use]
    pub fn from_process() -> Self {
        Self { vars: std::env::vars().collect() }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self { vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }

    /// Returns the value of `key` unless it is absent, blank or a null sentinel.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        let value = self.vars.get(key)?.trim();
        if value.is_empty() || NULL_SENTINELS.iter().any(|s| value.eq_ignore_ascii_case(s)) {
            return None;
        }
        Some(value)
    }

    /// Adds `pairs` for keys that have no usable value yet.
    pub fn layer_defaults<K, V>(&mut self, pairs: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in pairs {
            let key = key.into();
            if self.get(&key).is_none() {
                self.vars.insert(key, value.into());
            }
        }
    }
}

/// Collects missing and invalid keys while a stage config is being built.
#[derive(Debug)]
pub struct ConfigResolver<'a> {
    stage: Stage,
    env: &'a EnvSnapshot,
    missing: Vec<String>,
    invalid: Vec<InvalidKey>,
}

impl<'a> ConfigResolver<'a> {
    #[must_use]
    pub fn new(stage: Stage, env: &'a EnvSnapshot) -> Self {
        Self { stage, env, missing: Vec::new(), invalid: Vec::new() }
    }

    /// Reads a required key. Absent keys are recorded and resolve to "".
    pub fn require(&mut self, key: &str) -> String {
        let env = self.env;
        if let Some(value) = env.get(key) {
            value.to_string()
        } else {
            self.missing.push(key.to_string());
            String::new()
        }
    }

    #[must_use]
    pub fn optional(&self, key: &str) -> Option<String> {
        self.env.get(key).map(str::to_string)
    }

    #[must_use]
    pub fn or_default(&self, key: &str, default: &str) -> String {
        self.env.get(key).unwrap_or(default).to_string()
    }

    /// Parses an optional key, falling back to `default` when absent.
    pub fn parse_or<T>(&mut self, key: &str, default: T, expected: &str) -> T
    where
        T: FromStr,
    {
        let env = self.env;
        match env.get(key) {
            None => default,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                self.invalid(key, raw, format!("expected {expected}"));
                default
            }),
        }
    }

    pub fn flag(&mut self, key: &str, default: bool) -> bool {
        let env = self.env;
        match env.get(key) {
            None => default,
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                _ => {
                    self.invalid(key, raw, "expected a boolean".to_string());
                    default
                }
            },
        }
    }

    /// Reads a comma-separated list; blank entries are dropped.
    #[must_use]
    pub fn list(&self, key: &str) -> Vec<String> {
        self.env
            .get(key)
            .map(|raw| {
                raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
            })
            .unwrap_or_default()
    }

    /// Records a value that parsed but violates a constraint.
    pub fn invalid(&mut self, key: &str, value: &str, reason: String) {
        self.invalid.push(InvalidKey { key: key.to_string(), value: value.to_string(), reason });
    }

    /// Fails with every recorded problem, or succeeds if there were none.
    pub fn finish(self) -> PipelineResult<()> {
        if self.missing.is_empty() && self.invalid.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Configuration {
                stage: self.stage,
                missing: self.missing,
                invalid: self.invalid,
            })
        }
    }
}

/// Joins a bucket name (with or without `s3://`) and a key prefix.
#[must_use]
pub fn s3_uri(bucket: &str, path: &str) -> String {
    let bucket = bucket.trim_start_matches("s3://").trim_end_matches('/');
    format!("s3://{bucket}/{}", path.trim_start_matches('/'))
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// Where the platform lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    pub region: String,
    pub execution_url: String,
    pub metrics_url: String,
    pub token: Option<String>,
}

impl PlatformConfig {
    pub fn resolve(stage: Stage, env: &EnvSnapshot) -> PipelineResult<Self> {
        let resolver = ConfigResolver::new(stage, env);
        let region = resolver.or_default("AWS_REGION", DEFAULT_REGION);
        let execution_url = resolver
            .optional("PLATFORM_URL")
            .unwrap_or_else(|| format!("https://api.sagemaker.{region}.amazonaws.com"));
        let metrics_url = resolver
            .optional("METRICS_URL")
            .unwrap_or_else(|| format!("https://monitoring.{region}.amazonaws.com"));
        let token = resolver.optional("PLATFORM_TOKEN");
        resolver.finish()?;
        Ok(Self { region, execution_url, metrics_url, token })
    }
}

// ---------------------------------------------------------------------------
// Training
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub project: String,
    pub role_arn: String,
    pub train_image: String,
    pub raw_bucket: String,
    pub model_bucket: String,
    pub instance_type: String,
    pub instance_count: u32,
    pub volume_size_gb: u32,
    pub max_runtime_seconds: u64,
    pub vpc: Option<VpcConfig>,
    pub poll: PollSchedule,
    /// Where the job's final metrics are written on completion.
    pub metrics_file: PathBuf,
}

impl TrainingConfig {
    pub const REQUIRED: &'static [&'static str] =
        &["SAGEMAKER_ROLE_ARN", "TRAIN_IMAGE", "RAW_BUCKET", "MODEL_BUCKET"];

    pub fn resolve(env: &EnvSnapshot) -> PipelineResult<Self> {
        let mut r = ConfigResolver::new(Stage::Training, env);

        let role_arn = r.require("SAGEMAKER_ROLE_ARN");
        let train_image = r.require("TRAIN_IMAGE");
        let raw_bucket = r.require("RAW_BUCKET");
        let model_bucket = r.require("MODEL_BUCKET");

        let project = r.or_default("PROJECT_NAME", DEFAULT_PROJECT);
        if !is_usable_prefix(&project) {
            r.invalid("PROJECT_NAME", &project, "must contain a letter or digit".to_string());
        }
        let instance_type = r.or_default("TRAIN_INSTANCE_TYPE", DEFAULT_INSTANCE_TYPE);
        let instance_count = r.parse_or("TRAIN_INSTANCE_COUNT", 1_u32, "a positive integer");
        let volume_size_gb = r.parse_or("TRAIN_VOLUME_GB", 10_u32, "a positive integer");
        let max_runtime_seconds =
            r.parse_or("TRAIN_MAX_RUNTIME_SECONDS", 3600_u64, "a positive integer");
        if instance_count == 0 {
            r.invalid("TRAIN_INSTANCE_COUNT", "0", "must be at least 1".to_string());
        }

        let subnets = r.list("VPC_SUBNETS");
        let security_groups = r.list("VPC_SECURITY_GROUP");
        let vpc = match (subnets.is_empty(), security_groups.is_empty()) {
            (true, true) => None,
            (false, false) => Some(VpcConfig { security_group_ids: security_groups, subnets }),
            (true, false) => {
                r.invalid("VPC_SUBNETS", "", "required when VPC_SECURITY_GROUP is set".to_string());
                None
            }
            (false, true) => {
                r.invalid("VPC_SECURITY_GROUP", "", "required when VPC_SUBNETS is set".to_string());
                None
            }
        };

        let poll = resolve_poll_schedule(&mut r);
        let metrics_file = PathBuf::from(r.or_default("METRICS_FILE", DEFAULT_METRICS_FILE));

        r.finish()?;
        Ok(Self {
            project,
            role_arn,
            train_image,
            raw_bucket,
            model_bucket,
            instance_type,
            instance_count,
            volume_size_gb,
            max_runtime_seconds,
            vpc,
            poll,
            metrics_file,
        })
    }

    #[must_use]
    pub fn train_channel_uri(&self) -> String {
        s3_uri(&self.raw_bucket, "train/")
    }

    #[must_use]
    pub fn output_path(&self) -> String {
        s3_uri(&self.model_bucket, "artifacts/")
    }
}

fn resolve_poll_schedule(r: &mut ConfigResolver<'_>) -> PollSchedule {
    let interval = r.parse_or("POLL_INTERVAL_SECONDS", 60_u64, "a positive integer");
    let multiplier = r.parse_or("POLL_BACKOFF_MULTIPLIER", 1.0_f64, "a number");
    let max = r.parse_or("POLL_MAX_INTERVAL_SECONDS", 300_u64, "a positive integer");

    if interval == 0 {
        r.invalid("POLL_INTERVAL_SECONDS", "0", "must be at least 1".to_string());
    }
    if !multiplier.is_finite() || !(1.0..=MAX_BACKOFF_MULTIPLIER).contains(&multiplier) {
        r.invalid(
            "POLL_BACKOFF_MULTIPLIER",
            &multiplier.to_string(),
            format!("must be between 1.0 and {MAX_BACKOFF_MULTIPLIER}"),
        );
    }
    PollSchedule::new(Duration::from_secs(interval), multiplier, Duration::from_secs(max.max(interval)))
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationConfig {
    pub metric_name: String,
    pub threshold: f64,
    pub direction: MetricDirection,
    pub metrics_file: PathBuf,
}

impl EvaluationConfig {
    pub const REQUIRED: &'static [&'static str] = &[];

    pub fn resolve(env: &EnvSnapshot) -> PipelineResult<Self> {
        let mut r = ConfigResolver::new(Stage::Evaluation, env);
        let metric_name = r.or_default("QUALITY_METRIC", "validation:auc");
        let threshold = r.parse_or("QUALITY_THRESHOLD", 0.85_f64, "a number");
        if !threshold.is_finite() {
            r.invalid("QUALITY_THRESHOLD", &threshold.to_string(), "must be finite".to_string());
        }
        let direction = r.parse_or("QUALITY_DIRECTION", MetricDirection::HigherIsBetter, "`higher` or `lower`");
        let metrics_file = PathBuf::from(r.or_default("METRICS_FILE", DEFAULT_METRICS_FILE));
        r.finish()?;
        Ok(Self { metric_name, threshold, direction, metrics_file })
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationConfig {
    pub group_name: String,
    pub group_description: Option<String>,
    pub inference_image: String,
    pub model_artifacts: String,
    pub package_description: String,
    pub content_types: Vec<String>,
    pub response_types: Vec<String>,
}

impl RegistrationConfig {
    pub const REQUIRED: &'static [&'static str] = &["MODEL_GROUP", "INFER_IMAGE", "MODEL_ARTIFACTS"];

    pub fn resolve(env: &EnvSnapshot) -> PipelineResult<Self> {
        let mut r = ConfigResolver::new(Stage::Registration, env);
        let group_name = r.require("MODEL_GROUP");
        let inference_image = r.require("INFER_IMAGE");
        let model_artifacts = r.require("MODEL_ARTIFACTS");
        let group_description = r.optional("MODEL_GROUP_DESCRIPTION");
        let package_description = r.or_default("MODEL_PACKAGE_DESCRIPTION", "Credit Risk Model");

        let mut content_types = r.list("CONTENT_TYPES");
        if content_types.is_empty() {
            content_types.push("application/json".to_string());
        }
        let mut response_types = r.list("RESPONSE_TYPES");
        if response_types.is_empty() {
            response_types.push("application/json".to_string());
        }

        r.finish()?;
        Ok(Self {
            group_name,
            group_description,
            inference_image,
            model_artifacts,
            package_description,
            content_types,
            response_types,
        })
    }
}

// ---------------------------------------------------------------------------
// Promotion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionConfig {
    pub endpoint_name: String,
    pub package_arn: String,
    pub role_arn: String,
    pub model_bucket: String,
    pub auto_approve: bool,
    pub resource_prefix: String,
    pub instance_type: String,
    pub instance_count: u32,
    pub data_capture: bool,
    pub capture_sampling_percentage: u8,
    /// Verdict written by the evaluation gate, if it reached this stage.
    pub gate_verdict: Option<bool>,
}

impl PromotionConfig {
    pub const REQUIRED: &'static [&'static str] =
        &["ENDPOINT_NAME", "MODEL_PACKAGE_ARN", "SAGEMAKER_ROLE_ARN", "MODEL_BUCKET"];

    pub fn resolve(env: &EnvSnapshot) -> PipelineResult<Self> {
        let mut r = ConfigResolver::new(Stage::Promotion, env);
        let endpoint_name = r.require("ENDPOINT_NAME");
        let package_arn = r.require("MODEL_PACKAGE_ARN");
        let role_arn = r.require("SAGEMAKER_ROLE_ARN");
        let model_bucket = r.require("MODEL_BUCKET");

        let auto_approve = r.flag("AUTO_APPROVE", true);
        let resource_prefix = r.or_default("RESOURCE_PREFIX", "prod");
        if !is_usable_prefix(&resource_prefix) {
            r.invalid("RESOURCE_PREFIX", &resource_prefix, "must contain a letter or digit".to_string());
        }
        let instance_type = r.or_default("SERVE_INSTANCE_TYPE", DEFAULT_INSTANCE_TYPE);
        let instance_count = r.parse_or("SERVE_INSTANCE_COUNT", 1_u32, "a positive integer");
        if instance_count == 0 {
            r.invalid("SERVE_INSTANCE_COUNT", "0", "must be at least 1".to_string());
        }
        let data_capture = r.flag("DATA_CAPTURE", true);
        let capture_sampling_percentage =
            r.parse_or("DATA_CAPTURE_SAMPLING", 100_u8, "an integer between 0 and 100");
        if capture_sampling_percentage > 100 {
            r.invalid(
                "DATA_CAPTURE_SAMPLING",
                &capture_sampling_percentage.to_string(),
                "must be between 0 and 100".to_string(),
            );
        }
        let gate_verdict = if r.optional("MODEL_OK").is_some() { Some(r.flag("MODEL_OK", false)) } else { None };

        r.finish()?;
        Ok(Self {
            endpoint_name,
            package_arn,
            role_arn,
            model_bucket,
            auto_approve,
            resource_prefix,
            instance_type,
            instance_count,
            data_capture,
            capture_sampling_percentage,
            gate_verdict,
        })
    }

    #[must_use]
    pub fn capture_destination(&self) -> String {
        s3_uri(&self.model_bucket, "monitoring")
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct HealthConfig {
    pub endpoint_name: String,
    pub threshold: f64,
    pub window: Duration,
    pub period_seconds: u32,
    pub metric_name: String,
    pub namespace: String,
}

impl HealthConfig {
    pub const REQUIRED: &'static [&'static str] = &["ENDPOINT_NAME"];

    pub fn resolve(env: &EnvSnapshot) -> PipelineResult<Self> {
        let mut r = ConfigResolver::new(Stage::Health, env);
        let endpoint_name = r.require("ENDPOINT_NAME");
        let threshold = r.parse_or("ERROR_THRESHOLD", 5.0_f64, "a number");
        if !threshold.is_finite() || threshold < 0.0 {
            r.invalid("ERROR_THRESHOLD", &threshold.to_string(), "must be a non-negative number".to_string());
        }
        let window_minutes = r.parse_or("HEALTH_WINDOW_MINUTES", 10_u64, "a positive integer");
        let period_seconds = r.parse_or("HEALTH_PERIOD_SECONDS", 300_u32, "a positive integer");
        if window_minutes == 0 || window_minutes > MAX_HEALTH_WINDOW_MINUTES {
            r.invalid(
                "HEALTH_WINDOW_MINUTES",
                &window_minutes.to_string(),
                format!("must be between 1 and {MAX_HEALTH_WINDOW_MINUTES}"),
            );
        }
        if period_seconds == 0 || period_seconds % 60 != 0 {
            r.invalid(
                "HEALTH_PERIOD_SECONDS",
                &period_seconds.to_string(),
                "must be a positive multiple of 60".to_string(),
            );
        }
        let metric_name = r.or_default("HEALTH_METRIC", "Invocation4XXErrors");
        let namespace = r.or_default("HEALTH_NAMESPACE", "AWS/SageMaker");

        r.finish()?;
        Ok(Self {
            endpoint_name,
            threshold,
            window: Duration::from_secs(window_minutes.saturating_mul(60)),
            period_seconds,
            metric_name,
            namespace,
        })
    }
}

/// Required keys declared by `stage`.
#[must_use]
pub const fn required_keys(stage: Stage) -> &'static [&'static str] {
    match stage {
        Stage::Training => TrainingConfig::REQUIRED,
        Stage::Evaluation => EvaluationConfig::REQUIRED,
        Stage::Registration => RegistrationConfig::REQUIRED,
        Stage::Promotion => PromotionConfig::REQUIRED,
        Stage::Health => HealthConfig::REQUIRED,
    }
}

// ---------------------------------------------------------------------------
// Config file
// ---------------------------------------------------------------------------

/// Optional TOML file supplying defaults for keys absent from the environment.
///
/// ```toml
/// log_level = "debug"
///
/// [env]
/// AWS_REGION = "eu-west-1"
/// MODEL_GROUP = "credit-risk"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArgonConfig {
    #[serde(default)]
    pub log_level: Option<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl ArgonConfig {
    pub fn load_from_file(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::ConfigFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&content)
            .map_err(|e| PipelineError::ConfigFile { path: path.to_path_buf(), message: e.to_string() })
    }

    #[must_use]
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".argon")
            .join("config.toml")
    }

    #[must_use]
    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".argonrc")
    }

    /// Loads the global then the local file; local values win.
    ///
    /// Missing files are skipped. A file that exists but does not parse is an error.
    pub fn discover_and_load() -> PipelineResult<Self> {
        let mut config = Self::default();
        for path in [Self::default_global_path(), Self::default_local_path()] {
            if path.exists() {
                config.merge(Self::load_from_file(&path)?);
            }
        }
        Ok(config)
    }

    pub fn merge(&mut self, other: Self) {
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
        self.env.extend(other.env);
    }
}
