//! Evaluation gate.
//!
//! Compares a single metric against a threshold and records the verdict in the
//! handoff store before reporting it, so a failed gate still leaves
//! `MODEL_OK=false` behind for the stages that follow.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::artifacts::MetricsArtifact;
use crate::config::EvaluationConfig;
use crate::error::{InvalidKey, PipelineError, PipelineResult, Stage};
use crate::handoff::{keys, HandoffStore};

/// Which side of the threshold counts as passing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricDirection {
    /// Pass iff `value >= threshold`.
    HigherIsBetter,
    /// Pass iff `value <= threshold`.
    LowerIsBetter,
}

impl MetricDirection {
    #[must_use]
    pub fn passes(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::HigherIsBetter => value >= threshold,
            Self::LowerIsBetter => value <= threshold,
        }
    }
}

impl fmt::Display for MetricDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HigherIsBetter => f.write_str("higher is better"),
            Self::LowerIsBetter => f.write_str("lower is better"),
        }
    }
}

impl FromStr for MetricDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "higher" | "higher_is_better" | "max" => Ok(Self::HigherIsBetter),
            "lower" | "lower_is_better" | "min" => Ok(Self::LowerIsBetter),
            other => Err(format!("unknown metric direction: {other}")),
        }
    }
}

/// A named metric value read from a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    pub name: String,
    pub value: f64,
}

/// Applies the gate and persists the verdict.
///
/// Returns `Ok(true)` on pass. On fail the verdict is persisted first and
/// then `QualityGateFailed` is returned. A NaN value never passes.
pub fn evaluate(
    metric: &MetricSnapshot,
    threshold: f64,
    direction: MetricDirection,
    store: &mut dyn HandoffStore,
) -> PipelineResult<bool> {
    let passed = !metric.value.is_nan() && direction.passes(metric.value, threshold);

    store.set(keys::MODEL_OK, if passed { "true" } else { "false" });
    store.set(keys::GATE_METRIC, &metric.name);
    store.set(keys::GATE_METRIC_VALUE, &metric.value.to_string());
    store.persist()?;

    if passed {
        info!(metric = %metric.name, value = metric.value, threshold, %direction, "Quality gate passed");
        Ok(true)
    } else {
        warn!(metric = %metric.name, value = metric.value, threshold, %direction, "Quality gate failed");
        Err(PipelineError::QualityGateFailed {
            metric: metric.name.clone(),
            value: metric.value,
            threshold,
            direction,
        })
    }
}

/// Reads the configured metric from the metrics artifact.
///
/// A metric the artifact does not contain is reported as a configuration
/// problem rather than defaulted.
pub fn load_metric(config: &EvaluationConfig) -> PipelineResult<MetricSnapshot> {
    let artifact = MetricsArtifact::load(&config.metrics_file)?;
    match artifact.get(&config.metric_name) {
        Some(value) => Ok(MetricSnapshot { name: config.metric_name.clone(), value }),
        None => {
            let available: Vec<&str> = artifact.metrics.keys().map(String::as_str).collect();
            Err(PipelineError::Configuration {
                stage: Stage::Evaluation,
                missing: Vec::new(),
                invalid: vec![InvalidKey {
                    key: "QUALITY_METRIC".to_string(),
                    value: config.metric_name.clone(),
                    reason: format!(
                        "not found in {} (available: {})",
                        config.metrics_file.display(),
                        if available.is_empty() { "none".to_string() } else { available.join(", ") }
                    ),
                }],
            })
        }
    }
}

/// Loads the metric and runs the gate.
pub fn run_evaluation(config: &EvaluationConfig, store: &mut dyn HandoffStore) -> PipelineResult<bool> {
    let metric = load_metric(config)?;
    evaluate(&metric, config.threshold, config.direction, store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::MemoryHandoffStore;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn snapshot(value: f64) -> MetricSnapshot {
        MetricSnapshot { name: "validation:auc".to_string(), value }
    }

    fn verdict(store: &MemoryHandoffStore) -> Option<&str> {
        store.persisted().get(keys::MODEL_OK).map(String::as_str)
    }

    #[test]
    fn test_gate_passes_above_threshold() {
        let mut store = MemoryHandoffStore::new();
        assert!(evaluate(&snapshot(0.82), 0.70, MetricDirection::HigherIsBetter, &mut store).unwrap());
        assert_eq!(verdict(&store), Some("true"));
    }

    #[test]
    fn test_gate_passes_at_threshold() {
        let mut store = MemoryHandoffStore::new();
        assert!(evaluate(&snapshot(0.85), 0.85, MetricDirection::HigherIsBetter, &mut store).unwrap());
    }

    #[test]
    fn test_gate_failure_persists_verdict_first() {
        let mut store = MemoryHandoffStore::new();
        let err = evaluate(&snapshot(0.60), 0.70, MetricDirection::HigherIsBetter, &mut store).unwrap_err();

        assert!(matches!(err, PipelineError::QualityGateFailed { .. }));
        assert_eq!(verdict(&store), Some("false"));
        assert_eq!(store.persisted().get(keys::GATE_METRIC_VALUE).map(String::as_str), Some("0.6"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_lower_is_better() {
        let mut store = MemoryHandoffStore::new();
        let loss = MetricSnapshot { name: "validation:logloss".to_string(), value: 0.31 };
        assert!(evaluate(&loss, 0.40, MetricDirection::LowerIsBetter, &mut store).unwrap());

        let loss = MetricSnapshot { name: "validation:logloss".to_string(), value: 0.52 };
        assert!(evaluate(&loss, 0.40, MetricDirection::LowerIsBetter, &mut store).is_err());
        assert_eq!(verdict(&store), Some("false"));
    }

    #[test]
    fn test_nan_never_passes() {
        let mut store = MemoryHandoffStore::new();
        assert!(evaluate(&snapshot(f64::NAN), 0.0, MetricDirection::HigherIsBetter, &mut store).is_err());
        assert!(evaluate(&snapshot(f64::NAN), 1.0, MetricDirection::LowerIsBetter, &mut store).is_err());
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("higher".parse::<MetricDirection>().unwrap(), MetricDirection::HigherIsBetter);
        assert_eq!("LOWER".parse::<MetricDirection>().unwrap(), MetricDirection::LowerIsBetter);
        assert_eq!("min".parse::<MetricDirection>().unwrap(), MetricDirection::LowerIsBetter);
        assert!("sideways".parse::<MetricDirection>().is_err());
    }

    fn config_for(path: PathBuf, metric: &str) -> EvaluationConfig {
        EvaluationConfig {
            metric_name: metric.to_string(),
            threshold: 0.70,
            direction: MetricDirection::HigherIsBetter,
            metrics_file: path,
        }
    }

    #[test]
    fn test_run_evaluation_reads_artifact() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("metrics.json");
        std::fs::write(&path, r#"{"validation:auc": 0.82}"#).unwrap();

        let mut store = MemoryHandoffStore::new();
        assert!(run_evaluation(&config_for(path, "validation:auc"), &mut store).unwrap());
        assert_eq!(verdict(&store), Some("true"));
    }

    #[test]
    fn test_missing_metric_is_configuration_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("metrics.json");
        std::fs::write(&path, r#"{"train:auc": 0.91}"#).unwrap();

        let mut store = MemoryHandoffStore::new();
        let err = run_evaluation(&config_for(path, "validation:auc"), &mut store).unwrap_err();

        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("train:auc"));
        assert_eq!(store.persist_count(), 0);
    }

    #[test]
    fn test_missing_artifact_is_fatal() {
        let temp = TempDir::new().unwrap();
        let mut store = MemoryHandoffStore::new();
        let err = run_evaluation(&config_for(temp.path().join("absent.json"), "validation:auc"), &mut store)
            .unwrap_err();
        assert!(matches!(err, PipelineError::MetricsArtifact { .. }));
    }
}
