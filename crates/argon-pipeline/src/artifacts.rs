use argon_platform::MetricData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};

/// Final metrics produced by a training job.
///
/// Written by the training stage on completion, read by the evaluation gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsArtifact {
    pub job_name: String,
    pub created_at: DateTime<Utc>,
    pub metrics: BTreeMap<String, f64>,
}

impl MetricsArtifact {
    #[must_use]
    pub fn from_job(job_name: &str, metrics: &[MetricData]) -> Self {
        Self {
            job_name: job_name.to_string(),
            created_at: Utc::now(),
            metrics: metrics.iter().map(|m| (m.metric_name.clone(), m.value)).collect(),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn write(&self, path: &Path) -> PipelineResult<()> {
        let err = |message: String| PipelineError::MetricsArtifact { path: path.to_path_buf(), message };
        let body = serde_json::to_string_pretty(self).map_err(|e| err(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| err(e.to_string()))?;
        }
        std::fs::write(path, body).map_err(|e| err(e.to_string()))
    }

    /// Loads an artifact.
    ///
    /// Besides the format written by [`MetricsArtifact::write`], a flat JSON
    /// object of metric name to number is accepted, so training containers can
    /// emit their own `metrics.json`.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let err = |message: String| PipelineError::MetricsArtifact { path: path.to_path_buf(), message };
        let bytes = std::fs::read(path).map_err(|e| err(e.to_string()))?;

        if let Ok(artifact) = serde_json::from_slice::<Self>(&bytes) {
            return Ok(artifact);
        }
        let metrics: BTreeMap<String, f64> = serde_json::from_slice(&bytes)
            .map_err(|e| err(format!("expected a metrics artifact or a flat object of numbers: {e}")))?;
        Ok(Self { job_name: String::new(), created_at: Utc::now(), metrics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("metrics.json");
        let artifact = MetricsArtifact::from_job(
            "credit-mlops-train-1",
            &[MetricData { metric_name: "validation:auc".to_string(), value: 0.82 }],
        );
        artifact.write(&path).unwrap();

        let loaded = MetricsArtifact::load(&path).unwrap();
        assert_eq!(loaded.job_name, "credit-mlops-train-1");
        assert_eq!(loaded.get("validation:auc"), Some(0.82));
    }

    #[test]
    fn test_load_flat_object() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("metrics.json");
        std::fs::write(&path, r#"{"accuracy": 0.88, "validation:auc": 0.79}"#).unwrap();

        let loaded = MetricsArtifact::load(&path).unwrap();
        assert_eq!(loaded.get("accuracy"), Some(0.88));
        assert_eq!(loaded.get("missing"), None);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("metrics.json");
        std::fs::write(&path, r#"{"accuracy": "high"}"#).unwrap();
        assert!(matches!(MetricsArtifact::load(&path), Err(PipelineError::MetricsArtifact { .. })));
    }
}
