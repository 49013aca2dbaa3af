//! Endpoint health check.
//!
//! Sums an error metric over a trailing window and compares it to a
//! threshold. Read-only.

use argon_platform::{Datapoint, Dimension, MetricStatisticsRequest, PlatformClient};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{info, warn};

use crate::config::HealthConfig;
use crate::error::{InvalidKey, PipelineError, PipelineResult, Stage};

/// Outcome of a health check that completed its query.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub endpoint: String,
    pub error_count: f64,
    pub threshold: f64,
    pub datapoints: usize,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

impl HealthReport {
    /// Healthy iff the error count does not exceed the threshold.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.error_count <= self.threshold
    }
}

/// Sums the `Sum` statistic of every datapoint. A missing sum counts as zero.
#[must_use]
pub fn sum_datapoints(datapoints: &[Datapoint]) -> f64 {
    datapoints.iter().map(|d| d.sum.unwrap_or(0.0)).sum()
}

/// Builds the query for the window ending at `now`.
///
/// A window that cannot be subtracted from `now` is a configuration error.
pub fn build_metric_request(config: &HealthConfig, now: DateTime<Utc>) -> PipelineResult<MetricStatisticsRequest> {
    let start_time = ChronoDuration::from_std(config.window)
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| PipelineError::Configuration {
            stage: Stage::Health,
            missing: Vec::new(),
            invalid: vec![InvalidKey {
                key: "HEALTH_WINDOW_MINUTES".to_string(),
                value: (config.window.as_secs() / 60).to_string(),
                reason: "window reaches past the earliest representable time".to_string(),
            }],
        })?;

    Ok(MetricStatisticsRequest {
        namespace: config.namespace.clone(),
        metric_name: config.metric_name.clone(),
        dimensions: vec![Dimension { name: "EndpointName".to_string(), value: config.endpoint_name.clone() }],
        start_time,
        end_time: now,
        period: config.period_seconds,
        statistics: vec!["Sum".to_string()],
    })
}

/// Checks the endpoint's error count over the window ending at `now`.
///
/// Returns the report when healthy and `EndpointUnhealthy` when the count
/// exceeds the threshold. An empty window is healthy.
pub async fn check_health(
    config: &HealthConfig,
    client: &dyn PlatformClient,
    now: DateTime<Utc>,
) -> PipelineResult<HealthReport> {
    let request = build_metric_request(config, now)?;
    let response = client
        .get_metric_statistics(&request)
        .await
        .map_err(|e| PipelineError::remote(Stage::Health, &config.endpoint_name, e))?;

    let report = HealthReport {
        endpoint: config.endpoint_name.clone(),
        error_count: sum_datapoints(&response.datapoints),
        threshold: config.threshold,
        datapoints: response.datapoints.len(),
        window_start: request.start_time,
        window_end: request.end_time,
    };

    if report.is_healthy() {
        info!(
            endpoint = %report.endpoint,
            metric = %config.metric_name,
            error_count = report.error_count,
            threshold = report.threshold,
            "Endpoint healthy"
        );
        Ok(report)
    } else {
        warn!(
            endpoint = %report.endpoint,
            metric = %config.metric_name,
            error_count = report.error_count,
            threshold = report.threshold,
            "Endpoint unhealthy"
        );
        Err(PipelineError::EndpointUnhealthy {
            endpoint: report.endpoint,
            error_count: report.error_count,
            threshold: report.threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon_clients::MockPlatform;
    use argon_platform::{Operation, PlatformError};
    use chrono::TimeZone;
    use std::time::Duration;

    fn config(threshold: f64) -> HealthConfig {
        HealthConfig {
            endpoint_name: "credit-risk-endpoint".to_string(),
            threshold,
            window: Duration::from_secs(600),
            period_seconds: 300,
            metric_name: "Invocation4XXErrors".to_string(),
            namespace: "AWS/SageMaker".to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_sum_above_threshold_is_unhealthy() {
        let platform = MockPlatform::new().with_datapoints([Some(2.0), Some(4.0)]);

        let err = check_health(&config(5.0), &platform, now()).await.unwrap_err();

        match err {
            PipelineError::EndpointUnhealthy { error_count, .. } => assert!((error_count - 6.0).abs() < f64::EPSILON),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_sum_below_threshold_is_healthy() {
        let platform = MockPlatform::new().with_datapoints([Some(2.0), Some(4.0)]);

        let report = check_health(&config(10.0), &platform, now()).await.unwrap();
        assert!((report.error_count - 6.0).abs() < f64::EPSILON);
        assert_eq!(report.datapoints, 2);
    }

    #[tokio::test]
    async fn test_sum_equal_to_threshold_is_healthy() {
        let platform = MockPlatform::new().with_datapoints([Some(5.0)]);
        assert!(check_health(&config(5.0), &platform, now()).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_window_is_healthy() {
        let platform = MockPlatform::new();
        let report = check_health(&config(5.0), &platform, now()).await.unwrap();
        assert!(report.error_count.abs() < f64::EPSILON);
        assert_eq!(report.datapoints, 0);
    }

    #[tokio::test]
    async fn test_missing_sum_counts_as_zero() {
        let platform = MockPlatform::new().with_datapoints([None, Some(3.0)]);
        let report = check_health(&config(5.0), &platform, now()).await.unwrap();
        assert!((report.error_count - 3.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_query_shape() {
        let platform = MockPlatform::new();
        check_health(&config(5.0), &platform, now()).await.unwrap();

        let request = platform.last_metric_request().unwrap();
        assert_eq!(request.namespace, "AWS/SageMaker");
        assert_eq!(request.metric_name, "Invocation4XXErrors");
        assert_eq!(request.dimensions[0].name, "EndpointName");
        assert_eq!(request.dimensions[0].value, "credit-risk-endpoint");
        assert_eq!(request.statistics, vec!["Sum"]);
        assert_eq!(request.period, 300);
        assert_eq!(request.end_time, now());
        assert_eq!(request.start_time, Utc.with_ymd_and_hms(2024, 5, 1, 11, 50, 0).unwrap());
    }

    #[tokio::test]
    async fn test_unrepresentable_window_is_configuration_error() {
        let platform = MockPlatform::new();
        let mut cfg = config(5.0);
        cfg.window = Duration::from_secs(60_000_000_000_000);

        let err = check_health(&cfg, &platform, now()).await.unwrap_err();

        assert!(matches!(err, PipelineError::Configuration { stage: Stage::Health, .. }));
        assert_eq!(err.exit_code(), 2);
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_query_failure_is_remote_error() {
        let platform = MockPlatform::new();
        platform.fail_next(
            Operation::GetMetricStatistics,
            PlatformError::from_backend(Operation::GetMetricStatistics, "InternalFailure", "boom", Some(500)),
        );

        let err = check_health(&config(5.0), &platform, now()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Remote { stage: Stage::Health, .. }));
        assert_eq!(err.exit_code(), 1);
    }
}
