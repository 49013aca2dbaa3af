//! HTTP implementation of the `PlatformClient` trait.
//!
//! Speaks the JSON target protocol: every call is a `POST` to the service base
//! URL with the operation named in the `X-Amz-Target` header and the request
//! serialized as the body. Requests are expected to pass through a signing
//! gateway (or a compatible emulator); an optional bearer token is forwarded.

use argon_platform::{
    CreateEndpointConfigResponse, CreateModelPackageGroupResponse, CreateModelResponse,
    CreateTrainingJobResponse, EndpointConfigRequest, EndpointRequest, EndpointResponse,
    MetricStatisticsRequest, MetricStatisticsResponse, ModelPackageApprovalRequest,
    ModelPackageGroupDescription, ModelPackageGroupRequest, ModelPackageRequest,
    ModelPackageResponse, ModelRequest, Operation, PlatformClient, PlatformError,
    PlatformErrorKind, PlatformResult, Service, TrainingJobDescription, TrainingJobRequest,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};

const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Platform client backed by HTTP.
#[derive(Debug, Clone)]
pub struct HttpPlatformClient {
    /// Base URL of the execution service (jobs, models, endpoints, registry).
    execution_url: String,
    /// Base URL of the metrics service.
    metrics_url: String,
    /// Optional bearer token forwarded to the gateway.
    token: Option<String>,
    client: Client,
}

/// Error body returned by the backend.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type", default)]
    error_type: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

impl HttpPlatformClient {
    /// Creates a client with explicit service URLs.
    #[must_use]
    pub fn new(execution_url: impl Into<String>, metrics_url: impl Into<String>) -> Self {
        Self {
            execution_url: trim_base(execution_url.into()),
            metrics_url: trim_base(metrics_url.into()),
            token: None,
            client: Client::new(),
        }
    }

    /// Creates a client pointed at the public regional service URLs.
    #[must_use]
    pub fn for_region(region: &str) -> Self {
        Self::new(
            format!("https://api.sagemaker.{region}.amazonaws.com"),
            format!("https://monitoring.{region}.amazonaws.com"),
        )
    }

    /// Forwards `token` as a bearer credential on every request.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn base_url(&self, operation: Operation) -> &str {
        match operation.service() {
            Service::Execution => &self.execution_url,
            Service::Metrics => &self.metrics_url,
        }
    }

    async fn call<Req, Resp>(&self, operation: Operation, body: &Req) -> PlatformResult<Resp>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/", self.base_url(operation));
        debug!(operation = %operation, url = %url, "Sending platform request");

        let mut request = self
            .client
            .post(&url)
            .header("X-Amz-Target", operation.target())
            .header("Content-Type", CONTENT_TYPE)
            .json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            error!(operation = %operation, error = %e, "Failed to reach platform");
            PlatformError::new(PlatformErrorKind::Transient, operation, "NetworkError", e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let header_code = response
                .headers()
                .get("x-amzn-ErrorType")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.split(':').next().unwrap_or(v).to_string());
            let text = response.text().await.unwrap_or_default();
            let parsed: Option<ErrorBody> = serde_json::from_str(&text).ok();

            let code = parsed
                .as_ref()
                .and_then(|b| b.error_type.as_deref())
                .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
                .or(header_code)
                .unwrap_or_else(|| format!("Http{}", status.as_u16()));
            let message = parsed.and_then(|b| b.message).unwrap_or(text);

            let err = PlatformError::from_backend(operation, code, message, Some(status.as_u16()));
            error!(
                operation = %operation,
                status = %status,
                code = %err.code,
                kind = %err.kind,
                "Platform returned error status"
            );
            return Err(err);
        }

        response.json::<Resp>().await.map_err(|e| {
            error!(operation = %operation, error = %e, "Failed to parse platform response");
            PlatformError::new(PlatformErrorKind::Other, operation, "SerializationError", e.to_string())
        })
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    async fn create_training_job(
        &self,
        request: &TrainingJobRequest,
    ) -> PlatformResult<CreateTrainingJobResponse> {
        self.call(Operation::CreateTrainingJob, request).await
    }

    async fn describe_training_job(&self, job_name: &str) -> PlatformResult<TrainingJobDescription> {
        self.call(Operation::DescribeTrainingJob, &json!({ "TrainingJobName": job_name })).await
    }

    async fn create_model(&self, request: &ModelRequest) -> PlatformResult<CreateModelResponse> {
        self.call(Operation::CreateModel, request).await
    }

    async fn create_endpoint_config(
        &self,
        request: &EndpointConfigRequest,
    ) -> PlatformResult<CreateEndpointConfigResponse> {
        self.call(Operation::CreateEndpointConfig, request).await
    }

    async fn create_endpoint(&self, request: &EndpointRequest) -> PlatformResult<EndpointResponse> {
        self.call(Operation::CreateEndpoint, request).await
    }

    async fn update_endpoint(&self, request: &EndpointRequest) -> PlatformResult<EndpointResponse> {
        self.call(Operation::UpdateEndpoint, request).await
    }

    async fn describe_model_package_group(
        &self,
        group_name: &str,
    ) -> PlatformResult<ModelPackageGroupDescription> {
        self.call(
            Operation::DescribeModelPackageGroup,
            &json!({ "ModelPackageGroupName": group_name }),
        )
        .await
    }

    async fn create_model_package_group(
        &self,
        request: &ModelPackageGroupRequest,
    ) -> PlatformResult<CreateModelPackageGroupResponse> {
        self.call(Operation::CreateModelPackageGroup, request).await
    }

    async fn create_model_package(
        &self,
        request: &ModelPackageRequest,
    ) -> PlatformResult<ModelPackageResponse> {
        self.call(Operation::CreateModelPackage, request).await
    }

    async fn update_model_package_approval(
        &self,
        request: &ModelPackageApprovalRequest,
    ) -> PlatformResult<ModelPackageResponse> {
        self.call(Operation::UpdateModelPackage, request).await
    }

    async fn get_metric_statistics(
        &self,
        request: &MetricStatisticsRequest,
    ) -> PlatformResult<MetricStatisticsResponse> {
        self.call(Operation::GetMetricStatistics, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon_platform::{Dimension, TrainingJobStatus};
    use chrono::{TimeZone, Utc};

    fn client_for(server: &mockito::Server) -> HttpPlatformClient {
        HttpPlatformClient::new(server.url(), format!("{}/metrics", server.url()))
    }

    #[tokio::test]
    async fn test_describe_training_job_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("x-amz-target", "SageMaker.DescribeTrainingJob")
            .match_body(mockito::Matcher::Json(json!({"TrainingJobName": "credit-mlops-train-1"})))
            .with_status(200)
            .with_header("content-type", CONTENT_TYPE)
            .with_body(
                r#"{
                    "TrainingJobName": "credit-mlops-train-1",
                    "TrainingJobStatus": "InProgress",
                    "SecondaryStatus": "Training"
                }"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let description = client.describe_training_job("credit-mlops-train-1").await.unwrap();

        assert_eq!(description.training_job_status, TrainingJobStatus::InProgress);
        assert_eq!(description.secondary_status.as_deref(), Some("Training"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_bearer_token_forwarded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("authorization", "Bearer gateway-token")
            .with_status(200)
            .with_body(r#"{"EndpointArn": "arn:endpoint/credit"}"#)
            .create_async()
            .await;

        let client = client_for(&server).with_token("gateway-token");
        let request = EndpointRequest {
            endpoint_name: "credit".to_string(),
            endpoint_config_name: "prod-config-1".to_string(),
        };
        let response = client.update_endpoint(&request).await.unwrap();

        assert_eq!(response.endpoint_arn, "arn:endpoint/credit");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_endpoint_classified_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .match_header("x-amz-target", "SageMaker.UpdateEndpoint")
            .with_status(400)
            .with_body(
                r#"{"__type": "com.amazon.coral.validate#ValidationException",
                    "message": "Could not find endpoint \"credit\"."}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let request = EndpointRequest {
            endpoint_name: "credit".to_string(),
            endpoint_config_name: "prod-config-1".to_string(),
        };
        let err = client.update_endpoint(&request).await.unwrap_err();

        assert_eq!(err.kind, PlatformErrorKind::NotFound);
        assert_eq!(err.code, "ValidationException");
        assert_eq!(err.operation, Operation::UpdateEndpoint);
    }

    #[tokio::test]
    async fn test_throttling_classified_transient() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(400)
            .with_body(r#"{"__type": "ThrottlingException", "Message": "Rate exceeded"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.describe_model_package_group("credit").await.unwrap_err();

        assert_eq!(err.kind, PlatformErrorKind::Transient);
        assert_eq!(err.message, "Rate exceeded");
    }

    #[tokio::test]
    async fn test_unparseable_error_body_uses_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.describe_training_job("job").await.unwrap_err();

        assert_eq!(err.code, "Http502");
        assert_eq!(err.kind, PlatformErrorKind::Transient);
        assert_eq!(err.message, "Bad Gateway");
    }

    #[tokio::test]
    async fn test_metrics_routed_to_metrics_service() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/metrics/")
            .match_header("x-amz-target", "GraniteServiceVersion20100801.GetMetricStatistics")
            .match_body(mockito::Matcher::PartialJson(json!({"StartTime": 1_767_225_600, "EndTime": 1_767_226_200})))
            .with_status(200)
            .with_body(
                r#"{"Label": "Invocation4XXErrors", "Datapoints": [
                    {"Timestamp": 1.7672256E9, "Sum": 2.0, "Unit": "Count"},
                    {"Timestamp": 1.7672259E9, "Sum": 4.0, "Unit": "Count"}
                ]}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let request = MetricStatisticsRequest {
            namespace: "AWS/SageMaker".to_string(),
            metric_name: "Invocation4XXErrors".to_string(),
            dimensions: vec![Dimension { name: "EndpointName".to_string(), value: "credit".to_string() }],
            start_time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 10, 0).unwrap(),
            period: 300,
            statistics: vec!["Sum".to_string()],
        };
        let response = client.get_metric_statistics(&request).await.unwrap();

        assert_eq!(response.datapoints.len(), 2);
        assert_eq!(response.datapoints[1].timestamp, Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 5, 0).unwrap()));
        mock.assert_async().await;
    }
}
