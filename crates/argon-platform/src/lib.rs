//! Execution platform abstraction for Argon.
//!
//! This crate defines the capability interface the pipeline stages depend on:
//! training jobs, models, endpoint configurations, endpoints, the model
//! registry and metric statistics. Every method is a single request/response
//! call. Polling, retrying and business rules live in `argon-pipeline`.

pub mod error;
pub mod operation;
pub mod types;

use async_trait::async_trait;

pub use error::{classify, PlatformError, PlatformErrorKind};
pub use operation::{Operation, Service};
pub use types::*;

/// Result alias for platform calls.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// A thin capability interface over the remote execution platform.
///
/// Implementations marshal calls and surface backend failures, classified
/// into [`PlatformErrorKind`]. They never poll or retry.
///
/// All clients must be `Send + Sync` so a single instance can be shared.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Submits a training job.
    async fn create_training_job(
        &self,
        request: &TrainingJobRequest,
    ) -> PlatformResult<CreateTrainingJobResponse>;

    /// Reads the current state of a training job.
    async fn describe_training_job(&self, job_name: &str) -> PlatformResult<TrainingJobDescription>;

    /// Creates a model resource.
    async fn create_model(&self, request: &ModelRequest) -> PlatformResult<CreateModelResponse>;

    /// Creates an immutable endpoint configuration.
    async fn create_endpoint_config(
        &self,
        request: &EndpointConfigRequest,
    ) -> PlatformResult<CreateEndpointConfigResponse>;

    /// Creates a new endpoint.
    async fn create_endpoint(&self, request: &EndpointRequest) -> PlatformResult<EndpointResponse>;

    /// Points an existing endpoint at a new configuration.
    async fn update_endpoint(&self, request: &EndpointRequest) -> PlatformResult<EndpointResponse>;

    /// Reads a model package group.
    async fn describe_model_package_group(
        &self,
        group_name: &str,
    ) -> PlatformResult<ModelPackageGroupDescription>;

    /// Creates a model package group.
    async fn create_model_package_group(
        &self,
        request: &ModelPackageGroupRequest,
    ) -> PlatformResult<CreateModelPackageGroupResponse>;

    /// Registers a new model package version.
    async fn create_model_package(
        &self,
        request: &ModelPackageRequest,
    ) -> PlatformResult<ModelPackageResponse>;

    /// Changes the approval state of a model package.
    async fn update_model_package_approval(
        &self,
        request: &ModelPackageApprovalRequest,
    ) -> PlatformResult<ModelPackageResponse>;

    /// Fetches aggregated metric statistics.
    async fn get_metric_statistics(
        &self,
        request: &MetricStatisticsRequest,
    ) -> PlatformResult<MetricStatisticsResponse>;
}
