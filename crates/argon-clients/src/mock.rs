//! In-memory platform used for tests and local dry runs.
//!
//! `MockPlatform` keeps just enough state to behave like the real backend for
//! the pipeline's branches: endpoints exist or not, groups exist or not, job
//! status advances through a scripted sequence. Every call is recorded so
//! tests can assert on exactly which operations ran.

use argon_platform::{
    ApprovalStatus, CreateEndpointConfigResponse, CreateModelPackageGroupResponse,
    CreateModelResponse, CreateTrainingJobResponse, Datapoint, EndpointConfigRequest,
    EndpointRequest, EndpointResponse, MetricData, MetricStatisticsRequest,
    MetricStatisticsResponse, ModelArtifacts, ModelPackageApprovalRequest,
    ModelPackageGroupDescription, ModelPackageGroupRequest, ModelPackageRequest,
    ModelPackageResponse, ModelRequest, Operation, PlatformClient, PlatformError,
    PlatformResult, TrainingJobDescription, TrainingJobRequest, TrainingJobStatus,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

const ARN_PREFIX: &str = "arn:aws:sagemaker:local:000000000000";

/// A recorded call against the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub operation: Operation,
    /// Primary resource name the call addressed.
    pub resource: String,
}

#[derive(Debug, Default)]
struct JobScript {
    statuses: VecDeque<TrainingJobStatus>,
    artifact_uri: Option<String>,
    failure_reason: Option<String>,
    final_metrics: Vec<MetricData>,
}

#[derive(Debug, Default)]
struct MockState {
    script: JobScript,
    jobs: HashMap<String, VecDeque<TrainingJobStatus>>,
    models: HashMap<String, ModelRequest>,
    endpoint_configs: HashMap<String, EndpointConfigRequest>,
    endpoints: HashMap<String, String>,
    groups: HashSet<String>,
    packages: HashMap<String, (ModelPackageRequest, ApprovalStatus)>,
    package_counter: HashMap<String, u32>,
    datapoints: Vec<Datapoint>,
    last_metric_request: Option<MetricStatisticsRequest>,
    failures: HashMap<Operation, VecDeque<PlatformError>>,
    calls: Vec<RecordedCall>,
}

/// In-memory [`PlatformClient`].
#[derive(Debug, Default)]
pub struct MockPlatform {
    state: Mutex<MockState>,
}

impl MockPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Statuses reported by successive `describe_training_job` calls.
    ///
    /// The last status repeats once the sequence is exhausted.
    #[must_use]
    pub fn with_job_statuses(self, statuses: impl IntoIterator<Item = TrainingJobStatus>) -> Self {
        self.state().script.statuses = statuses.into_iter().collect();
        self
    }

    /// Artifact URI reported once a job completes.
    #[must_use]
    pub fn with_model_artifacts(self, uri: impl Into<String>) -> Self {
        self.state().script.artifact_uri = Some(uri.into());
        self
    }

    #[must_use]
    pub fn with_failure_reason(self, reason: impl Into<String>) -> Self {
        self.state().script.failure_reason = Some(reason.into());
        self
    }

    /// Final metrics reported by a terminal job description.
    #[must_use]
    pub fn with_final_metrics(self, metrics: impl IntoIterator<Item = (&'static str, f64)>) -> Self {
        self.state().script.final_metrics = metrics
            .into_iter()
            .map(|(name, value)| MetricData { metric_name: name.to_string(), value })
            .collect();
        self
    }

    /// Seeds an existing endpoint pointed at `config_name`.
    #[must_use]
    pub fn with_endpoint(self, name: impl Into<String>, config_name: impl Into<String>) -> Self {
        self.state().endpoints.insert(name.into(), config_name.into());
        self
    }

    /// Seeds an existing model package group.
    #[must_use]
    pub fn with_group(self, name: impl Into<String>) -> Self {
        self.state().groups.insert(name.into());
        self
    }

    /// Seeds an existing model package in the given approval state.
    #[must_use]
    pub fn with_package(self, arn: impl Into<String>, status: ApprovalStatus) -> Self {
        let arn = arn.into();
        let request = ModelPackageRequest {
            model_package_group_name: String::new(),
            model_package_description: None,
            inference_specification: argon_platform::InferenceSpecification {
                containers: Vec::new(),
                supported_content_types: Vec::new(),
                supported_response_mime_types: Vec::new(),
            },
            model_approval_status: status,
        };
        self.state().packages.insert(arn, (request, status));
        self
    }

    /// Datapoints returned by `get_metric_statistics`.
    #[must_use]
    pub fn with_datapoints(self, sums: impl IntoIterator<Item = Option<f64>>) -> Self {
        self.state().datapoints =
            sums.into_iter().map(|sum| Datapoint { timestamp: None, sum, unit: None }).collect();
        self
    }

    /// Makes the next call to `operation` fail with `error`.
    ///
    /// Multiple failures for the same operation are returned in order.
    pub fn fail_next(&self, operation: Operation, error: PlatformError) {
        self.state().failures.entry(operation).or_default().push_back(error);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    /// Number of recorded calls to `operation`.
    #[must_use]
    pub fn call_count(&self, operation: Operation) -> usize {
        self.state().calls.iter().filter(|c| c.operation == operation).count()
    }

    /// Configuration the endpoint currently points at, if it exists.
    #[must_use]
    pub fn endpoint_config_of(&self, endpoint: &str) -> Option<String> {
        self.state().endpoints.get(endpoint).cloned()
    }

    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.state().endpoints.len()
    }

    #[must_use]
    pub fn group_exists(&self, name: &str) -> bool {
        self.state().groups.contains(name)
    }

    #[must_use]
    pub fn approval_of(&self, arn: &str) -> Option<ApprovalStatus> {
        self.state().packages.get(arn).map(|(_, status)| *status)
    }

    #[must_use]
    pub fn endpoint_config(&self, name: &str) -> Option<EndpointConfigRequest> {
        self.state().endpoint_configs.get(name).cloned()
    }

    #[must_use]
    pub fn model(&self, name: &str) -> Option<ModelRequest> {
        self.state().models.get(name).cloned()
    }

    #[must_use]
    pub fn package(&self, arn: &str) -> Option<ModelPackageRequest> {
        self.state().packages.get(arn).map(|(request, _)| request.clone())
    }

    #[must_use]
    pub fn last_metric_request(&self) -> Option<MetricStatisticsRequest> {
        self.state().last_metric_request.clone()
    }

    /// Records the call and returns a scripted failure if one is queued.
    fn enter(state: &mut MockState, operation: Operation, resource: &str) -> PlatformResult<()> {
        debug!(operation = %operation, resource = %resource, "MockPlatform call");
        state.calls.push(RecordedCall { operation, resource: resource.to_string() });
        match state.failures.get_mut(&operation).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn backend_error(operation: Operation, code: &str, message: String) -> PlatformError {
    PlatformError::from_backend(operation, code, message, Some(400))
}

#[async_trait]
impl PlatformClient for MockPlatform {
    async fn create_training_job(
        &self,
        request: &TrainingJobRequest,
    ) -> PlatformResult<CreateTrainingJobResponse> {
        let op = Operation::CreateTrainingJob;
        let mut state = self.state();
        Self::enter(&mut state, op, &request.training_job_name)?;

        if state.jobs.contains_key(&request.training_job_name) {
            return Err(backend_error(
                op,
                "ResourceInUse",
                format!("Training job names must be unique: {}", request.training_job_name),
            ));
        }
        let statuses = if state.script.statuses.is_empty() {
            VecDeque::from([TrainingJobStatus::Completed])
        } else {
            state.script.statuses.clone()
        };
        state.jobs.insert(request.training_job_name.clone(), statuses);

        Ok(CreateTrainingJobResponse {
            training_job_arn: format!("{ARN_PREFIX}:training-job/{}", request.training_job_name),
        })
    }

    async fn describe_training_job(&self, job_name: &str) -> PlatformResult<TrainingJobDescription> {
        let op = Operation::DescribeTrainingJob;
        let mut state = self.state();
        Self::enter(&mut state, op, job_name)?;

        let Some(statuses) = state.jobs.get_mut(job_name) else {
            return Err(backend_error(op, "ValidationException", format!("Requested resource not found: {job_name}")));
        };
        let status = if statuses.len() > 1 {
            statuses.pop_front().unwrap_or(TrainingJobStatus::InProgress)
        } else {
            statuses.front().copied().unwrap_or(TrainingJobStatus::Completed)
        };

        let terminal = status.is_terminal();
        let completed = status == TrainingJobStatus::Completed;
        Ok(TrainingJobDescription {
            training_job_name: job_name.to_string(),
            training_job_status: status,
            secondary_status: None,
            failure_reason: if completed { None } else { state.script.failure_reason.clone() },
            model_artifacts: if completed {
                state.script.artifact_uri.clone().map(|uri| ModelArtifacts { s3_model_artifacts: uri })
            } else {
                None
            },
            final_metric_data_list: if terminal { state.script.final_metrics.clone() } else { Vec::new() },
        })
    }

    async fn create_model(&self, request: &ModelRequest) -> PlatformResult<CreateModelResponse> {
        let op = Operation::CreateModel;
        let mut state = self.state();
        Self::enter(&mut state, op, &request.model_name)?;

        if state.models.contains_key(&request.model_name) {
            return Err(backend_error(
                op,
                "ValidationException",
                format!("Cannot create already existing model \"{}\".", request.model_name),
            ));
        }
        state.models.insert(request.model_name.clone(), request.clone());
        Ok(CreateModelResponse { model_arn: format!("{ARN_PREFIX}:model/{}", request.model_name) })
    }

    async fn create_endpoint_config(
        &self,
        request: &EndpointConfigRequest,
    ) -> PlatformResult<CreateEndpointConfigResponse> {
        let op = Operation::CreateEndpointConfig;
        let mut state = self.state();
        Self::enter(&mut state, op, &request.endpoint_config_name)?;

        if state.endpoint_configs.contains_key(&request.endpoint_config_name) {
            return Err(backend_error(
                op,
                "ValidationException",
                format!(
                    "Cannot create already existing endpoint configuration \"{}\".",
                    request.endpoint_config_name
                ),
            ));
        }
        state.endpoint_configs.insert(request.endpoint_config_name.clone(), request.clone());
        Ok(CreateEndpointConfigResponse {
            endpoint_config_arn: format!("{ARN_PREFIX}:endpoint-config/{}", request.endpoint_config_name),
        })
    }

    async fn create_endpoint(&self, request: &EndpointRequest) -> PlatformResult<EndpointResponse> {
        let op = Operation::CreateEndpoint;
        let mut state = self.state();
        Self::enter(&mut state, op, &request.endpoint_name)?;

        if state.endpoints.contains_key(&request.endpoint_name) {
            return Err(backend_error(
                op,
                "ValidationException",
                format!("Cannot create already existing endpoint \"{}\".", request.endpoint_name),
            ));
        }
        state.endpoints.insert(request.endpoint_name.clone(), request.endpoint_config_name.clone());
        Ok(EndpointResponse { endpoint_arn: format!("{ARN_PREFIX}:endpoint/{}", request.endpoint_name) })
    }

    async fn update_endpoint(&self, request: &EndpointRequest) -> PlatformResult<EndpointResponse> {
        let op = Operation::UpdateEndpoint;
        let mut state = self.state();
        Self::enter(&mut state, op, &request.endpoint_name)?;

        if !state.endpoint_configs.contains_key(&request.endpoint_config_name) {
            return Err(backend_error(
                op,
                "ValidationException",
                format!("Could not find endpoint configuration \"{}\".", request.endpoint_config_name),
            ));
        }
        match state.endpoints.get_mut(&request.endpoint_name) {
            Some(current) => {
                current.clone_from(&request.endpoint_config_name);
                Ok(EndpointResponse {
                    endpoint_arn: format!("{ARN_PREFIX}:endpoint/{}", request.endpoint_name),
                })
            }
            None => Err(backend_error(
                op,
                "ValidationException",
                format!("Could not find endpoint \"{ARN_PREFIX}:endpoint/{}\".", request.endpoint_name),
            )),
        }
    }

    async fn describe_model_package_group(
        &self,
        group_name: &str,
    ) -> PlatformResult<ModelPackageGroupDescription> {
        let op = Operation::DescribeModelPackageGroup;
        let mut state = self.state();
        Self::enter(&mut state, op, group_name)?;

        if state.groups.contains(group_name) {
            Ok(ModelPackageGroupDescription {
                model_package_group_name: group_name.to_string(),
                model_package_group_arn: format!("{ARN_PREFIX}:model-package-group/{group_name}"),
                model_package_group_status: Some("Completed".to_string()),
            })
        } else {
            Err(backend_error(op, "ValidationException", format!("ModelPackageGroup {group_name} does not exist.")))
        }
    }

    async fn create_model_package_group(
        &self,
        request: &ModelPackageGroupRequest,
    ) -> PlatformResult<CreateModelPackageGroupResponse> {
        let op = Operation::CreateModelPackageGroup;
        let mut state = self.state();
        Self::enter(&mut state, op, &request.model_package_group_name)?;

        if !state.groups.insert(request.model_package_group_name.clone()) {
            return Err(backend_error(
                op,
                "ValidationException",
                format!("Model Package Group already exists: {}", request.model_package_group_name),
            ));
        }
        Ok(CreateModelPackageGroupResponse {
            model_package_group_arn: format!(
                "{ARN_PREFIX}:model-package-group/{}",
                request.model_package_group_name
            ),
        })
    }

    async fn create_model_package(
        &self,
        request: &ModelPackageRequest,
    ) -> PlatformResult<ModelPackageResponse> {
        let op = Operation::CreateModelPackage;
        let mut state = self.state();
        Self::enter(&mut state, op, &request.model_package_group_name)?;

        if !state.groups.contains(&request.model_package_group_name) {
            return Err(backend_error(
                op,
                "ValidationException",
                format!("ModelPackageGroup {} does not exist.", request.model_package_group_name),
            ));
        }
        let version = {
            let counter = state.package_counter.entry(request.model_package_group_name.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        let arn = format!("{ARN_PREFIX}:model-package/{}/{version}", request.model_package_group_name);
        state.packages.insert(arn.clone(), (request.clone(), request.model_approval_status));
        Ok(ModelPackageResponse { model_package_arn: arn })
    }

    async fn update_model_package_approval(
        &self,
        request: &ModelPackageApprovalRequest,
    ) -> PlatformResult<ModelPackageResponse> {
        let op = Operation::UpdateModelPackage;
        let mut state = self.state();
        Self::enter(&mut state, op, &request.model_package_arn)?;

        match state.packages.get_mut(&request.model_package_arn) {
            Some((_, status)) => {
                if !status.can_transition_to(request.model_approval_status) {
                    return Err(backend_error(
                        op,
                        "ValidationException",
                        format!("Cannot change approval status from {status} to {}", request.model_approval_status),
                    ));
                }
                *status = request.model_approval_status;
                Ok(ModelPackageResponse { model_package_arn: request.model_package_arn.clone() })
            }
            None => Err(backend_error(
                op,
                "ValidationException",
                format!("Model package {} does not exist.", request.model_package_arn),
            )),
        }
    }

    async fn get_metric_statistics(
        &self,
        request: &MetricStatisticsRequest,
    ) -> PlatformResult<MetricStatisticsResponse> {
        let op = Operation::GetMetricStatistics;
        let mut state = self.state();
        Self::enter(&mut state, op, &request.metric_name)?;

        state.last_metric_request = Some(request.clone());
        Ok(MetricStatisticsResponse {
            label: Some(request.metric_name.clone()),
            datapoints: state.datapoints.clone(),
        })
    }
}
