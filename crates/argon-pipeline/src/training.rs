//! Training stage: submit a job, wait for it, publish the artifact.

use argon_platform::{
    AlgorithmSpecification, Channel, DataSource, Operation, OutputDataConfig, PlatformClient,
    PlatformError, PlatformErrorKind, ResourceConfig, S3DataSource, StoppingCondition,
    TrainingJobDescription, TrainingJobRequest, TrainingJobStatus,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::artifacts::MetricsArtifact;
use crate::config::TrainingConfig;
use crate::error::{PipelineError, PipelineResult, Stage};
use crate::handoff::{keys, HandoffStore};
use crate::naming::ResourceNamer;
use crate::poll::PollSchedule;

/// Result of a completed training job.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutcome {
    pub job_name: String,
    /// Artifact location exactly as reported by the backend.
    pub artifact_uri: String,
    pub metrics: MetricsArtifact,
}

/// Builds the submission for `job_name`.
#[must_use]
pub fn build_training_request(config: &TrainingConfig, job_name: &str) -> TrainingJobRequest {
    TrainingJobRequest {
        training_job_name: job_name.to_string(),
        role_arn: config.role_arn.clone(),
        algorithm_specification: AlgorithmSpecification {
            training_image: config.train_image.clone(),
            training_input_mode: "File".to_string(),
        },
        input_data_config: vec![Channel {
            channel_name: "train".to_string(),
            data_source: DataSource {
                s3_data_source: S3DataSource {
                    s3_data_type: "S3Prefix".to_string(),
                    s3_uri: config.train_channel_uri(),
                    s3_data_distribution_type: "FullyReplicated".to_string(),
                },
            },
            content_type: Some("text/csv".to_string()),
        }],
        output_data_config: OutputDataConfig { s3_output_path: config.output_path() },
        resource_config: ResourceConfig {
            instance_type: config.instance_type.clone(),
            instance_count: config.instance_count,
            volume_size_in_gb: config.volume_size_gb,
        },
        stopping_condition: StoppingCondition { max_runtime_in_seconds: config.max_runtime_seconds },
        vpc_config: config.vpc.clone(),
    }
}

/// Submits a training job and blocks until it reaches a terminal status.
///
/// On completion the artifact URI and job name are persisted to `store` and
/// the job's final metrics are written to `config.metrics_file`. A failed or
/// stopped job writes nothing.
pub async fn run_training(
    config: &TrainingConfig,
    client: &dyn PlatformClient,
    store: &mut dyn HandoffStore,
    namer: &ResourceNamer,
    cancel: &CancellationToken,
) -> PipelineResult<TrainingOutcome> {
    let job_name = namer.name(&config.project, "train");
    let request = build_training_request(config, &job_name);

    info!(
        job_name = %job_name,
        image = %config.train_image,
        input = %config.train_channel_uri(),
        instance_type = %config.instance_type,
        "Starting training job"
    );
    let submitted = client
        .create_training_job(&request)
        .await
        .map_err(|source| PipelineError::remote(Stage::Training, &job_name, source))?;
    info!(job_name = %job_name, arn = %submitted.training_job_arn, "Training job submitted");

    let description = wait_for_training_job(client, &job_name, &config.poll, cancel).await?;

    match description.training_job_status {
        TrainingJobStatus::Completed => {}
        status => {
            warn!(
                job_name = %job_name,
                status = %status,
                reason = description.failure_reason.as_deref().unwrap_or(""),
                "Training job did not complete"
            );
            return Err(PipelineError::TrainingFailed {
                job_name,
                status,
                reason: description.failure_reason,
            });
        }
    }

    let artifact_uri = description
        .model_artifacts
        .as_ref()
        .map(|a| a.s3_model_artifacts.clone())
        .filter(|uri| !uri.is_empty())
        .ok_or_else(|| {
            PipelineError::remote(
                Stage::Training,
                &job_name,
                PlatformError::new(
                    PlatformErrorKind::Other,
                    Operation::DescribeTrainingJob,
                    "MissingModelArtifacts",
                    "completed job reported no model artifacts",
                ),
            )
        })?;

    let metrics = MetricsArtifact::from_job(&job_name, &description.final_metric_data_list);
    metrics.write(&config.metrics_file)?;

    store.set(keys::MODEL_ARTIFACTS, &artifact_uri);
    store.set(keys::TRAINING_JOB_NAME, &job_name);
    store.persist()?;

    info!(job_name = %job_name, artifact = %artifact_uri, metrics = metrics.metrics.len(), "Training completed");
    Ok(TrainingOutcome { job_name, artifact_uri, metrics })
}

/// Polls `job_name` until its status is terminal.
///
/// Cancellation stops the wait only. The remote job keeps running.
pub async fn wait_for_training_job(
    client: &dyn PlatformClient,
    job_name: &str,
    schedule: &PollSchedule,
    cancel: &CancellationToken,
) -> PipelineResult<TrainingJobDescription> {
    let cancelled = || PipelineError::Cancelled { stage: Stage::Training, resource: job_name.to_string() };
    let mut delay = schedule.initial();

    loop {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        let description = client
            .describe_training_job(job_name)
            .await
            .map_err(|source| PipelineError::remote(Stage::Training, job_name, source))?;

        if description.training_job_status.is_terminal() {
            return Ok(description);
        }
        debug!(
            job_name = %job_name,
            status = %description.training_job_status,
            secondary = description.secondary_status.as_deref().unwrap_or(""),
            next_check_secs = delay.as_secs(),
            "Training job still running"
        );

        tokio::select! {
            () = cancel.cancelled() => return Err(cancelled()),
            () = tokio::time::sleep(delay) => {}
        }
        delay = schedule.next_delay(delay);
    }
}
