//! Registration stage: record the trained artifact as a new model package.

use argon_platform::{
    ApprovalStatus, InferenceContainer, InferenceSpecification, ModelPackageGroupRequest,
    ModelPackageRequest, PlatformClient,
};
use tracing::{debug, info};

use crate::config::RegistrationConfig;
use crate::error::{PipelineError, PipelineResult, Stage};
use crate::handoff::{keys, HandoffStore};

/// How [`ensure_model_package_group`] satisfied its postcondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOutcome {
    Existing,
    Created,
    /// Another writer created the group between our describe and create.
    CreatedConcurrently,
}

/// Makes sure the model package group exists.
///
/// Safe to call repeatedly and concurrently: a conflict on create means the
/// group now exists and counts as success. Errors other than "not found" on
/// describe propagate and never trigger a create.
pub async fn ensure_model_package_group(
    client: &dyn PlatformClient,
    group_name: &str,
    description: Option<&str>,
) -> PipelineResult<GroupOutcome> {
    match client.describe_model_package_group(group_name).await {
        Ok(existing) => {
            debug!(group = %group_name, arn = %existing.model_package_group_arn, "Model package group exists");
            return Ok(GroupOutcome::Existing);
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(PipelineError::remote(Stage::Registration, group_name, e)),
    }

    let request = ModelPackageGroupRequest {
        model_package_group_name: group_name.to_string(),
        model_package_group_description: description.map(str::to_string),
    };
    match client.create_model_package_group(&request).await {
        Ok(created) => {
            info!(group = %group_name, arn = %created.model_package_group_arn, "Created model package group");
            Ok(GroupOutcome::Created)
        }
        Err(e) if e.is_conflict() => {
            debug!(group = %group_name, code = %e.code, "Model package group created concurrently");
            Ok(GroupOutcome::CreatedConcurrently)
        }
        Err(e) => Err(PipelineError::remote(Stage::Registration, group_name, e)),
    }
}

#[must_use]
pub fn build_package_request(config: &RegistrationConfig) -> ModelPackageRequest {
    ModelPackageRequest {
        model_package_group_name: config.group_name.clone(),
        model_package_description: Some(config.package_description.clone()),
        inference_specification: InferenceSpecification {
            containers: vec![InferenceContainer {
                image: config.inference_image.clone(),
                model_data_url: config.model_artifacts.clone(),
            }],
            supported_content_types: config.content_types.clone(),
            supported_response_mime_types: config.response_types.clone(),
        },
        model_approval_status: ApprovalStatus::PendingManualApproval,
    }
}

/// Registers the artifact as a new package version, pending manual approval.
///
/// Each call creates a new version. The package ARN is persisted as
/// `MODEL_PACKAGE_ARN`.
pub async fn register_model(
    config: &RegistrationConfig,
    client: &dyn PlatformClient,
    store: &mut dyn HandoffStore,
) -> PipelineResult<String> {
    ensure_model_package_group(client, &config.group_name, config.group_description.as_deref()).await?;

    let request = build_package_request(config);
    let response = client
        .create_model_package(&request)
        .await
        .map_err(|e| PipelineError::remote(Stage::Registration, &config.group_name, e))?;

    store.set(keys::MODEL_PACKAGE_ARN, &response.model_package_arn);
    store.persist()?;

    info!(
        group = %config.group_name,
        package_arn = %response.model_package_arn,
        artifact = %config.model_artifacts,
        "Registered model package"
    );
    Ok(response.model_package_arn)
}
