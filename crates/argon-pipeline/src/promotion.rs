//! Promotion stage: put a registered package behind the stable endpoint.
//!
//! Every promotion mints a fresh model and endpoint configuration, then
//! points the endpoint at the new configuration, creating the endpoint if it
//! does not exist yet. The sequence is not transactional. If a later step
//! fails, the resources already created are left behind and named in the
//! error.

use argon_platform::{
    ApprovalStatus, CaptureMode, CaptureOption, ContainerDefinition, DataCaptureConfig,
    EndpointConfigRequest, EndpointRequest, ModelPackageApprovalRequest, ModelRequest,
    PlatformClient, PlatformError, ProductionVariant,
};
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::PromotionConfig;
use crate::error::{PipelineError, PipelineResult, Stage};
use crate::naming::ResourceNamer;

/// Name of the single production variant receiving all traffic.
pub const VARIANT_NAME: &str = "AllTraffic";

/// Whether the endpoint existed before promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    Absent,
    Present,
}

/// What endpoint resolution did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointAction {
    /// The endpoint existed and now points at the new configuration.
    Updated,
    /// The endpoint did not exist and was created.
    Created,
}

impl EndpointAction {
    #[must_use]
    pub const fn previous_state(self) -> EndpointState {
        match self {
            Self::Updated => EndpointState::Present,
            Self::Created => EndpointState::Absent,
        }
    }
}

impl fmt::Display for EndpointAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Updated => f.write_str("updated"),
            Self::Created => f.write_str("created"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionOutcome {
    pub endpoint_name: String,
    pub model_name: String,
    pub endpoint_config_name: String,
    pub action: EndpointAction,
}

/// Promotes the configured package to the endpoint.
pub async fn promote(
    config: &PromotionConfig,
    client: &dyn PlatformClient,
    namer: &ResourceNamer,
) -> PipelineResult<PromotionOutcome> {
    if config.gate_verdict == Some(false) {
        warn!(package_arn = %config.package_arn, "Quality gate verdict is negative, not promoting");
        return Err(PipelineError::GateNotPassed { package_arn: config.package_arn.clone() });
    }

    if config.auto_approve {
        approve_package(client, &config.package_arn).await?;
    }

    let model_name = namer.name(&config.resource_prefix, "model");
    let endpoint_config_name = namer.name(&config.resource_prefix, "config");

    let model = build_model_request(config, &model_name);
    client
        .create_model(&model)
        .await
        .map_err(|e| PipelineError::remote(Stage::Promotion, &model_name, e))?;
    info!(model = %model_name, package_arn = %config.package_arn, "Created model");

    let endpoint_config = build_endpoint_config_request(config, &endpoint_config_name, &model_name);
    client
        .create_endpoint_config(&endpoint_config)
        .await
        .map_err(|source| PipelineError::EndpointConfigCreation {
            endpoint_config_name: endpoint_config_name.clone(),
            model_name: model_name.clone(),
            source,
        })?;
    info!(
        endpoint_config = %endpoint_config_name,
        instance_type = %config.instance_type,
        instance_count = config.instance_count,
        data_capture = config.data_capture,
        "Created endpoint config"
    );

    let action = resolve_endpoint(client, &config.endpoint_name, &endpoint_config_name)
        .await
        .map_err(|source| PipelineError::EndpointResolution {
            endpoint: config.endpoint_name.clone(),
            model_name: model_name.clone(),
            endpoint_config_name: endpoint_config_name.clone(),
            source,
        })?;

    info!(endpoint = %config.endpoint_name, endpoint_config = %endpoint_config_name, %action, "Endpoint promoted");
    Ok(PromotionOutcome {
        endpoint_name: config.endpoint_name.clone(),
        model_name,
        endpoint_config_name,
        action,
    })
}

async fn approve_package(client: &dyn PlatformClient, package_arn: &str) -> PipelineResult<()> {
    let request = ModelPackageApprovalRequest {
        model_package_arn: package_arn.to_string(),
        model_approval_status: ApprovalStatus::Approved,
    };
    client
        .update_model_package_approval(&request)
        .await
        .map_err(|e| PipelineError::remote(Stage::Promotion, package_arn, e))?;
    info!(package_arn = %package_arn, "Approved model package");
    Ok(())
}

/// Points `endpoint_name` at `endpoint_config_name`.
///
/// Tries an update first. Only a "not found" failure falls through to a
/// single create with the same name and configuration; every other failure
/// is returned as is.
pub async fn resolve_endpoint(
    client: &dyn PlatformClient,
    endpoint_name: &str,
    endpoint_config_name: &str,
) -> Result<EndpointAction, PlatformError> {
    let request = EndpointRequest {
        endpoint_name: endpoint_name.to_string(),
        endpoint_config_name: endpoint_config_name.to_string(),
    };

    match client.update_endpoint(&request).await {
        Ok(_) => Ok(EndpointAction::Updated),
        Err(e) if e.is_not_found() => {
            debug!(endpoint = %endpoint_name, code = %e.code, "Endpoint absent, creating");
            client.create_endpoint(&request).await?;
            Ok(EndpointAction::Created)
        }
        Err(e) => Err(e),
    }
}

#[must_use]
pub fn build_model_request(config: &PromotionConfig, model_name: &str) -> ModelRequest {
    ModelRequest {
        model_name: model_name.to_string(),
        execution_role_arn: config.role_arn.clone(),
        containers: vec![ContainerDefinition {
            model_package_name: Some(config.package_arn.clone()),
            image: None,
            model_data_url: None,
        }],
    }
}

#[must_use]
pub fn build_endpoint_config_request(
    config: &PromotionConfig,
    endpoint_config_name: &str,
    model_name: &str,
) -> EndpointConfigRequest {
    let data_capture_config = config.data_capture.then(|| DataCaptureConfig {
        enable_capture: true,
        destination_s3_uri: config.capture_destination(),
        initial_sampling_percentage: config.capture_sampling_percentage,
        capture_options: vec![
            CaptureOption { capture_mode: CaptureMode::Input },
            CaptureOption { capture_mode: CaptureMode::Output },
        ],
    });

    EndpointConfigRequest {
        endpoint_config_name: endpoint_config_name.to_string(),
        production_variants: vec![ProductionVariant {
            variant_name: VARIANT_NAME.to_string(),
            model_name: model_name.to_string(),
            initial_instance_count: config.instance_count,
            instance_type: config.instance_type.clone(),
        }],
        data_capture_config,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon_clients::MockPlatform;
    use argon_platform::{Operation, PlatformErrorKind};

    const PACKAGE: &str = "arn:aws:sagemaker:local:000000000000:model-package/credit-risk/1";

    fn config() -> PromotionConfig {
        PromotionConfig {
            endpoint_name: "credit-risk-endpoint".to_string(),
            package_arn: PACKAGE.to_string(),
            role_arn: "arn:aws:iam::1:role/sm".to_string(),
            model_bucket: "credit-models".to_string(),
            auto_approve: true,
            resource_prefix: "prod".to_string(),
            instance_type: "ml.m5.large".to_string(),
            instance_count: 1,
            data_capture: true,
            capture_sampling_percentage: 100,
            gate_verdict: Some(true),
        }
    }

    #[tokio::test]
    async fn test_absent_endpoint_is_created() {
        let platform = MockPlatform::new().with_package(PACKAGE, ApprovalStatus::PendingManualApproval);

        let outcome = promote(&config(), &platform, &ResourceNamer::new()).await.unwrap();

        assert_eq!(outcome.action, EndpointAction::Created);
        assert_eq!(outcome.action.previous_state(), EndpointState::Absent);
        assert_eq!(platform.endpoint_count(), 1);
        assert_eq!(
            platform.endpoint_config_of("credit-risk-endpoint").as_deref(),
            Some(outcome.endpoint_config_name.as_str())
        );
        assert_eq!(platform.call_count(Operation::UpdateEndpoint), 1);
        assert_eq!(platform.call_count(Operation::CreateEndpoint), 1);
        assert_eq!(platform.approval_of(PACKAGE), Some(ApprovalStatus::Approved));
    }

    #[tokio::test]
    async fn test_present_endpoint_is_updated_in_place() {
        let platform = MockPlatform::new()
            .with_package(PACKAGE, ApprovalStatus::PendingManualApproval)
            .with_endpoint("credit-risk-endpoint", "prod-config-old");

        let outcome = promote(&config(), &platform, &ResourceNamer::new()).await.unwrap();

        assert_eq!(outcome.action, EndpointAction::Updated);
        assert_eq!(platform.endpoint_count(), 1);
        assert_eq!(
            platform.endpoint_config_of("credit-risk-endpoint").as_deref(),
            Some(outcome.endpoint_config_name.as_str())
        );
        assert_eq!(platform.call_count(Operation::CreateEndpoint), 0);
    }

    #[tokio::test]
    async fn test_repeated_promotion_never_duplicates_endpoint() {
        let platform = MockPlatform::new().with_package(PACKAGE, ApprovalStatus::PendingManualApproval);
        let namer = ResourceNamer::new();

        let first = promote(&config(), &platform, &namer).await.unwrap();
        let second = promote(&config(), &platform, &namer).await.unwrap();

        assert_eq!(first.action, EndpointAction::Created);
        assert_eq!(second.action, EndpointAction::Updated);
        assert_ne!(first.endpoint_config_name, second.endpoint_config_name);
        assert_eq!(platform.endpoint_count(), 1);
    }

    #[tokio::test]
    async fn test_non_not_found_update_error_never_creates() {
        let platform = MockPlatform::new().with_package(PACKAGE, ApprovalStatus::PendingManualApproval);
        platform.fail_next(
            Operation::UpdateEndpoint,
            PlatformError::new(PlatformErrorKind::Other, Operation::UpdateEndpoint, "AccessDeniedException", "denied"),
        );

        let err = promote(&config(), &platform, &ResourceNamer::new()).await.unwrap_err();

        match &err {
            PipelineError::EndpointResolution { model_name, endpoint_config_name, .. } => {
                assert!(platform.model(model_name).is_some());
                assert!(platform.endpoint_config(endpoint_config_name).is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.backend_code(), Some("AccessDeniedException"));
        assert_eq!(platform.call_count(Operation::CreateEndpoint), 0);
        assert_eq!(platform.endpoint_count(), 0);
    }

    #[tokio::test]
    async fn test_config_failure_names_orphaned_model() {
        let platform = MockPlatform::new().with_package(PACKAGE, ApprovalStatus::PendingManualApproval);
        platform.fail_next(
            Operation::CreateEndpointConfig,
            PlatformError::new(
                PlatformErrorKind::Other,
                Operation::CreateEndpointConfig,
                "ResourceLimitExceeded",
                "endpoint config limit reached",
            ),
        );

        let err = promote(&config(), &platform, &ResourceNamer::new()).await.unwrap_err();

        match &err {
            PipelineError::EndpointConfigCreation { model_name, endpoint_config_name, .. } => {
                assert!(platform.model(model_name).is_some());
                assert!(platform.endpoint_config(endpoint_config_name).is_none());
                assert!(err.to_string().contains(model_name.as_str()));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.backend_code(), Some("ResourceLimitExceeded"));
        assert_eq!(platform.call_count(Operation::UpdateEndpoint), 0);
    }

    #[tokio::test]
    async fn test_missing_endpoint_config_on_update_never_creates() {
        let platform = MockPlatform::new().with_endpoint("credit-risk-endpoint", "prod-config-old");
        platform.fail_next(
            Operation::UpdateEndpoint,
            PlatformError::from_backend(
                Operation::UpdateEndpoint,
                "ValidationException",
                "Could not find endpoint configuration \"prod-config-x\".",
                Some(400),
            ),
        );

        let err = resolve_endpoint(&platform, "credit-risk-endpoint", "prod-config-x").await.unwrap_err();

        assert_ne!(err.kind, PlatformErrorKind::NotFound);
        assert_eq!(platform.call_count(Operation::CreateEndpoint), 0);
        assert_eq!(platform.endpoint_config_of("credit-risk-endpoint").as_deref(), Some("prod-config-old"));
    }

    #[tokio::test]
    async fn test_negative_gate_refuses_before_any_call() {
        let platform = MockPlatform::new().with_package(PACKAGE, ApprovalStatus::PendingManualApproval);
        let mut cfg = config();
        cfg.gate_verdict = Some(false);

        let err = promote(&cfg, &platform, &ResourceNamer::new()).await.unwrap_err();

        assert!(matches!(err, PipelineError::GateNotPassed { .. }));
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_without_auto_approve_package_stays_pending() {
        let platform = MockPlatform::new().with_package(PACKAGE, ApprovalStatus::PendingManualApproval);
        let mut cfg = config();
        cfg.auto_approve = false;

        promote(&cfg, &platform, &ResourceNamer::new()).await.unwrap();

        assert_eq!(platform.call_count(Operation::UpdateModelPackage), 0);
        assert_eq!(platform.approval_of(PACKAGE), Some(ApprovalStatus::PendingManualApproval));
    }

    #[tokio::test]
    async fn test_model_and_config_shape() {
        let platform = MockPlatform::new().with_package(PACKAGE, ApprovalStatus::Approved);

        let outcome = promote(&config(), &platform, &ResourceNamer::at(1_700_000_000)).await.unwrap();

        assert!(outcome.model_name.starts_with("prod-model-1700000000-"));
        assert!(outcome.endpoint_config_name.starts_with("prod-config-1700000000-"));

        let model = platform.model(&outcome.model_name).unwrap();
        assert_eq!(model.containers[0].model_package_name.as_deref(), Some(PACKAGE));

        let endpoint_config = platform.endpoint_config(&outcome.endpoint_config_name).unwrap();
        let variant = &endpoint_config.production_variants[0];
        assert_eq!(variant.variant_name, VARIANT_NAME);
        assert_eq!(variant.model_name, outcome.model_name);
        let capture = endpoint_config.data_capture_config.unwrap();
        assert_eq!(capture.destination_s3_uri, "s3://credit-models/monitoring");
        assert_eq!(capture.initial_sampling_percentage, 100);
        assert_eq!(capture.capture_options.len(), 2);
    }

    #[test]
    fn test_data_capture_can_be_disabled() {
        let mut cfg = config();
        cfg.data_capture = false;
        let request = build_endpoint_config_request(&cfg, "prod-config-1", "prod-model-1");
        assert!(request.data_capture_config.is_none());
    }

    #[tokio::test]
    async fn test_approval_failure_stops_before_model_creation() {
        let platform = MockPlatform::new();

        let err = promote(&config(), &platform, &ResourceNamer::new()).await.unwrap_err();

        assert!(matches!(err, PipelineError::Remote { stage: Stage::Promotion, .. }));
        assert_eq!(platform.call_count(Operation::CreateModel), 0);
    }
}
