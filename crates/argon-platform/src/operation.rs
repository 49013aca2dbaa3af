use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote operations exposed by the execution platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    CreateTrainingJob,
    DescribeTrainingJob,
    CreateModel,
    CreateEndpointConfig,
    CreateEndpoint,
    UpdateEndpoint,
    DescribeModelPackageGroup,
    CreateModelPackageGroup,
    CreateModelPackage,
    UpdateModelPackage,
    GetMetricStatistics,
}

/// The backend service that owns an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Training jobs, models, endpoints and the model registry.
    Execution,
    /// Metric statistics.
    Metrics,
}

impl Operation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateTrainingJob => "CreateTrainingJob",
            Self::DescribeTrainingJob => "DescribeTrainingJob",
            Self::CreateModel => "CreateModel",
            Self::CreateEndpointConfig => "CreateEndpointConfig",
            Self::CreateEndpoint => "CreateEndpoint",
            Self::UpdateEndpoint => "UpdateEndpoint",
            Self::DescribeModelPackageGroup => "DescribeModelPackageGroup",
            Self::CreateModelPackageGroup => "CreateModelPackageGroup",
            Self::CreateModelPackage => "CreateModelPackage",
            Self::UpdateModelPackage => "UpdateModelPackage",
            Self::GetMetricStatistics => "GetMetricStatistics",
        }
    }

    #[must_use]
    pub const fn service(self) -> Service {
        match self {
            Self::GetMetricStatistics => Service::Metrics,
            _ => Service::Execution,
        }
    }

    /// Noun the backend uses in messages about the resource this operation
    /// addresses, lowercased with spaces removed.
    #[must_use]
    pub const fn resource_noun(self) -> Option<&'static str> {
        match self {
            Self::CreateTrainingJob | Self::DescribeTrainingJob => Some("trainingjob"),
            Self::CreateModel => Some("model"),
            Self::CreateEndpointConfig => Some("endpointconfiguration"),
            Self::CreateEndpoint | Self::UpdateEndpoint => Some("endpoint"),
            Self::DescribeModelPackageGroup | Self::CreateModelPackageGroup => Some("modelpackagegroup"),
            Self::CreateModelPackage | Self::UpdateModelPackage => Some("modelpackage"),
            Self::GetMetricStatistics => None,
        }
    }

    /// Value for the `X-Amz-Target` header of the JSON target protocol.
    #[must_use]
    pub fn target(self) -> String {
        let prefix = match self.service() {
            Service::Execution => "SageMaker",
            Service::Metrics => "GraniteServiceVersion20100801",
        };
        format!("{prefix}.{}", self.as_str())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets() {
        assert_eq!(Operation::UpdateEndpoint.target(), "SageMaker.UpdateEndpoint");
        assert_eq!(
            Operation::GetMetricStatistics.target(),
            "GraniteServiceVersion20100801.GetMetricStatistics"
        );
    }

    #[test]
    fn test_resource_nouns() {
        assert_eq!(Operation::UpdateEndpoint.resource_noun(), Some("endpoint"));
        assert_eq!(Operation::CreateEndpointConfig.resource_noun(), Some("endpointconfiguration"));
        assert_eq!(Operation::GetMetricStatistics.resource_noun(), None);
    }
}
