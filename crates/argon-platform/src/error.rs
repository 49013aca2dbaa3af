//! Backend error classification.
//!
//! Raw backend error codes are folded into a small closed set of outcomes here,
//! at the client boundary, so that pipeline stages never match on vendor codes.

use crate::operation::Operation;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Semantic class of a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformErrorKind {
    /// The addressed resource does not exist.
    NotFound,
    /// The resource already exists or is in a conflicting state.
    Conflict,
    /// Throttling, server-side or network failure. Retrying later may succeed.
    Transient,
    /// Anything not otherwise classified (validation, access, protocol).
    Other,
}

impl fmt::Display for PlatformErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::Transient => "transient",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// An error returned by a [`crate::PlatformClient`] call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed [{kind}] {code}: {message}")]
pub struct PlatformError {
    /// Classified outcome.
    pub kind: PlatformErrorKind,
    /// The remote operation that failed.
    pub operation: Operation,
    /// Raw backend error code (e.g. `ValidationException`), or a local code
    /// such as `NetworkError` when the request never reached the backend.
    pub code: String,
    /// Backend-provided message.
    pub message: String,
}

impl PlatformError {
    /// Creates an error with an explicit classification.
    pub fn new(
        kind: PlatformErrorKind,
        operation: Operation,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self { kind, operation, code: code.into(), message: message.into() }
    }

    /// Creates an error by classifying a raw backend code and message.
    pub fn from_backend(
        operation: Operation,
        code: impl Into<String>,
        message: impl Into<String>,
        http_status: Option<u16>,
    ) -> Self {
        let code = code.into();
        let message = message.into();
        let kind = classify(operation, &code, &message, http_status);
        Self { kind, operation, code, message }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == PlatformErrorKind::NotFound
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.kind == PlatformErrorKind::Conflict
    }
}

/// How backend messages spell each resource, longest first so that
/// "endpoint configuration" is never read as "endpoint".
const RESOURCE_SPELLINGS: &[(&[&str], &str)] = &[
    (&["endpoint", "configuration"], "endpointconfiguration"),
    (&["endpoint", "config"], "endpointconfiguration"),
    (&["endpointconfig"], "endpointconfiguration"),
    (&["model", "package", "group"], "modelpackagegroup"),
    (&["modelpackagegroup"], "modelpackagegroup"),
    (&["model", "package"], "modelpackage"),
    (&["modelpackage"], "modelpackage"),
    (&["training", "job"], "trainingjob"),
    (&["trainingjob"], "trainingjob"),
    (&["endpoint"], "endpoint"),
    (&["model"], "model"),
];

/// Maps a raw backend error code into a [`PlatformErrorKind`].
///
/// The backend reports a missing endpoint on update as a generic
/// `ValidationException` whose message reads "Could not find endpoint ...".
/// Validation errors are only treated as `NotFound` when the message says the
/// resource addressed by `operation` is missing. "Could not find endpoint
/// configuration ..." on `UpdateEndpoint` is not a missing endpoint.
#[must_use]
pub fn classify(operation: Operation, code: &str, message: &str, http_status: Option<u16>) -> PlatformErrorKind {
    let code_lower = code.to_ascii_lowercase();
    let message_lower = message.to_ascii_lowercase();

    if code_lower.contains("resourcenotfound") || code_lower.contains("notfound") {
        return PlatformErrorKind::NotFound;
    }
    if code_lower.contains("validation")
        && missing_resource(&message_lower).is_some_and(|missing| operation.resource_noun() == Some(missing))
    {
        return PlatformErrorKind::NotFound;
    }
    if code_lower.contains("resourceinuse")
        || code_lower.contains("conflict")
        || code_lower.contains("alreadyexists")
        || message_lower.contains("already exists")
    {
        return PlatformErrorKind::Conflict;
    }
    if code_lower.contains("throttl")
        || code_lower.contains("serviceunavailable")
        || code_lower.contains("internalfailure")
        || code_lower.contains("internalerror")
    {
        return PlatformErrorKind::Transient;
    }
    match http_status {
        Some(429) => PlatformErrorKind::Transient,
        Some(status) if status >= 500 => PlatformErrorKind::Transient,
        _ => PlatformErrorKind::Other,
    }
}

/// The resource a "could not find X" or "X does not exist" message names.
fn missing_resource(message_lower: &str) -> Option<&'static str> {
    let subject = if let Some((_, rest)) = message_lower.split_once("could not find ") {
        rest
    } else {
        let (before, _) = message_lower.split_once(" does not exist")?;
        before.strip_prefix("the ").unwrap_or(before)
    };
    let words: Vec<&str> = subject.split_whitespace().collect();
    RESOURCE_SPELLINGS
        .iter()
        .find(|(spelling, _)| words.starts_with(spelling))
        .map(|(_, noun)| *noun)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_endpoint_validation_is_not_found() {
        let kind = classify(
            Operation::UpdateEndpoint,
            "ValidationException",
            "Could not find endpoint \"arn:aws:sagemaker:ap-south-1:1:endpoint/credit\".",
            Some(400),
        );
        assert_eq!(kind, PlatformErrorKind::NotFound);
    }

    #[test]
    fn test_missing_endpoint_config_on_update_is_not_not_found() {
        let kind = classify(
            Operation::UpdateEndpoint,
            "ValidationException",
            "Could not find endpoint configuration \"prod-config-x\".",
            Some(400),
        );
        assert_eq!(kind, PlatformErrorKind::Other);
    }

    #[test]
    fn test_missing_resource_must_be_the_addressed_one() {
        let message = "ModelPackageGroup credit-risk does not exist.";
        assert_eq!(
            classify(Operation::DescribeModelPackageGroup, "ValidationException", message, Some(400)),
            PlatformErrorKind::NotFound
        );
        assert_eq!(
            classify(Operation::CreateModelPackage, "ValidationException", message, Some(400)),
            PlatformErrorKind::Other
        );
        assert_eq!(
            classify(
                Operation::UpdateModelPackage,
                "ValidationException",
                "Model package arn:model-package/credit/9 does not exist.",
                Some(400)
            ),
            PlatformErrorKind::NotFound
        );
    }

    #[test]
    fn test_plain_validation_is_other() {
        let kind = classify(
            Operation::CreateEndpointConfig,
            "ValidationException",
            "Instance type ml.bogus is not supported",
            Some(400),
        );
        assert_eq!(kind, PlatformErrorKind::Other);
    }

    #[test]
    fn test_resource_not_found_code() {
        assert_eq!(classify(Operation::DescribeTrainingJob, "ResourceNotFound", "", Some(400)), PlatformErrorKind::NotFound);
    }

    #[test]
    fn test_conflict_codes() {
        assert_eq!(classify(Operation::CreateEndpoint, "ResourceInUse", "", Some(400)), PlatformErrorKind::Conflict);
        assert_eq!(
            classify(
                Operation::CreateModelPackageGroup,
                "ValidationException",
                "Model Package Group already exists: credit",
                Some(400)
            ),
            PlatformErrorKind::Conflict
        );
    }

    #[test]
    fn test_transient_by_code_and_status() {
        assert_eq!(classify(Operation::CreateModel, "ThrottlingException", "Rate exceeded", Some(400)), PlatformErrorKind::Transient);
        assert_eq!(classify(Operation::GetMetricStatistics, "Unknown", "", Some(503)), PlatformErrorKind::Transient);
        assert_eq!(classify(Operation::GetMetricStatistics, "Unknown", "", Some(429)), PlatformErrorKind::Transient);
    }

    #[test]
    fn test_error_display_carries_context() {
        let err = PlatformError::from_backend(
            Operation::UpdateEndpoint,
            "AccessDeniedException",
            "not authorized",
            Some(403),
        );
        let text = err.to_string();
        assert!(text.contains("UpdateEndpoint"));
        assert!(text.contains("AccessDeniedException"));
        assert_eq!(err.kind, PlatformErrorKind::Other);
    }
}
