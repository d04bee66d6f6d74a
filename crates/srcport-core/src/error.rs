//! Error taxonomy shared by the entry lifecycle, worker registry and forge layers
//!
//! Every variant maps to a retry decision for the orchestrating workflow
//! engine (see [`ServiceError::is_retryable`]) and to an HTTP problem
//! response at the RPC boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error_builder;
use crate::problemdetails::Problem;

/// Why an artifact could not be retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadFailureKind {
    /// Network error, timeout or upstream 5xx; the same request may succeed later
    Transient,
    /// The resource does not exist at the given location
    Absent,
    /// Content was retrieved but did not match the declared SHA-256 digest
    ChecksumMismatch,
}

impl std::fmt::Display for DownloadFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadFailureKind::Transient => write!(f, "transient"),
            DownloadFailureKind::Absent => write!(f, "absent"),
            DownloadFailureKind::ChecksumMismatch => write!(f, "checksum_mismatch"),
        }
    }
}

/// Common service error types
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{resource} does not exist")]
    NotFound { resource: String },

    #[error("failed to download resource {uri} ({kind}): {message}")]
    DownloadFailure {
        uri: String,
        kind: DownloadFailureKind,
        message: String,
    },

    #[error("invalid package: {0}")]
    InvalidPackage(String),

    /// The package is unsigned or not signed by a trusted key
    #[error("signature verification failed: {0}")]
    SignatureVerification(String),

    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("forge API error: {0}")]
    ForgeApiFailure(String),

    #[error("illegal state transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        ServiceError::NotFound {
            resource: resource.into(),
        }
    }

    pub fn download(
        uri: impl Into<String>,
        kind: DownloadFailureKind,
        message: impl Into<String>,
    ) -> Self {
        ServiceError::DownloadFailure {
            uri: uri.into(),
            kind,
            message: message.into(),
        }
    }

    /// Whether the orchestrator should retry the activity that produced this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::DownloadFailure { kind, .. } => *kind == DownloadFailureKind::Transient,
            ServiceError::ForgeApiFailure(_) | ServiceError::Internal(_) => true,
            ServiceError::NotFound { .. }
            | ServiceError::InvalidPackage(_)
            | ServiceError::SignatureVerification(_)
            | ServiceError::AuthFailure(_)
            | ServiceError::IllegalTransition { .. } => false,
        }
    }

    /// Stable machine-readable code, used as the problem `error_code`.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound { .. } => "NOT_FOUND",
            ServiceError::DownloadFailure { .. } => "DOWNLOAD_FAILURE",
            ServiceError::InvalidPackage(_) => "INVALID_PACKAGE",
            ServiceError::SignatureVerification(_) => "SIGNATURE_VERIFICATION",
            ServiceError::AuthFailure(_) => "AUTH_FAILURE",
            ServiceError::ForgeApiFailure(_) => "FORGE_API_FAILURE",
            ServiceError::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
            ServiceError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<sea_orm::DbErr> for ServiceError {
    fn from(error: sea_orm::DbErr) -> Self {
        ServiceError::Internal(error.to_string())
    }
}

impl From<ServiceError> for Problem {
    fn from(error: ServiceError) -> Self {
        let code = error.code();
        let builder = match &error {
            ServiceError::NotFound { .. } => error_builder::not_found(),
            ServiceError::AuthFailure(_) => return error_builder::unauthorized().build(),
            ServiceError::IllegalTransition { .. } => error_builder::conflict(),
            ServiceError::InvalidPackage(_) | ServiceError::SignatureVerification(_) => {
                error_builder::bad_request()
            }
            ServiceError::DownloadFailure { .. } | ServiceError::ForgeApiFailure(_) => {
                error_builder::upstream_failure()
            }
            // Store details never leave the process.
            ServiceError::Internal(_) => return error_builder::internal_server_error().build(),
        };
        builder.detail(error.to_string()).error_code(code).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_not_found_message() {
        let err = ServiceError::not_found("entry");
        assert_eq!(err.to_string(), "entry does not exist");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_download_failure_classification() {
        let transient = ServiceError::download("https://x/a.rpm", DownloadFailureKind::Transient, "timeout");
        let absent = ServiceError::download("memory://a.rpm", DownloadFailureKind::Absent, "no such object");
        let mismatch =
            ServiceError::download("memory://a.rpm", DownloadFailureKind::ChecksumMismatch, "sha256 differs");

        assert!(transient.to_string().contains("failed to download resource"));
        assert!(absent.to_string().contains("failed to download resource"));
        assert!(transient.is_retryable());
        assert!(!absent.is_retryable());
        assert!(!mismatch.is_retryable());
    }

    #[test]
    fn test_signature_failures_are_final() {
        let err = ServiceError::SignatureVerification("package is not signed".into());
        assert_eq!(
            err.to_string(),
            "signature verification failed: package is not signed"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_internal_problem_hides_detail() {
        let problem: Problem = ServiceError::Internal("connection refused to 10.0.0.4".into()).into();
        assert_eq!(problem.status_code, StatusCode::INTERNAL_SERVER_ERROR);
        let detail = problem.body.get("detail").and_then(|v| v.as_str()).unwrap_or_default();
        assert!(!detail.contains("10.0.0.4"));
    }

    #[test]
    fn test_auth_failure_maps_to_unauthorized() {
        let problem: Problem = ServiceError::AuthFailure("unknown worker".into()).into();
        assert_eq!(problem.status_code, StatusCode::UNAUTHORIZED);
        assert_eq!(
            problem.body.get("error_code").and_then(|v| v.as_str()),
            Some("AUTH_FAILURE")
        );
    }

    #[test]
    fn test_problem_status_mapping() {
        let problem: Problem = ServiceError::IllegalTransition {
            from: "archived".into(),
            to: "archiving".into(),
        }
        .into();
        assert_eq!(problem.status_code, StatusCode::CONFLICT);
        assert_eq!(problem.body["error_code"], "ILLEGAL_TRANSITION");

        let problem: Problem =
            ServiceError::download("memory://a.rpm", DownloadFailureKind::Absent, "missing").into();
        assert_eq!(problem.status_code, StatusCode::BAD_GATEWAY);
        assert_eq!(problem.body["error_code"], "DOWNLOAD_FAILURE");

        let problem: Problem =
            ServiceError::SignatureVerification("package is not signed".into()).into();
        assert_eq!(problem.status_code, StatusCode::BAD_REQUEST);
        assert_eq!(problem.body["error_code"], "SIGNATURE_VERIFICATION");

        let problem: Problem = ServiceError::not_found("entry").into();
        assert_eq!(problem.status_code, StatusCode::NOT_FOUND);
        assert_eq!(problem.body["detail"], "entry does not exist");
    }
}
