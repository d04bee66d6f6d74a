//! Canned problem responses
//!
//! Each builder fixes the status, problem type and title; callers only add
//! a detail line or override the code. Every problem carries an
//! `error_code` and a `timestamp`.

use crate::problemdetails::{self, Problem};
use axum::http::StatusCode;

const PROBLEM_TYPE_BASE: &str = "https://srcport.dev/probs";

pub struct ErrorBuilder {
    status: StatusCode,
    slug: &'static str,
    title: &'static str,
    error_code: &'static str,
    detail: Option<String>,
}

impl ErrorBuilder {
    pub fn new(
        status: StatusCode,
        slug: &'static str,
        title: &'static str,
        error_code: &'static str,
    ) -> Self {
        Self {
            status,
            slug,
            title,
            error_code,
            detail: None,
        }
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Override the default `error_code` of the builder.
    pub fn error_code(mut self, code: &'static str) -> Self {
        self.error_code = code;
        self
    }

    pub fn build(self) -> Problem {
        let mut problem = problemdetails::new(self.status)
            .with_type(format!("{}/{}", PROBLEM_TYPE_BASE, self.slug))
            .with_title(self.title)
            .with_value("error_code", self.error_code)
            .with_value("timestamp", chrono::Utc::now().to_rfc3339());

        if let Some(detail) = self.detail {
            problem = problem.with_detail(detail);
        }
        problem
    }
}

pub fn internal_server_error() -> ErrorBuilder {
    ErrorBuilder::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal-server-error",
        "Internal Server Error",
        "INTERNAL",
    )
    .detail("An unexpected error occurred while processing your request")
}

pub fn not_found() -> ErrorBuilder {
    ErrorBuilder::new(
        StatusCode::NOT_FOUND,
        "not-found",
        "Resource Not Found",
        "NOT_FOUND",
    )
}

pub fn unauthorized() -> ErrorBuilder {
    ErrorBuilder::new(
        StatusCode::UNAUTHORIZED,
        "unauthorized",
        "Unauthorized",
        "AUTH_FAILURE",
    )
    .detail("Valid worker credentials are required")
}

pub fn bad_request() -> ErrorBuilder {
    ErrorBuilder::new(
        StatusCode::BAD_REQUEST,
        "bad-request",
        "Bad Request",
        "BAD_REQUEST",
    )
}

pub fn conflict() -> ErrorBuilder {
    ErrorBuilder::new(StatusCode::CONFLICT, "conflict", "Conflict", "CONFLICT")
}

/// A dependency outside this process (artifact host, forge API) failed
pub fn upstream_failure() -> ErrorBuilder {
    ErrorBuilder::new(
        StatusCode::BAD_GATEWAY,
        "upstream-failure",
        "Upstream Failure",
        "UPSTREAM_FAILURE",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_members() {
        let problem = conflict()
            .detail("entry is archived")
            .error_code("ILLEGAL_TRANSITION")
            .build();

        assert_eq!(problem.status_code, StatusCode::CONFLICT);
        assert_eq!(problem.body["type"], "https://srcport.dev/probs/conflict");
        assert_eq!(problem.body["error_code"], "ILLEGAL_TRANSITION");
        assert_eq!(problem.body["detail"], "entry is archived");
        assert!(problem.body.contains_key("timestamp"));
    }

    #[test]
    fn test_detail_is_optional() {
        let problem = not_found().build();
        assert!(!problem.body.contains_key("detail"));
    }
}
