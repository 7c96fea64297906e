//! Mapping of service failures onto HTTP responses.
//!
//! Every error body has the same shape:
//!
//! ```json
//! { "status": "error", "code": "COMPOSITION_NOT_FOUND", "error": "Composition 4 not found" }
//! ```

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use super::logs::activity_error;
use crate::error::ServiceError;

/// Errors a handler can return.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Missing or malformed caller identity.
    #[error("{0}")]
    Unauthorized(String),

    /// Malformed request that never reached a service.
    #[error("{0}")]
    BadRequest(String),

    /// The blocking task running the operation panicked or was cancelled.
    #[error("Operation aborted: {0}")]
    Aborted(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Service(err) => match err {
                ServiceError::Validation(_) | ServiceError::EmptyQuery => StatusCode::BAD_REQUEST,
                ServiceError::CompositionNotFound(_) | ServiceError::CommentNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                ServiceError::Forbidden { .. } => StatusCode::FORBIDDEN,
                ServiceError::ReferentialIntegrity { .. }
                | ServiceError::ConsistencyViolation(_) => StatusCode::CONFLICT,
                ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Aborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Service(err) => match err {
                ServiceError::Validation(_) => "VALIDATION_ERROR",
                ServiceError::EmptyQuery => "EMPTY_QUERY",
                ServiceError::CompositionNotFound(_) => "COMPOSITION_NOT_FOUND",
                ServiceError::CommentNotFound(_) => "COMMENT_NOT_FOUND",
                ServiceError::Forbidden { .. } => "FORBIDDEN",
                ServiceError::ReferentialIntegrity { .. } => "REFERENTIAL_INTEGRITY",
                ServiceError::ConsistencyViolation(_) => "CONSISTENCY_VIOLATION",
                ServiceError::Store(_) => "STORE_ERROR",
            },
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Aborted(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Create an error body
pub fn error_response(code: &str, error: &str) -> Value {
    json!({
        "status": "error",
        "code": code,
        "error": error,
    })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            activity_error(format!("{}: {self}", self.code()), None);
        }
        (status, Json(error_response(self.code(), &self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, ValidationError};
    use crate::models::{CommentId, CompositionId, UserId};
    use rstest::rstest;

    #[rstest]
    #[case(ServiceError::Validation(ValidationError::Empty { field: "content" }), StatusCode::BAD_REQUEST)]
    #[case(ServiceError::EmptyQuery, StatusCode::BAD_REQUEST)]
    #[case(ServiceError::CompositionNotFound(CompositionId(1)), StatusCode::NOT_FOUND)]
    #[case(ServiceError::CommentNotFound(CommentId(1)), StatusCode::NOT_FOUND)]
    #[case(ServiceError::Forbidden { requester: UserId(2), comment: CommentId(1) }, StatusCode::FORBIDDEN)]
    #[case(ServiceError::ReferentialIntegrity { id: CompositionId(1), comments: 3 }, StatusCode::CONFLICT)]
    #[case(ServiceError::ConsistencyViolation(CompositionId(1)), StatusCode::CONFLICT)]
    #[case(
        ServiceError::Store(StoreError::SnapshotVersion { found: 2, expected: 1 }),
        StatusCode::INTERNAL_SERVER_ERROR
    )]
    fn test_status_mapping(#[case] err: ServiceError, #[case] expected: StatusCode) {
        assert_eq!(ApiError::from(err).status_code(), expected);
    }

    #[test]
    fn test_error_body_shape() {
        let body = error_response("EMPTY_QUERY", "Search query must not be empty");
        assert_eq!(body["status"], "error");
        assert_eq!(body["code"], "EMPTY_QUERY");
        assert_eq!(body["error"], "Search query must not be empty");
    }
}
