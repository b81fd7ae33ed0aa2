//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client (malformed ids, unknown enum values).
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": msg }),
            ),
            ApiError::Domain(err) => domain_error_to_response(err),
        };
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, serde_json::Value) {
    match &err {
        DomainError::Validation { field, .. } => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "error": err.to_string(), "field": field }),
        ),
        DomainError::Authentication(_) => (
            StatusCode::UNAUTHORIZED,
            serde_json::json!({ "error": err.to_string() }),
        ),
        DomainError::Permission(_) => (
            StatusCode::FORBIDDEN,
            serde_json::json!({ "error": err.to_string() }),
        ),
        DomainError::NotFound { .. } => (
            StatusCode::NOT_FOUND,
            serde_json::json!({ "error": err.to_string() }),
        ),
        DomainError::Conflict { .. } => (
            StatusCode::CONFLICT,
            serde_json::json!({ "error": err.to_string() }),
        ),
        DomainError::Storage(_) | DomainError::Internal(_) => {
            // The detail stays in the logs; clients get a generic message.
            tracing::error!(error = %err, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": "internal server error" }),
            )
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: DomainError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn taxonomy_maps_to_status_codes() {
        assert_eq!(
            status_of(DomainError::validation("email", "bad")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DomainError::Authentication("nope".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(DomainError::Permission("staff only".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(DomainError::not_found("product")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DomainError::Conflict {
                constraint: "users_email_key"
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(DomainError::Internal("hash".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
