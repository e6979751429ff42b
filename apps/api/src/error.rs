//! Uniform API error envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use opsdesk_core::AppError;
use serde::Serialize;

/// Error body of the failure envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable description.
    pub message: String,
    /// HTTP status, duplicated into the body for clients that lose it.
    pub status_code: u16,
}

/// Failure envelope returned by every error path.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Error details.
    pub error: ErrorBody,
}

/// HTTP API error wrapper around core application errors.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.0.status_code();
        let status = StatusCode::from_u16(status_code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let payload = Json(ErrorResponse {
            success: false,
            error: ErrorBody {
                code: self.0.code(),
                message: self.0.to_string(),
                status_code,
            },
        });

        (status, payload).into_response()
    }
}

/// Standard API result type.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;
    use opsdesk_core::AppError;

    use super::ApiError;

    #[test]
    fn status_line_matches_the_body_status_code() {
        let response =
            ApiError(AppError::RoleNotOwned("role 'pm' is not owned".to_owned())).into_response();
        assert_eq!(response.status().as_u16(), 403);
    }

    #[test]
    fn internal_errors_map_to_500() {
        let response = ApiError(AppError::Internal("boom".to_owned())).into_response();
        assert_eq!(response.status().as_u16(), 500);
    }
}
