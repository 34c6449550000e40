use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// One invalid field in a request body, reported back by name.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Every failure a handler can surface to a client.
///
/// Login and token failures deliberately collapse to a single generic
/// message so callers cannot probe which accounts exist.
#[derive(Debug)]
pub enum ApiError {
    Validation(Vec<FieldError>),
    InvalidCredentials,
    AuthRequired,
    InvalidToken,
    Conflict(&'static str),
    NotFound(&'static str),
    RateLimited { retry_after_secs: u64 },
    Internal,
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("database error: {}", err);
        ApiError::Internal
    }
}

#[derive(Serialize)]
struct ErrorDetail {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorDetail,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, errors, retry_after) = match self {
            ApiError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                Some(errors),
                None,
            ),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Invalid email or password".to_string(),
                None,
                None,
            ),
            ApiError::AuthRequired => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
                None,
                None,
            ),
            ApiError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "Invalid or expired token".to_string(),
                None,
                None,
            ),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.to_string(), None, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.to_string(), None, None),
            ApiError::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please try again later".to_string(),
                None,
                Some(retry_after_secs),
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                None,
                None,
            ),
        };

        let body = Json(ErrorBody {
            success: false,
            error: ErrorDetail { message, errors },
        });

        match retry_after {
            Some(secs) => (status, [("Retry-After", secs.to_string())], body).into_response(),
            None => (status, body).into_response(),
        }
    }
}

/// Page numbers for list responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

/// The success half of the response envelope.
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PageMetadata>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            metadata: None,
        }
    }

    pub fn with_metadata(data: T, metadata: PageMetadata) -> Self {
        Self {
            success: true,
            data,
            metadata: Some(metadata),
        }
    }
}
