use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Field-level detail attached to an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

/// Success envelope: `{message, success, status, data}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub message: String,
    pub success: bool,
    pub status: u16,
    pub data: T,
}

/// Failure envelope: `{message, status, success, data, errors}`.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub message: String,
    pub status: u16,
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub errors: Vec<ErrorDetail>,
}

pub fn api_response<T: Serialize>(
    status: StatusCode,
    message: impl Into<String>,
    data: T,
) -> (StatusCode, Json<ApiResponse<T>>) {
    (
        status,
        Json(ApiResponse {
            message: message.into(),
            success: true,
            status: status.as_u16(),
            data,
        }),
    )
}
