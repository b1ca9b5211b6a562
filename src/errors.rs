use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::response::{ApiErrorBody, ErrorDetail};

/// Every failure the auth surface can report.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation failed")]
    Validation(Vec<ErrorDetail>),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Weak password")]
    WeakPassword(Vec<ErrorDetail>),

    #[error("User already exists with this email")]
    DuplicateEmail,

    #[error("Username is already taken")]
    DuplicateUsername,

    #[error("User not found")]
    UserNotFound,

    #[error("Not found")]
    NotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not authenticated")]
    Unauthenticated,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("New password is same as old password")]
    SamePassword,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AuthError::Validation(vec![ErrorDetail::field(field, message)])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_)
            | AuthError::PasswordMismatch
            | AuthError::WeakPassword(_)
            | AuthError::DuplicateEmail
            | AuthError::DuplicateUsername
            | AuthError::UserNotFound
            | AuthError::InvalidCredentials
            | AuthError::SamePassword => StatusCode::BAD_REQUEST,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::Unauthenticated | AuthError::TokenInvalid | AuthError::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Vec<ErrorDetail> {
        match self {
            AuthError::Validation(d) | AuthError::WeakPassword(d) => d.clone(),
            AuthError::PasswordMismatch => vec![ErrorDetail::field(
                "confirmPassword",
                "Password and Confirm Password do not match",
            )],
            AuthError::DuplicateEmail => {
                vec![ErrorDetail::field("email", "Email is already registered")]
            }
            AuthError::DuplicateUsername => {
                vec![ErrorDetail::field("username", "Username is already taken")]
            }
            AuthError::UserNotFound => {
                vec![ErrorDetail::field("email", "User not registered with this email")]
            }
            AuthError::InvalidCredentials => vec![ErrorDetail::new("Invalid email or password")],
            AuthError::Unauthenticated => {
                vec![ErrorDetail::new("Access token or refresh token is missing")]
            }
            AuthError::SamePassword => vec![ErrorDetail::field(
                "newPassword",
                "New password is same as old password",
            )],
            _ => Vec::new(),
        }
    }
}

impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        AuthError::Validation(vec![ErrorDetail::new(rejection.body_text())])
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AuthError::Internal(e) => {
                error!(error = ?e, "internal error");
                "Internal Server Error".to_string()
            }
            AuthError::ServiceUnavailable(what) => {
                error!(backend = %what, "backing store unavailable");
                "Service unavailable".to_string()
            }
            other => other.to_string(),
        };
        let body = ApiErrorBody {
            message,
            status: status.as_u16(),
            success: false,
            data: None,
            errors: self.details(),
        };
        (status, Json(body)).into_response()
    }
}
