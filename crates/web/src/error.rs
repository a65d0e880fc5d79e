//! Unified error handling with Sentry integration.
//!
//! API handlers return `Result<T, AppError>`. Every error becomes a JSON
//! `{"message": ...}` body; server-side failures are captured to Sentry
//! first and their details never reach the client.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use prelaunch_core::PreRegisterResponse;
use thiserror::Error;

use crate::services::RegistrationError;

pub const INVALID_EMAIL_MESSAGE: &str = "Please enter a valid email address.";
pub const DUPLICATE_MESSAGE: &str = "This email is already registered.";
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests. Please try again later.";
pub const PERMISSION_MESSAGE: &str = "Permission error: check the service role key.";
pub const INTERNAL_MESSAGE: &str = "Something went wrong on our side. Please try again later.";

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Registration flow failed.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Request body could not be parsed.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Client exceeded a rate limit.
    #[error("Rate limited")]
    RateLimited {
        /// Seconds until a request would be admitted.
        retry_after: Option<u64>,
    },

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Registration(err) => match err {
                RegistrationError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                RegistrationError::AlreadyRegistered => StatusCode::CONFLICT,
                RegistrationError::PermissionDenied(_) => StatusCode::FORBIDDEN,
                RegistrationError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Never includes store details.
    #[must_use]
    pub const fn client_message(&self) -> &'static str {
        match self {
            Self::Registration(err) => match err {
                RegistrationError::InvalidEmail(_) => INVALID_EMAIL_MESSAGE,
                RegistrationError::AlreadyRegistered => DUPLICATE_MESSAGE,
                RegistrationError::PermissionDenied(_) => PERMISSION_MESSAGE,
                RegistrationError::Store(_) => INTERNAL_MESSAGE,
            },
            Self::BadRequest(_) => INVALID_EMAIL_MESSAGE,
            Self::RateLimited { .. } => RATE_LIMITED_MESSAGE,
            Self::Internal(_) => INTERNAL_MESSAGE,
        }
    }

    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Internal(_)
                | Self::Registration(
                    RegistrationError::Store(_) | RegistrationError::PermissionDenied(_)
                )
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let retry_after = match &self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        };

        let mut response = (
            self.status(),
            Json(PreRegisterResponse::message(self.client_message())),
        )
            .into_response();

        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
