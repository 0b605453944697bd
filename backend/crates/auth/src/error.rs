//! Auth Error Types
//!
//! Auth-specific error variants that integrate with the unified
//! `kernel::error::AppError` system. Store and mail-transport failures are
//! logged with their details and surface to clients only as a generic
//! internal error.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Message returned for every internal failure
const INTERNAL_MESSAGE: &str = "Internal server error";

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username already exists")]
    UserNameTaken,

    #[error("Email already exists")]
    EmailTaken,

    /// Unknown user name or wrong password; deliberately indistinguishable
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// No identity was resolved for a protected procedure
    #[error("You must be signed in to access this resource")]
    Unauthenticated,

    #[error("User not found")]
    UserNotFound,

    #[error("Email is already verified")]
    EmailAlreadyVerified,

    /// Input rejected before touching the store
    #[error("{0}")]
    Validation(AppError),

    #[error("Invalid OTP code")]
    InvalidCode,

    #[error("OTP code is invalid or has expired")]
    InvalidOrExpiredCode,

    #[error("Too many attempts. Please request a new code")]
    AttemptsExhausted,

    /// Too many requests for one client, address or account in the current window
    #[error("Too many requests. Please try again later")]
    RateLimited { retry_after_secs: u64 },

    #[error("Email delivery failed: {0}")]
    EmailDelivery(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::UserNameTaken | AuthError::EmailTaken => ErrorKind::Conflict,
            AuthError::InvalidCredentials | AuthError::Unauthenticated => ErrorKind::Unauthorized,
            AuthError::UserNotFound => ErrorKind::NotFound,
            AuthError::EmailAlreadyVerified
            | AuthError::InvalidCode
            | AuthError::InvalidOrExpiredCode => ErrorKind::BadRequest,
            AuthError::Validation(err) => err.kind(),
            AuthError::AttemptsExhausted | AuthError::RateLimited { .. } => {
                ErrorKind::TooManyRequests
            }
            AuthError::EmailDelivery(_) | AuthError::Database(_) | AuthError::Internal(_) => {
                ErrorKind::InternalServerError
            }
        }
    }

    /// Machine-readable reason carried in the error envelope
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            AuthError::InvalidCode => Some("INVALID_OTP"),
            AuthError::InvalidOrExpiredCode => Some("OTP_EXPIRED"),
            AuthError::AttemptsExhausted => Some("TOO_MANY_ATTEMPTS"),
            AuthError::RateLimited { .. } => Some("RATE_LIMITED"),
            AuthError::Validation(err) => err.reason(),
            _ => None,
        }
    }

    /// Convert to the client-facing AppError
    pub fn to_app_error(&self) -> AppError {
        let mut app = match self {
            AuthError::Validation(err) => {
                let app = AppError::new(err.kind(), err.message().to_string());
                match err.action() {
                    Some(action) => app.with_action(action.to_string()),
                    None => app,
                }
            }
            _ if self.kind().is_server_error() => AppError::internal(INTERNAL_MESSAGE),
            _ => AppError::new(self.kind(), self.to_string()),
        };
        if let Some(reason) = self.reason() {
            app = app.with_reason(reason);
        }
        app
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::EmailDelivery(msg) => {
                tracing::error!(message = %msg, "OTP email delivery failed");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::InvalidCredentials => {
                tracing::warn!("Invalid sign-in attempt");
            }
            AuthError::AttemptsExhausted => {
                tracing::warn!("OTP attempts exhausted");
            }
            AuthError::RateLimited { retry_after_secs } => {
                tracing::debug!(retry_after_secs, "Request throttled");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        let mut response = self.to_app_error().into_response();
        if let AuthError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

/// Value objects report policy violations as `AppError`
impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        if err.is_server_error() {
            AuthError::Internal(format!("{:?}", err))
        } else {
            AuthError::Validation(err)
        }
    }
}

impl From<crate::domain::value_object::user_name::UserNameError> for AuthError {
    fn from(err: crate::domain::value_object::user_name::UserNameError) -> Self {
        AuthError::Validation(err.into())
    }
}
