//! Authentication error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gatehouse_db::DbError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Bad credentials")]
    InvalidCredentials,

    #[error("Full authentication is required to access this resource")]
    MissingCredentials,

    #[error("Invalid basic authentication header")]
    InvalidAuthHeader,

    #[error("User account is disabled")]
    AccountDisabled,

    #[error("User account is locked")]
    AccountLocked,

    #[error("User account has expired")]
    AccountExpired,

    #[error("User credentials have expired")]
    CredentialsExpired,

    #[error("Access is denied")]
    InsufficientPermissions,

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Account lookup failed: {0}")]
    Database(#[from] DbError),
}

impl AuthError {
    /// Whether the error means "who are you?" rather than "not allowed" or
    /// an internal fault
    pub fn is_authentication_failure(&self) -> bool {
        !matches!(
            self,
            AuthError::InsufficientPermissions | AuthError::PasswordHash(_) | AuthError::Database(_)
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::PasswordHash(_) | AuthError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal error".to_string()
        } else {
            self.to_string()
        };

        let body = axum::Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Errors raised while assembling the security configuration at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid path pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: &'static str },

    #[error("Invalid {name} '{value}': must be an absolute local path")]
    InvalidPath { name: &'static str, value: String },

    #[error("Invalid realm for {chain}: {reason}")]
    InvalidRealm { chain: &'static str, reason: &'static str },

    #[error("Invalid session cookie name '{0}'")]
    InvalidCookieName(String),

    #[error("Session timeout must be greater than zero")]
    InvalidSessionTimeout,

    #[error("Invalid profile name '{0}'")]
    InvalidProfile(String),
}
