//! API error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] gatehouse_db::DbError),

    #[error("Auth error: {0}")]
    Auth(#[from] gatehouse_auth::AuthError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
            }
            ApiError::Database(e) => match e {
                gatehouse_db::DbError::Duplicate(msg) => (StatusCode::CONFLICT, msg),
                other => {
                    tracing::error!("Database error: {}", other);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
                }
            },
            ApiError::Auth(e) => return e.into_response(),
        };

        let body = axum::Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_db::DbError;

    #[test]
    fn test_database_errors_map_to_status() {
        let response = ApiError::from(DbError::Duplicate("Account 'user' already exists".into()))
            .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = ApiError::from(DbError::Connection(sqlx::Error::RowNotFound)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_auth_errors_keep_their_status() {
        let response = ApiError::from(gatehouse_auth::AuthError::InsufficientPermissions)
            .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = ApiError::NotFound("Greeting 7 not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
