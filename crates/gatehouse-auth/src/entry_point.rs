//! Responses that start authentication or deny access

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::AuthError;

/// Challenges with `401` and `WWW-Authenticate: Basic realm="..."`
#[derive(Debug, Clone)]
pub struct BasicAuthenticationEntryPoint {
    realm: String,
    challenge: HeaderValue,
}

impl BasicAuthenticationEntryPoint {
    /// Realm names are validated by the chain builder; a realm that cannot
    /// be a header value falls back to an empty realm.
    pub fn new(realm: impl Into<String>) -> Self {
        let realm = realm.into();
        let challenge = HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm))
            .unwrap_or_else(|_| HeaderValue::from_static("Basic realm=\"\""));
        Self { realm, challenge }
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn commence(&self, path: &str, error: &AuthError) -> Response {
        let body = axum::Json(json!({
            "error": error.to_string(),
            "path": path,
        }));

        let mut response = (StatusCode::UNAUTHORIZED, body).into_response();
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, self.challenge.clone());
        response
    }
}

/// Redirects to the login form
#[derive(Debug, Clone)]
pub struct LoginUrlAuthenticationEntryPoint {
    login_path: String,
}

impl LoginUrlAuthenticationEntryPoint {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
        }
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn commence(&self) -> Response {
        redirect(&self.login_path)
    }
}

/// `302 Found` to `location`
pub fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// `403` for authenticated principals lacking the required role
pub fn access_denied(path: &str) -> Response {
    let body = axum::Json(json!({
        "error": AuthError::InsufficientPermissions.to_string(),
        "path": path,
    }));
    (StatusCode::FORBIDDEN, body).into_response()
}
