//! Shared helpers for the router tests

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Request, Response, header},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use gatehouse_api::{AppState, create_router};
use gatehouse_auth::{InMemoryAuthenticationProvider, Profiles, SecuritySettings, WebSecurity};
use gatehouse_db::{Database, Role};
use http_body_util::BodyExt;
use std::sync::Arc;

pub const USER: (&str, &str) = ("user", "password");
pub const SYSADMIN: (&str, &str) = ("operations", "operations");
pub const BOTH: (&str, &str) = ("root", "root-secret");

/// Security configuration with the test users and the given profiles
pub fn create_test_security(profiles: &[&str]) -> (Arc<WebSecurity>, Profiles) {
    let provider = InMemoryAuthenticationProvider::default()
        .with_user(USER.0, USER.1, &[Role::User])
        .and_then(|p| p.with_user(SYSADMIN.0, SYSADMIN.1, &[Role::Sysadmin]))
        .and_then(|p| p.with_user(BOTH.0, BOTH.1, &[Role::User, Role::Sysadmin]))
        .expect("Failed to register test users");

    let profiles = Profiles::new(profiles.iter().copied()).expect("Invalid test profiles");
    let security = WebSecurity::from_settings(
        SecuritySettings::default(),
        &profiles,
        Arc::new(provider),
    )
    .expect("Failed to build security configuration");

    (Arc::new(security), profiles)
}

/// Build the full router with the given active profiles
pub async fn create_test_app(profiles: &[&str]) -> Router {
    let db = Database::in_memory()
        .await
        .expect("Failed to create test database");
    let (security, profiles) = create_test_security(profiles);

    create_router(AppState::new(db, security, profiles), None)
}

pub fn basic(credentials: (&str, &str)) -> HeaderValue {
    let encoded = STANDARD.encode(format!("{}:{}", credentials.0, credentials.1));
    HeaderValue::from_str(&format!("Basic {}", encoded)).unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn get_as(uri: &str, credentials: (&str, &str)) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, basic(credentials))
        .body(Body::empty())
        .unwrap()
}

pub fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

/// `name=value` part of the first `Set-Cookie` header, if any
pub fn set_cookie<B>(response: &Response<B>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_string())
}

pub fn location<B>(response: &Response<B>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

pub fn challenge<B>(response: &Response<B>) -> Option<&str> {
    response
        .headers()
        .get(header::WWW_AUTHENTICATE)
        .and_then(|v| v.to_str().ok())
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn text_body(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
