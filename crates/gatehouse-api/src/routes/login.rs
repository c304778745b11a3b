//! Form login
//!
//! Only mounted with the `docs` profile. The login page and the logout
//! endpoint are open; posting the form authenticates through the same
//! provider the Basic chains use and establishes a session.

use axum::{
    Form, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use gatehouse_auth::entry_point::redirect;
use gatehouse_auth::session::session_cookie;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::state::AppState;

/// Maximum accepted username length
const MAX_USERNAME_LENGTH: usize = 64;
/// Maximum accepted password length
const MAX_PASSWORD_LENGTH: usize = 256;

/// Flags shown on the login page (`?error`, `?logout`)
#[derive(Deserialize, Default)]
pub struct LoginPageParams {
    pub error: Option<String>,
    pub logout: Option<String>,
}

/// Submitted login form
#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

fn login_page(action: &str, params: &LoginPageParams) -> String {
    let notice = if params.error.is_some() {
        r#"<div class="alert error">Invalid username or password.</div>"#
    } else if params.logout.is_some() {
        r#"<div class="alert">You have been signed out.</div>"#
    } else {
        ""
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Please sign in</title>
</head>
<body>
  <form class="signin" method="post" action="{action}">
    <h2>Please sign in</h2>
    {notice}
    <p><label for="username">Username</label>
       <input type="text" id="username" name="username" autocomplete="username" required autofocus></p>
    <p><label for="password">Password</label>
       <input type="password" id="password" name="password" autocomplete="current-password" required></p>
    <button type="submit">Sign in</button>
  </form>
</body>
</html>
"#
    )
}

/// GET /login
async fn show_login(
    State(state): State<AppState>,
    Query(params): Query<LoginPageParams>,
) -> Html<String> {
    Html(login_page(&state.security.settings().login_path, &params))
}

/// POST /login
async fn process_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    let settings = state.security.settings();
    let failure = format!("{}?error", settings.login_path);

    if form.username.is_empty()
        || form.username.len() > MAX_USERNAME_LENGTH
        || form.password.len() > MAX_PASSWORD_LENGTH
    {
        return redirect(&failure);
    }

    let user = match state
        .security
        .provider()
        .authenticate(&form.username, &form.password)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            if e.is_authentication_failure() {
                debug!("Form login failed for '{}': {}", form.username, e);
            } else {
                warn!("Authentication provider error during form login: {}", e);
            }
            metrics::counter!("gatehouse_auth_failure_total", "chain" => "form-login").increment(1);
            return redirect(&failure);
        }
    };

    let sessions = state.security.sessions();
    let previous = session_cookie(&headers, sessions.cookie_name());
    let session = sessions.authenticate(previous.as_deref(), user);
    let target = sessions
        .take_saved_request(&session.id)
        .unwrap_or_else(|| settings.default_success_path.clone());

    info!("User {} signed in", form.username);
    metrics::counter!("gatehouse_auth_success_total", "chain" => "form-login").increment(1);

    let cookie = match sessions.session_cookie_header(&session.id) {
        Ok(cookie) => cookie,
        Err(e) => {
            error!("Cannot encode session cookie: {}", e);
            sessions.invalidate(&session.id);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut response = redirect(&target);
    response.headers_mut().append(SET_COOKIE, cookie);
    response
}

/// GET|POST /logout
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let sessions = state.security.sessions();
    if let Some(id) = session_cookie(&headers, sessions.cookie_name())
        && let Some(session) = sessions.invalidate(&id)
        && let Some(user) = session.user
    {
        info!("User {} signed out", user.username);
    }

    let settings = state.security.settings();
    let mut response = redirect(&format!("{}?logout", settings.login_path));
    match sessions.clear_cookie_header() {
        Ok(cookie) => {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
        Err(e) => warn!("Cannot encode session cookie: {}", e),
    }
    response
}

/// Create form login routes
pub fn routes(login_path: &str, logout_path: &str) -> Router<AppState> {
    Router::new()
        .route(login_path, get(show_login).post(process_login))
        .route(logout_path, get(logout).post(logout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_page_notices() {
        let page = login_page("/login", &LoginPageParams::default());
        assert!(page.contains(r#"action="/login""#));
        assert!(!page.contains("Invalid username"));

        let page = login_page(
            "/login",
            &LoginPageParams {
                error: Some(String::new()),
                logout: None,
            },
        );
        assert!(page.contains("Invalid username or password."));

        let page = login_page(
            "/login",
            &LoginPageParams {
                error: None,
                logout: Some(String::new()),
            },
        );
        assert!(page.contains("signed out"));
    }
}
