//! Security middleware for Axum
//!
//! `security_filter` picks the first chain claiming the request path,
//! authenticates the caller the way that chain prescribes and either lets
//! the request through with an [`AuthUser`] in its extensions, or answers
//! with the chain's challenge or a 403.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use gatehouse_db::{Account, Role};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::basic::BasicCredentials;
use crate::chain::{Access, AuthenticationMechanism, Decision, SecurityFilterChain, WebSecurity};
use crate::entry_point::{
    BasicAuthenticationEntryPoint, LoginUrlAuthenticationEntryPoint, access_denied,
};
use crate::error::AuthError;
use crate::session::session_cookie;

/// Authenticated principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub roles: Vec<Role>,
}

impl AuthUser {
    pub fn from_account(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            roles: account.roles.clone(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingCredentials)
    }
}

/// Reject `.`/`..` segments and encoded separators before any matching
fn is_normalized(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    if lower.contains("%2f") || lower.contains("%5c") || lower.contains("%2e") || path.contains('\\') {
        return false;
    }
    !path.split('/').any(|segment| segment == "." || segment == "..")
}

/// Security middleware
pub async fn security_filter(
    State(security): State<Arc<WebSecurity>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if !is_normalized(&path) {
        warn!("Rejected non-normalized request path: {}", path);
        return StatusCode::BAD_REQUEST.into_response();
    }

    let Some(chain) = security.chain_for(&path) else {
        return next.run(request).await;
    };

    let access = chain.access_for(&path);

    let mut response = match chain.mechanism() {
        AuthenticationMechanism::HttpBasic(entry_point) => {
            basic_filter(&security, chain, entry_point, access, &path, request, next).await
        }
        AuthenticationMechanism::FormLogin(entry_point) => {
            form_login_filter(&security, chain, entry_point, access, &path, request, next).await
        }
    };

    if chain.is_stateless() {
        strip_session_cookies(&mut response, security.sessions().cookie_name());
    }

    response
}

async fn basic_filter(
    security: &WebSecurity,
    chain: &SecurityFilterChain,
    entry_point: &BasicAuthenticationEntryPoint,
    access: Access,
    path: &str,
    mut request: Request,
    next: Next,
) -> Response {
    if access == Access::PermitAll {
        return next.run(request).await;
    }

    let credentials = match BasicCredentials::from_headers(request.headers()) {
        Ok(credentials) => credentials,
        Err(e) => {
            debug!("Malformed Basic credentials on {}", path);
            record_failure(chain);
            return entry_point.commence(path, &e);
        }
    };

    let user = match credentials {
        Some(credentials) => {
            match security
                .provider()
                .authenticate(&credentials.username, &credentials.password)
                .await
            {
                Ok(user) => {
                    metrics::counter!("gatehouse_auth_success_total", "chain" => chain.name().to_string())
                        .increment(1);
                    Some(user)
                }
                Err(e) if e.is_authentication_failure() => {
                    debug!(
                        "Basic authentication failed for '{}' on {}: {}",
                        credentials.username, path, e
                    );
                    record_failure(chain);
                    return entry_point.commence(path, &e);
                }
                Err(e) => {
                    warn!("Authentication provider error: {}", e);
                    return e.into_response();
                }
            }
        }
        None => None,
    };

    match access.decide(user.as_ref()) {
        Decision::Granted => {
            if let Some(user) = user {
                debug!("Authenticated user: {} ({})", user.username, chain.name());
                request.extensions_mut().insert(user);
            }
            next.run(request).await
        }
        Decision::Unauthenticated => {
            record_failure(chain);
            entry_point.commence(path, &AuthError::MissingCredentials)
        }
        Decision::Denied => {
            record_denied(chain, user.as_ref());
            access_denied(path)
        }
    }
}

async fn form_login_filter(
    security: &WebSecurity,
    chain: &SecurityFilterChain,
    entry_point: &LoginUrlAuthenticationEntryPoint,
    access: Access,
    path: &str,
    mut request: Request,
    next: Next,
) -> Response {
    let sessions = security.sessions();
    let session_id = session_cookie(request.headers(), sessions.cookie_name());
    let user = session_id
        .as_deref()
        .and_then(|id| sessions.get(id))
        .and_then(|session| session.user);

    match access.decide(user.as_ref()) {
        Decision::Granted => {
            if let Some(user) = user {
                request.extensions_mut().insert(user);
            }
            next.run(request).await
        }
        Decision::Unauthenticated => {
            let mut response = entry_point.commence();

            // Only navigations are worth returning to after login
            if request.method() == axum::http::Method::GET {
                let target = request
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| path.to_string());
                if let Some(session) = sessions.save_request(session_id.as_deref(), &target)
                    && session_id.as_deref() != Some(session.id.as_str())
                {
                    match sessions.session_cookie_header(&session.id) {
                        Ok(cookie) => {
                            response.headers_mut().append(SET_COOKIE, cookie);
                        }
                        Err(e) => warn!("Cannot encode session cookie: {}", e),
                    }
                }
            }

            debug!("Redirecting unauthenticated request for {} to login", path);
            response
        }
        Decision::Denied => {
            record_denied(chain, user.as_ref());
            access_denied(path)
        }
    }
}

/// Remove `Set-Cookie` headers carrying the session cookie
fn strip_session_cookies(response: &mut Response, cookie_name: &str) {
    let headers = response.headers_mut();
    if !headers.contains_key(SET_COOKIE) {
        return;
    }

    let prefix = format!("{}=", cookie_name);
    let kept: Vec<_> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter(|value| {
            !value
                .to_str()
                .map(|v| v.trim_start().starts_with(&prefix))
                .unwrap_or(false)
        })
        .cloned()
        .collect();

    headers.remove(SET_COOKIE);
    for value in kept {
        headers.append(SET_COOKIE, value);
    }
}

fn record_failure(chain: &SecurityFilterChain) {
    metrics::counter!("gatehouse_auth_failure_total", "chain" => chain.name().to_string())
        .increment(1);
}

fn record_denied(chain: &SecurityFilterChain, user: Option<&AuthUser>) {
    if let Some(user) = user {
        debug!("Access denied for user '{}' by chain '{}'", user.username, chain.name());
    }
    metrics::counter!("gatehouse_access_denied_total", "chain" => chain.name().to_string())
        .increment(1);
}
