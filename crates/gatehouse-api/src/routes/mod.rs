//! HTTP routes

pub mod actuator;
mod api;
mod docs;
mod login;

use axum::{Json, Router, extract::DefaultBodyLimit, http::StatusCode, http::Uri, response::IntoResponse};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::state::{AppState, MetricsHandle};

/// Request bodies here are small JSON documents and login forms
const MAX_BODY_SIZE: usize = 64 * 1024;

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not found",
            "path": uri.path(),
        })),
    )
}

/// Create the main router
///
/// Every route, the fallback included, sits behind the security filter.
/// Form login and the documentation pages are only mounted when the `docs`
/// profile is active.
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let security = state.security.clone();
    let base = security.settings().management_base().to_string();

    let mut routes = Router::new()
        .merge(api::routes())
        .merge(actuator::routes(&base, metrics_handle.is_some()));

    if security.form_login_enabled() {
        let settings = security.settings();
        info!("Mounting form login and documentation pages");
        routes = routes
            .merge(login::routes(&settings.login_path, &settings.logout_path))
            .merge(docs::routes());
    }

    let mut router = routes.with_state(state);

    if let Some(handle) = metrics_handle {
        router = router.merge(actuator::metrics_routes(&base, handle));
    }

    router
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(axum::middleware::from_fn_with_state(
            security,
            gatehouse_auth::security_filter,
        ))
}
