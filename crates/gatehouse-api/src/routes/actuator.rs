//! Management endpoints
//!
//! Mounted below the configured management base path (`/actuator` by
//! default). `health` is public; the rest require role `SYSADMIN`.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use crate::error::ApiError;
use crate::state::{AppState, MetricsHandle};

const STATUS_UP: &str = "UP";
const STATUS_DOWN: &str = "DOWN";

/// Status of one health component
#[derive(Serialize, Clone)]
pub struct ComponentHealth {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health status response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    pub components: BTreeMap<&'static str, ComponentHealth>,
}

async fn db_health(state: &AppState) -> ComponentHealth {
    match state.db.ping().await {
        Ok(()) => ComponentHealth {
            status: STATUS_UP,
            error: None,
        },
        Err(e) => {
            warn!("Database health check failed: {}", e);
            ComponentHealth {
                status: STATUS_DOWN,
                error: Some(e.to_string()),
            }
        }
    }
}

fn status_code(status: &str) -> StatusCode {
    if status == STATUS_UP {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Health check handler
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    metrics::counter!("gatehouse_health_checks_total").increment(1);

    let mut components = BTreeMap::new();
    components.insert("db", db_health(&state).await);

    let status = if components.values().all(|c| c.status == STATUS_UP) {
        STATUS_UP
    } else {
        STATUS_DOWN
    };

    (
        status_code(status),
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            components,
        }),
    )
}

/// Health of a single component
async fn component_health(
    State(state): State<AppState>,
    Path(component): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let health = match component.as_str() {
        "db" => db_health(&state).await,
        _ => {
            return Err(ApiError::NotFound(format!(
                "Unknown health component '{}'",
                component
            )));
        }
    };
    Ok((status_code(health.status), Json(health)))
}

/// Application info handler
async fn info(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "app": {
            "name": "gatehouse",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "profiles": state.profiles.iter().collect::<Vec<_>>(),
    }))
}

/// Links to every mounted endpoint
fn links(base: &str, with_metrics: bool) -> Value {
    let mut links = serde_json::Map::new();
    let mut add = |name: &str, href: String| {
        links.insert(name.to_string(), json!({ "href": href }));
    };
    add("self", base.to_string());
    add("health", format!("{}/health", base));
    add("health-path", format!("{}/health/{{component}}", base));
    add("info", format!("{}/info", base));
    if with_metrics {
        add("metrics", format!("{}/metrics", base));
    }
    json!({ "_links": links })
}

/// Create management routes below `base`
pub fn routes(base: &str, with_metrics: bool) -> Router<AppState> {
    let index = links(base, with_metrics);

    Router::new()
        .route(base, get(move || async move { Json(index) }))
        .route(&format!("{}/health", base), get(health))
        .route(&format!("{}/health/{{component}}", base), get(component_health))
        .route(&format!("{}/info", base), get(info))
}

/// GET {base}/metrics - Prometheus metrics endpoint
async fn get_metrics(State(handle): State<Arc<MetricsHandle>>) -> impl IntoResponse {
    handle.render()
}

/// Create metrics routes with the Prometheus handle
pub fn metrics_routes(base: &str, handle: Arc<MetricsHandle>) -> Router {
    Router::new()
        .route(&format!("{}/metrics", base), get(get_metrics))
        .with_state(handle)
}
