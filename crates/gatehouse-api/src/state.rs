//! Application state

use gatehouse_auth::{Profiles, WebSecurity};
use gatehouse_db::Database;
use std::sync::Arc;

/// Prometheus handle rendering the metrics endpoint
pub type MetricsHandle = metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub security: Arc<WebSecurity>,
    pub profiles: Profiles,
}

impl AppState {
    pub fn new(db: Database, security: Arc<WebSecurity>, profiles: Profiles) -> Self {
        Self {
            db,
            security,
            profiles,
        }
    }
}
