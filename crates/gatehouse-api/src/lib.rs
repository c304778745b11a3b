//! Gatehouse HTTP API
//!
//! This crate provides the Axum router: the `/api` resources, the
//! management endpoints and, with the `docs` profile, the form login
//! pages and embedded documentation. Every route sits behind the
//! security middleware from `gatehouse-auth`.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
