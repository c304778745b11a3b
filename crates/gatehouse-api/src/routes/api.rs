//! `/api` resources
//!
//! Everything here is reached only through the API chain, so handlers can
//! rely on an [`AuthUser`] holding role `USER`.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use gatehouse_auth::AuthUser;
use gatehouse_db::Greeting;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Maximum greeting length
const MAX_GREETING_LENGTH: usize = 512;

/// Current principal
#[derive(Serialize)]
pub struct PrincipalResponse {
    pub id: i64,
    pub username: String,
    pub roles: Vec<String>,
}

/// Create or update a greeting
#[derive(Deserialize)]
pub struct GreetingRequest {
    pub text: String,
}

fn validate_greeting(text: &str) -> Result<&str, ApiError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("Greeting text cannot be empty".to_string()));
    }
    if text.len() > MAX_GREETING_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Greeting exceeds maximum length of {} characters",
            MAX_GREETING_LENGTH
        )));
    }
    Ok(text)
}

/// GET /api/me
async fn me(user: AuthUser) -> Json<PrincipalResponse> {
    Json(PrincipalResponse {
        id: user.id,
        username: user.username,
        roles: user.roles.iter().map(|r| r.as_str().to_string()).collect(),
    })
}

/// GET /api/greetings
async fn list_greetings(State(state): State<AppState>) -> Result<Json<Vec<Greeting>>, ApiError> {
    Ok(Json(state.db.list_greetings().await?))
}

/// GET /api/greetings/{id}
async fn get_greeting(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Greeting>, ApiError> {
    state
        .db
        .get_greeting(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Greeting {} not found", id)))
}

/// POST /api/greetings
async fn create_greeting(
    user: AuthUser,
    State(state): State<AppState>,
    Json(request): Json<GreetingRequest>,
) -> Result<(StatusCode, Json<Greeting>), ApiError> {
    let text = validate_greeting(&request.text)?;
    let greeting = state.db.insert_greeting(text).await?;
    info!("Greeting {} created by {}", greeting.id, user.username);
    Ok((StatusCode::CREATED, Json(greeting)))
}

/// PUT /api/greetings/{id}
async fn update_greeting(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<GreetingRequest>,
) -> Result<Json<Greeting>, ApiError> {
    let text = validate_greeting(&request.text)?;
    state
        .db
        .update_greeting(id, text)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Greeting {} not found", id)))
}

/// DELETE /api/greetings/{id}
async fn delete_greeting(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !state.db.delete_greeting(id).await? {
        return Err(ApiError::NotFound(format!("Greeting {} not found", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Create API routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/me", get(me))
        .route("/api/greetings", get(list_greetings).post(create_greeting))
        .route(
            "/api/greetings/{id}",
            get(get_greeting).put(update_greeting).delete(delete_greeting),
        )
}
