/// Health check and welcome endpoints
///
/// # Endpoints
///
/// ```text
/// GET /health
/// GET /
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected"
/// }
/// ```

use crate::{app::AppState, middleware::auth::MaybeUser};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Database status
    pub database: String,
}

/// Welcome response
#[derive(Debug, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub message: String,
    pub version: String,

    /// Present when the caller sent a valid access token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Health check handler
///
/// Answers 503 with `"status": "degraded"` when the store is unreachable.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, database) = match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "connected"),
        Err(e) => {
            tracing::error!("Database health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "disconnected")
        }
    };

    let body = HealthResponse {
        status: if status == StatusCode::OK { "healthy" } else { "degraded" }.to_string(),
        version: toadoo_shared::VERSION.to_string(),
        database: database.to_string(),
    };

    (status, Json(body))
}

/// Welcome handler; greets signed-in callers by name
pub async fn root(Extension(MaybeUser(user)): Extension<MaybeUser>) -> Json<WelcomeResponse> {
    let message = match &user {
        Some(user) => format!("Welcome to Toadoo, {}!", user.username),
        None => "Welcome to Toadoo!".to_string(),
    };

    Json(WelcomeResponse {
        message,
        version: toadoo_shared::VERSION.to_string(),
        username: user.map(|u| u.username),
    })
}
