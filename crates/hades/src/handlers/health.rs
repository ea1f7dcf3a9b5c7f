//! Health check endpoints for the Hades API.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::db::pool::health_check as db_health_check;
use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Health status ("ok" or "unhealthy")
    pub status: String,
}

/// Detailed health check response for the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiHealthResponse {
    /// Overall health status
    pub status: String,

    /// Database connectivity status
    pub database: String,

    /// Whether confirmation mail can be sent
    pub mail: bool,

    /// Tables currently accepting registrations
    pub active_tables: Vec<String>,

    /// Server uptime in seconds
    pub uptime_seconds: u64,

    /// Server version
    pub version: String,
}

/// Root endpoint.
///
/// `GET /`
pub async fn root() -> &'static str {
    "Nothing here!"
}

/// Basic health check endpoint.
///
/// `GET /health`
///
/// Returns quickly without touching the database, so it is suitable for
/// load balancer checks.
pub async fn health_check() -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "ok".to_string(),
    })
}

/// Detailed API health check endpoint.
///
/// `GET /api/health`
///
/// # Returns
///
/// - `200 OK` if the database answers
/// - `503 Service Unavailable` otherwise
pub async fn api_health(State(state): State<AppState>) -> (StatusCode, Json<ApiHealthResponse>) {
    let db_healthy = db_health_check(&state.db).await;

    let (status_code, status, database) = if db_healthy {
        (StatusCode::OK, "ok", "connected")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "disconnected")
    };

    let response = ApiHealthResponse {
        status: status.to_string(),
        database: database.to_string(),
        mail: state.notifier.can_mail(),
        active_tables: state.config.active_tables.clone(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}
