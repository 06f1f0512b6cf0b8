//! Health check endpoint
//!
//! Public, so a reverse proxy can probe it without credentials. Reports
//! whether the snail database still answers.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub database: &'static str,
}

/// GET /health
///
/// 200 with `status: "ok"`, or 503 with `status: "degraded"` when the
/// database query fails.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database_ok = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "Health check: database unreachable");
            false
        }
    };

    let (code, status, database) = if database_ok {
        (StatusCode::OK, "ok", "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unreachable")
    };

    (
        code,
        Json(HealthResponse {
            status,
            module: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            database,
        }),
    )
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
