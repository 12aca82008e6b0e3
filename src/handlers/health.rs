use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::warn;

use crate::state::AppState;

const CACHE_CONTROL_NO_CACHE: &str = "no-cache, no-store, must-revalidate";

pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Welcome to Book Collection API" }))
}

/// Liveness; `database` carries the result of a ping.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.db.ping().await {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            warn!("Database health check failed: {}", e);
            "error".to_string()
        }
    };

    (
        [(
            header::CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_NO_CACHE),
        )],
        Json(json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "database": database,
        })),
    )
}
