// GET handlers: health, version

use axum::response::IntoResponse;

use crate::models::now_millis;
use crate::version::{NAME, VERSION};

/// GET /health — liveness for external health checks.
pub(super) async fn health_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "timestamp": now_millis(),
    }))
}

/// GET /version — returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}
