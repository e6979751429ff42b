//! Liveness probe.

use axum::Json;

/// Liveness probe for `GET /health`.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
