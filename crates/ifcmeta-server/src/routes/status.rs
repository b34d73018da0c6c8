use axum::Json;

/// GET /status: liveness probe.
pub async fn status() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "online" }))
}
