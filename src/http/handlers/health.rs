//! Liveness probe.

use axum::Json;
use serde_json::{Value, json};

/// GET /health - Process is up and serving requests.
pub(crate) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
