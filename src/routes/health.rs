//! Liveness endpoints (/health, /test)

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/test", get(test))
}

async fn health() -> &'static str {
    "ok"
}

/// GET /test - Smoke check used by the web uploader
async fn test() -> Json<Value> {
    Json(json!({ "message": "working" }))
}
