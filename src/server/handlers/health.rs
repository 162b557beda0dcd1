use std::sync::Arc;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::server::state::AppState;

pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "message": format!("Welcome to {}", state.config.server.project_name)
    }))
}

pub async fn ping() -> impl IntoResponse {
    Json(json!({"ping": "pong"}))
}

/// Liveness plus vector index reachability; always 200 so the process stays up
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (reachable, error) = match state.index.health().await {
        Ok(()) => (true, None),
        Err(e) => {
            tracing::warn!("Vector index health check failed: {}", e);
            (false, Some(e.to_string()))
        }
    };

    Json(json!({
        "status": if reachable { "ok" } else { "degraded" },
        "index": {
            "backend": state.index.name(),
            "reachable": reachable,
            "error": error,
        }
    }))
}
