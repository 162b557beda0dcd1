use std::sync::Arc;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::server::error::ApiError;
use crate::server::state::AppState;

pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let messages: Vec<Value> = state
        .db
        .get_chat_history(&session_id)
        .await?
        .into_iter()
        .map(|msg| {
            json!({
                "message_id": msg.message_id,
                "game_id": msg.game_id,
                "user_id": msg.user_id,
                "role": msg.role,
                "content": msg.content,
                "timestamp": msg.timestamp,
                "citations": msg.citations(),
            })
        })
        .collect();

    Ok(Json(json!({ "session_id": session_id, "messages": messages })))
}
