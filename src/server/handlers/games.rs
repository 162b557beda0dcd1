use std::sync::Arc;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::meta::{ChatRole, NewChatMessage, NewGame};
use crate::retrieve::citations;
use crate::server::error::ApiError;
use crate::server::handlers::rulebooks::rulebook_view;
use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub k: Option<usize>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
}

pub async fn list_games(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let games = state.db.list_games().await?;
    Ok(Json(games))
}

pub async fn create_game(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewGame>,
) -> Result<impl IntoResponse, ApiError> {
    let game = state.db.insert_game(&payload).await?;
    Ok((StatusCode::CREATED, Json(game)))
}

pub async fn get_game(
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let game = state
        .db
        .get_game(game_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Game not found".to_string()))?;
    Ok(Json(game))
}

pub async fn delete_game(
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.pipeline.remove_game(game_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_game_rulebooks(
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if state.db.get_game(game_id).await?.is_none() {
        return Err(ApiError::NotFound("Game not found".to_string()));
    }
    let rulebooks: Vec<Value> = state
        .db
        .list_rulebooks(game_id)
        .await?
        .iter()
        .map(rulebook_view)
        .collect();
    Ok(Json(json!({ "game_id": game_id, "rulebooks": rulebooks })))
}

pub async fn ask(
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    Json(payload): Json<AskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let passages = state
        .retrieval
        .retrieve(&payload.question, game_id, payload.k)
        .await?;
    let answer_citations = citations(&passages);

    if let Some(session_id) = payload.session_id.as_deref().filter(|s| !s.trim().is_empty()) {
        state
            .db
            .append_chat_message(&NewChatMessage {
                session_id: session_id.to_string(),
                game_id,
                user_id: payload.user_id,
                role: ChatRole::User,
                content: payload.question.trim().to_string(),
                citations: Some(serde_json::to_value(&answer_citations).map_err(ApiError::internal)?),
            })
            .await?;
    }

    Ok(Json(json!({
        "game_id": game_id,
        "question": payload.question.trim(),
        "answer_citations": answer_citations,
        "passages": passages,
    })))
}
