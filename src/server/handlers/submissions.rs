use std::sync::Arc;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::meta::NewGameSubmission;
use crate::server::error::ApiError;
use crate::server::state::AppState;

pub async fn create_submission(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewGameSubmission>,
) -> Result<impl IntoResponse, ApiError> {
    let submission = state.db.insert_submission(&payload).await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.db.list_submissions().await?))
}
