use std::sync::Arc;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::error::Error;
use crate::ingest::{title_from_filename, GameRef};
use crate::meta::Rulebook;
use crate::server::error::ApiError;
use crate::server::state::AppState;

/// Status view of a rulebook
pub fn rulebook_view(rulebook: &Rulebook) -> Value {
    json!({
        "rulebook_id": rulebook.rulebook_id,
        "game_id": rulebook.game_id,
        "filename": rulebook.original_filename,
        "processing_status": rulebook.processing_status,
        "page_count": rulebook.page_count,
        "chunk_count": rulebook.chunk_count,
        "embedding_model": rulebook.embedding_model,
        "error": rulebook.error_message,
        "created_at": rulebook.created_at,
        "processed_date": rulebook.processed_date,
    })
}

struct UploadedFile {
    filename: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// Bare media type of a content-type header value
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

pub async fn upload_rulebook(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut file: Option<UploadedFile> = None;
    let mut game_id: Option<i64> = None;
    let mut game_title: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("rulebook.pdf").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some(UploadedFile {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "game_id" => {
                let text = field.text().await.map_err(multipart_error)?;
                let parsed = text.trim().parse::<i64>().map_err(|_| {
                    ApiError::BadRequest(format!("game_id must be an integer, got {:?}", text))
                })?;
                game_id = Some(parsed);
            }
            "game_title" => {
                let text = field.text().await.map_err(multipart_error)?;
                if !text.trim().is_empty() {
                    game_title = Some(text.trim().to_string());
                }
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;

    let content_type = file
        .content_type
        .as_deref()
        .map(essence)
        .unwrap_or_else(|| {
            mime_guess::from_path(&file.filename)
                .first_raw()
                .unwrap_or("")
                .to_string()
        });
    let allowed = &state.config.server.allowed_content_types;
    if !allowed.iter().any(|a| essence(a) == content_type) {
        return Err(ApiError::BadRequest(
            "Invalid file type. Only PDF files are accepted.".to_string(),
        ));
    }

    if file.bytes.len() > state.config.server.max_upload_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "File exceeds the {} byte upload limit",
            state.config.server.max_upload_bytes
        )));
    }

    let target = match (game_id, game_title) {
        (Some(id), _) => GameRef::Id(id),
        (None, Some(title)) => GameRef::Title(title),
        (None, None) => GameRef::Title(title_from_filename(&file.filename)),
    };

    let outcome = state
        .pipeline
        .submit(&file.bytes, target, &file.filename)
        .await
        .map_err(|e| match e {
            Error::Io(io) => ApiError::Internal(format!("Could not save file: {}", io)),
            other => ApiError::from(other),
        })?;

    let rulebook = &outcome.rulebook;
    let detail = if outcome.duplicate {
        format!("File '{}' uploaded successfully (identical rulebook already present)", file.filename)
    } else {
        state.queue.enqueue(rulebook.rulebook_id);
        format!("File '{}' uploaded successfully", file.filename)
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "filename": file.filename,
            "detail": detail,
            "rulebook_id": rulebook.rulebook_id,
            "game_id": rulebook.game_id,
            "processing_status": rulebook.processing_status,
            "duplicate": outcome.duplicate,
        })),
    ))
}

pub async fn get_rulebook(
    State(state): State<Arc<AppState>>,
    Path(rulebook_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let rulebook = state
        .db
        .get_rulebook(rulebook_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Rulebook not found".to_string()))?;
    Ok(Json(rulebook_view(&rulebook)))
}

pub async fn delete_rulebook(
    State(state): State<Arc<AppState>>,
    Path(rulebook_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.pipeline.remove_rulebook(rulebook_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
