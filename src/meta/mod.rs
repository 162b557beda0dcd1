//! Metadata storage using SQLite
//!
//! This module handles all relational storage including:
//! - Games and their rulebooks (with processing status)
//! - Chunks (provenance for every indexed vector)
//! - Users, chat history and game submissions

mod schema;

pub use schema::*;

use crate::config::Config;
use crate::error::{Error, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::{debug, info};

/// Sortable RFC 3339 timestamp used for every stored time
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Rulebook processing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RulebookStatus {
    Pending,
    Processing,
    Processed,
    Failed,
}

impl RulebookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RulebookStatus::Pending => "pending",
            RulebookStatus::Processing => "processing",
            RulebookStatus::Processed => "processed",
            RulebookStatus::Failed => "failed",
        }
    }

    /// Allowed edges: pending -> processing -> processed | failed, pending -> failed
    pub fn can_transition_to(&self, next: RulebookStatus) -> bool {
        matches!(
            (self, next),
            (RulebookStatus::Pending, RulebookStatus::Processing)
                | (RulebookStatus::Pending, RulebookStatus::Failed)
                | (RulebookStatus::Processing, RulebookStatus::Processed)
                | (RulebookStatus::Processing, RulebookStatus::Failed)
        )
    }
}

impl std::fmt::Display for RulebookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RulebookStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RulebookStatus::Pending),
            "processing" => Ok(RulebookStatus::Processing),
            "processed" => Ok(RulebookStatus::Processed),
            "failed" => Ok(RulebookStatus::Failed),
            _ => Err(Error::Validation(format!("Unknown rulebook status: {}", s))),
        }
    }
}

/// Chat message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for ChatRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            _ => Err(Error::Validation(format!("Unknown chat role: {}", s))),
        }
    }
}

/// A board game
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Game {
    pub game_id: i64,
    pub title: String,
    pub bgg_id: Option<i64>,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for creating a game
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewGame {
    pub title: String,
    #[serde(default)]
    pub bgg_id: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
}

impl NewGame {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// An uploaded rulebook
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Rulebook {
    pub rulebook_id: i64,
    pub game_id: i64,
    pub original_filename: String,
    pub storage_path: String,
    pub file_hash: String,
    pub processing_status: String,
    pub page_count: Option<i64>,
    pub chunk_count: Option<i64>,
    pub embedding_model: Option<String>,
    pub error_message: Option<String>,
    pub vectors_purged: bool,
    pub created_at: String,
    pub processed_date: Option<String>,
}

impl Rulebook {
    pub fn status(&self) -> Result<RulebookStatus> {
        self.processing_status.parse()
    }
}

/// Fields for registering an uploaded rulebook
#[derive(Debug, Clone)]
pub struct NewRulebook {
    pub game_id: i64,
    pub original_filename: String,
    pub storage_path: String,
    pub file_hash: String,
}

/// A text chunk as recorded for provenance
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChunkRow {
    pub id: String,
    pub rulebook_id: i64,
    pub game_id: i64,
    pub chunk_index: i64,
    pub page_number: i64,
    #[sqlx(rename = "chunk_text")]
    pub text: String,
    pub char_start: i64,
    pub char_end: i64,
    pub chunk_hash: String,
    pub created_at: String,
}

/// A user account
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
}

/// Fields for creating a user. The hash is stored as given.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// One entry in a chat transcript
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: i64,
    pub session_id: String,
    pub game_id: i64,
    pub user_id: Option<i64>,
    pub role: String,
    pub content: String,
    pub timestamp: String,
    pub citations_json: Option<String>,
}

impl ChatMessage {
    pub fn citations(&self) -> Option<serde_json::Value> {
        self.citations_json
            .as_ref()
            .and_then(|j| serde_json::from_str(j).ok())
    }
}

/// Fields for appending a chat message
#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub session_id: String,
    pub game_id: i64,
    pub user_id: Option<i64>,
    pub role: ChatRole,
    pub content: String,
    pub citations: Option<serde_json::Value>,
}

/// A request to add a game to the catalogue
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GameSubmission {
    pub submission_id: i64,
    pub game_title: String,
    pub user_description: Option<String>,
    pub submitted_rulebook_path: Option<String>,
    pub submission_status: String,
    pub submitted_by_user_id: Option<i64>,
    pub submitted_at: String,
    pub admin_notes: Option<String>,
}

/// Fields for creating a game submission
#[derive(Debug, Clone, Deserialize)]
pub struct NewGameSubmission {
    pub game_title: String,
    #[serde(default)]
    pub user_description: Option<String>,
    #[serde(default)]
    pub submitted_rulebook_path: Option<String>,
    #[serde(default)]
    pub submitted_by_user_id: Option<i64>,
}

/// Metadata database handle
#[derive(Clone)]
pub struct MetaDb {
    pool: SqlitePool,
}

impl MetaDb {
    /// Connect to the metadata database
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::open(&config.paths.db_file).await
    }

    /// Create database with path directly, initializing the schema if needed
    pub async fn new(db_path: &std::path::Path) -> Result<Self> {
        let db = Self::open(db_path).await?;
        if !db.is_initialized().await? {
            db.init_schema().await?;
        }
        Ok(db)
    }

    async fn open(db_path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='rulebooks'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    // ===== Game Operations =====

    /// Insert a new game
    pub async fn insert_game(&self, game: &NewGame) -> Result<Game> {
        let title = game.title.trim();
        if title.is_empty() {
            return Err(Error::Validation("Game title must not be empty".to_string()));
        }

        let now = now_timestamp();
        let inserted = sqlx::query_as::<_, Game>(
            r#"
            INSERT INTO games (title, bgg_id, description, cover_image_url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(title)
        .bind(game.bgg_id)
        .bind(&game.description)
        .bind(&game.cover_image_url)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(game) => Ok(game),
            Err(e) if is_unique_violation(&e) => Err(Error::Validation(format!(
                "A game titled '{}' (or with that catalog id) already exists",
                title
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Get game by ID
    pub async fn get_game(&self, game_id: i64) -> Result<Option<Game>> {
        let game = sqlx::query_as::<_, Game>("SELECT * FROM games WHERE game_id = ?")
            .bind(game_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(game)
    }

    /// Get game by exact title
    pub async fn get_game_by_title(&self, title: &str) -> Result<Option<Game>> {
        let game = sqlx::query_as::<_, Game>("SELECT * FROM games WHERE title = ?")
            .bind(title.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(game)
    }

    /// Look up a game by title, creating it on first use
    pub async fn find_or_create_game(&self, title: &str) -> Result<Game> {
        if let Some(game) = self.get_game_by_title(title).await? {
            return Ok(game);
        }

        match self.insert_game(&NewGame::titled(title)).await {
            Ok(game) => {
                info!(game_id = game.game_id, title = %game.title, "Created game");
                Ok(game)
            }
            // Lost a race with a concurrent creator
            Err(Error::Validation(_)) => self
                .get_game_by_title(title)
                .await?
                .ok_or_else(|| Error::NotFound(format!("game '{}'", title))),
            Err(e) => Err(e),
        }
    }

    /// List all games
    pub async fn list_games(&self) -> Result<Vec<Game>> {
        let games = sqlx::query_as::<_, Game>("SELECT * FROM games ORDER BY title")
            .fetch_all(&self.pool)
            .await?;
        Ok(games)
    }

    /// Delete a game together with its rulebooks and chunks.
    ///
    /// Returns the ids of the deleted rulebooks so their vectors can be purged.
    pub async fn delete_game(&self, game_id: i64) -> Result<Vec<i64>> {
        if self.get_game(game_id).await?.is_none() {
            return Err(Error::NotFound(format!("game {}", game_id)));
        }

        let chat_refs: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chat_history WHERE game_id = ?")
                .bind(game_id)
                .fetch_one(&self.pool)
                .await?;
        if chat_refs > 0 {
            return Err(Error::Validation(format!(
                "Game {} is referenced by chat history and cannot be deleted",
                game_id
            )));
        }

        let mut tx = self.pool.begin().await?;
        let rulebook_ids: Vec<i64> =
            sqlx::query_scalar("SELECT rulebook_id FROM rulebooks WHERE game_id = ?")
                .bind(game_id)
                .fetch_all(&mut *tx)
                .await?;
        sqlx::query("DELETE FROM games WHERE game_id = ?")
            .bind(game_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(rulebook_ids)
    }

    // ===== Rulebook Operations =====

    /// Insert a rulebook in `pending`.
    ///
    /// Returns `None` when a live rulebook with the same content already
    /// exists for the game.
    pub async fn try_insert_rulebook(&self, rulebook: &NewRulebook) -> Result<Option<Rulebook>> {
        let inserted = sqlx::query_as::<_, Rulebook>(
            r#"
            INSERT INTO rulebooks (game_id, original_filename, storage_path, file_hash, processing_status, created_at)
            VALUES (?, ?, ?, ?, 'pending', ?)
            RETURNING *
            "#,
        )
        .bind(rulebook.game_id)
        .bind(&rulebook.original_filename)
        .bind(&rulebook.storage_path)
        .bind(&rulebook.file_hash)
        .bind(now_timestamp())
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(rulebook) => Ok(Some(rulebook)),
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get rulebook by ID
    pub async fn get_rulebook(&self, rulebook_id: i64) -> Result<Option<Rulebook>> {
        let rulebook = sqlx::query_as::<_, Rulebook>("SELECT * FROM rulebooks WHERE rulebook_id = ?")
            .bind(rulebook_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(rulebook)
    }

    /// Find the live (non-failed) rulebook holding this content for a game
    pub async fn find_live_rulebook(&self, game_id: i64, file_hash: &str) -> Result<Option<Rulebook>> {
        let rulebook = sqlx::query_as::<_, Rulebook>(
            r#"
            SELECT * FROM rulebooks
            WHERE game_id = ? AND file_hash = ? AND processing_status != 'failed'
            "#,
        )
        .bind(game_id)
        .bind(file_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rulebook)
    }

    /// List rulebooks of a game, oldest first
    pub async fn list_rulebooks(&self, game_id: i64) -> Result<Vec<Rulebook>> {
        let rulebooks = sqlx::query_as::<_, Rulebook>(
            "SELECT * FROM rulebooks WHERE game_id = ? ORDER BY rulebook_id",
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rulebooks)
    }

    /// List all rulebooks, oldest first
    pub async fn list_all_rulebooks(&self) -> Result<Vec<Rulebook>> {
        let rulebooks = sqlx::query_as::<_, Rulebook>("SELECT * FROM rulebooks ORDER BY rulebook_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rulebooks)
    }

    /// List rulebooks currently in the given status
    pub async fn list_rulebooks_by_status(&self, status: RulebookStatus) -> Result<Vec<Rulebook>> {
        let rulebooks = sqlx::query_as::<_, Rulebook>(
            "SELECT * FROM rulebooks WHERE processing_status = ? ORDER BY rulebook_id",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rulebooks)
    }

    /// Ids of processed rulebooks for a game embedded with the given model
    pub async fn processed_rulebook_ids(&self, game_id: i64, embedding_model: &str) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT rulebook_id FROM rulebooks
            WHERE game_id = ? AND processing_status = 'processed' AND embedding_model = ?
            ORDER BY rulebook_id
            "#,
        )
        .bind(game_id)
        .bind(embedding_model)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Compare-and-set a status transition
    pub async fn transition_rulebook(
        &self,
        rulebook_id: i64,
        from: RulebookStatus,
        to: RulebookStatus,
    ) -> Result<()> {
        if !from.can_transition_to(to) {
            return Err(Error::InvalidTransition {
                rulebook_id,
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let result = sqlx::query(
            "UPDATE rulebooks SET processing_status = ? WHERE rulebook_id = ? AND processing_status = ?",
        )
        .bind(to.as_str())
        .bind(rulebook_id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.transition_conflict(rulebook_id, to).await);
        }

        debug!(rulebook_id, %from, %to, "Rulebook status changed");
        Ok(())
    }

    /// Mark a pending or processing rulebook as failed
    pub async fn mark_failed(&self, rulebook_id: i64, message: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE rulebooks SET processing_status = 'failed', error_message = ?, processed_date = ?
            WHERE rulebook_id = ? AND processing_status IN ('pending', 'processing')
            "#,
        )
        .bind(message)
        .bind(now_timestamp())
        .bind(rulebook_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self
                .transition_conflict(rulebook_id, RulebookStatus::Failed)
                .await);
        }
        Ok(())
    }

    /// Record chunk provenance and mark the rulebook processed, atomically
    pub async fn mark_processed(
        &self,
        rulebook_id: i64,
        page_count: usize,
        embedding_model: &str,
        chunks: &[ChunkRow],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, rulebook_id, game_id, chunk_index, page_number, chunk_text, char_start, char_end, chunk_hash, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(chunk.rulebook_id)
            .bind(chunk.game_id)
            .bind(chunk.chunk_index)
            .bind(chunk.page_number)
            .bind(&chunk.text)
            .bind(chunk.char_start)
            .bind(chunk.char_end)
            .bind(&chunk.chunk_hash)
            .bind(&chunk.created_at)
            .execute(&mut *tx)
            .await?;
        }

        let result = sqlx::query(
            r#"
            UPDATE rulebooks SET
                processing_status = 'processed',
                page_count = ?,
                chunk_count = ?,
                embedding_model = ?,
                error_message = NULL,
                processed_date = ?
            WHERE rulebook_id = ? AND processing_status = 'processing'
            "#,
        )
        .bind(page_count as i64)
        .bind(chunks.len() as i64)
        .bind(embedding_model)
        .bind(now_timestamp())
        .bind(rulebook_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(self
                .transition_conflict(rulebook_id, RulebookStatus::Processed)
                .await);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn transition_conflict(&self, rulebook_id: i64, to: RulebookStatus) -> Error {
        match self.get_rulebook(rulebook_id).await {
            Ok(Some(current)) => Error::InvalidTransition {
                rulebook_id,
                from: current.processing_status,
                to: to.to_string(),
            },
            Ok(None) => Error::NotFound(format!("rulebook {}", rulebook_id)),
            Err(e) => e,
        }
    }

    /// Failed rulebooks whose vectors may still sit in the index
    pub async fn list_failed_unpurged(&self) -> Result<Vec<Rulebook>> {
        let rulebooks = sqlx::query_as::<_, Rulebook>(
            r#"
            SELECT * FROM rulebooks
            WHERE processing_status = 'failed' AND vectors_purged = 0
            ORDER BY rulebook_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rulebooks)
    }

    /// Record that a failed rulebook's vectors were removed from the index
    pub async fn mark_vectors_purged(&self, rulebook_id: i64) -> Result<()> {
        sqlx::query("UPDATE rulebooks SET vectors_purged = 1 WHERE rulebook_id = ?")
            .bind(rulebook_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a rulebook and its chunks
    pub async fn delete_rulebook(&self, rulebook_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM rulebooks WHERE rulebook_id = ?")
            .bind(rulebook_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("rulebook {}", rulebook_id)));
        }
        Ok(())
    }

    // ===== Chunk Operations =====

    /// Get chunks for a rulebook in index order
    pub async fn get_chunks(&self, rulebook_id: i64) -> Result<Vec<ChunkRow>> {
        let chunks = sqlx::query_as::<_, ChunkRow>(
            "SELECT * FROM chunks WHERE rulebook_id = ? ORDER BY chunk_index",
        )
        .bind(rulebook_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(chunks)
    }

    /// Get a single chunk by its id
    pub async fn get_chunk(&self, id: &str) -> Result<Option<ChunkRow>> {
        let chunk = sqlx::query_as::<_, ChunkRow>("SELECT * FROM chunks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(chunk)
    }

    // ===== User Operations =====

    /// Insert a new user
    pub async fn insert_user(&self, user: &NewUser) -> Result<User> {
        if user.username.trim().is_empty() || user.email.trim().is_empty() {
            return Err(Error::Validation(
                "username and email must not be empty".to_string(),
            ));
        }

        let inserted = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(user.username.trim())
        .bind(user.email.trim())
        .bind(&user.password_hash)
        .bind(now_timestamp())
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(user) => Ok(user),
            Err(e) if is_unique_violation(&e) => Err(Error::Validation(
                "username or email already registered".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Get user by ID
    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// List all users
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY user_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    // ===== Chat History Operations =====

    /// Append a message to a chat session
    pub async fn append_chat_message(&self, message: &NewChatMessage) -> Result<ChatMessage> {
        if message.session_id.trim().is_empty() {
            return Err(Error::Validation("session_id must not be empty".to_string()));
        }
        if let Some(user_id) = message.user_id {
            if self.get_user(user_id).await?.is_none() {
                return Err(Error::NotFound(format!("user {}", user_id)));
            }
        }

        let citations_json = message
            .citations
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let stored = sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO chat_history (session_id, game_id, user_id, role, content, timestamp, citations_json)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&message.session_id)
        .bind(message.game_id)
        .bind(message.user_id)
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(now_timestamp())
        .bind(citations_json)
        .fetch_one(&self.pool)
        .await?;
        Ok(stored)
    }

    /// Get a session transcript in order
    pub async fn get_chat_history(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let messages = sqlx::query_as::<_, ChatMessage>(
            "SELECT * FROM chat_history WHERE session_id = ? ORDER BY timestamp, message_id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    // ===== Game Submission Operations =====

    /// Insert a game submission in `Pending Review`
    pub async fn insert_submission(&self, submission: &NewGameSubmission) -> Result<GameSubmission> {
        if submission.game_title.trim().is_empty() {
            return Err(Error::Validation("game_title must not be empty".to_string()));
        }
        if let Some(user_id) = submission.submitted_by_user_id {
            if self.get_user(user_id).await?.is_none() {
                return Err(Error::NotFound(format!("user {}", user_id)));
            }
        }

        let stored = sqlx::query_as::<_, GameSubmission>(
            r#"
            INSERT INTO game_submissions (game_title, user_description, submitted_rulebook_path, submitted_by_user_id, submitted_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(submission.game_title.trim())
        .bind(&submission.user_description)
        .bind(&submission.submitted_rulebook_path)
        .bind(submission.submitted_by_user_id)
        .bind(now_timestamp())
        .fetch_one(&self.pool)
        .await?;
        Ok(stored)
    }

    /// List submissions, newest first
    pub async fn list_submissions(&self) -> Result<Vec<GameSubmission>> {
        let submissions = sqlx::query_as::<_, GameSubmission>(
            "SELECT * FROM game_submissions ORDER BY submission_id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(submissions)
    }

    // ===== Statistics =====

    /// Get global statistics
    pub async fn get_global_stats(&self) -> Result<GlobalStats> {
        let game_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM games")
            .fetch_one(&self.pool)
            .await?;

        let chunk_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;

        let by_status: Vec<(String, i64)> = sqlx::query_as(
            "SELECT processing_status, COUNT(*) FROM rulebooks GROUP BY processing_status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = GlobalStats {
            game_count: game_count as usize,
            chunk_count: chunk_count as usize,
            ..Default::default()
        };
        for (status, count) in by_status {
            let count = count as usize;
            stats.rulebook_count += count;
            match status.parse() {
                Ok(RulebookStatus::Pending) => stats.pending = count,
                Ok(RulebookStatus::Processing) => stats.processing = count,
                Ok(RulebookStatus::Processed) => stats.processed = count,
                Ok(RulebookStatus::Failed) => stats.failed = count,
                Err(_) => {}
            }
        }
        Ok(stats)
    }
}

/// Global statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalStats {
    pub game_count: usize,
    pub rulebook_count: usize,
    pub chunk_count: usize,
    pub pending: usize,
    pub processing: usize,
    pub processed: usize,
    pub failed: usize,
}
