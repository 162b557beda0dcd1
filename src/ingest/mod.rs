//! Rulebook ingestion pipeline
//!
//! Ingestion is split in two phases:
//! - `submit` validates the upload, resolves the game, stores the bytes and
//!   records a `pending` rulebook (fast, used by request handlers)
//! - `process` extracts pages, chunks, embeds and indexes a pending rulebook,
//!   ending in `processed` or `failed` (slow, run by background workers)

mod locks;
mod queue;
mod retry;

pub use locks::KeyedLocks;
pub use queue::{IngestQueue, QueueHandle};
pub use retry::RetryPolicy;

use crate::chunk::{chunk_pages, compute_content_hash, TextChunk};
use crate::config::{ChunkConfig, Config};
use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::meta::{now_timestamp, ChunkRow, MetaDb, NewRulebook, Rulebook, RulebookStatus};
use crate::parse::{is_pdf, PageExtractor};
use crate::store::{chunk_point_id, ChunkPayload, ChunkPoint, VectorIndex};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Error recorded on rulebooks whose job died with a previous process
pub const INTERRUPTED_MESSAGE: &str = "Processing was interrupted before completion";

/// Which game an upload belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameRef {
    Id(i64),
    Title(String),
}

/// Result of submitting rulebook bytes
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub rulebook: Rulebook,

    /// True when identical bytes were already live for this game
    pub duplicate: bool,
}

/// Summary of a cleanup pass over failed rulebooks
#[derive(Debug, Clone, Default)]
pub struct PurgeReport {
    pub purged: Vec<i64>,
    pub errors: Vec<(i64, String)>,
}

/// Tunables the pipeline reads from [`Config`]
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub chunk: ChunkConfig,
    pub embed_batch_size: usize,
    pub index_batch_size: usize,
    pub embed_retry: RetryPolicy,
    pub index_retry: RetryPolicy,
    pub embed_timeout: Duration,
    pub index_timeout: Duration,
    pub job_timeout: Duration,
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> Self {
        let base = Duration::from_millis(config.ingest.backoff_base_ms);
        let max = Duration::from_millis(config.ingest.backoff_max_ms);
        Self {
            upload_dir: config.paths.upload_dir.clone(),
            max_upload_bytes: config.server.max_upload_bytes,
            chunk: config.chunk.clone(),
            embed_batch_size: config.embedding.batch_size.max(1),
            index_batch_size: config.ingest.index_batch_size.max(1),
            embed_retry: RetryPolicy::new(config.ingest.embed_max_attempts, base, max),
            index_retry: RetryPolicy::new(config.ingest.index_max_attempts, base, max),
            embed_timeout: config.embedding.timeout(),
            index_timeout: Duration::from_secs(config.vector.timeout_secs),
            job_timeout: config.ingest.job_timeout(),
        }
    }
}

/// Turns uploaded rulebooks into indexed, citable chunks
pub struct IngestPipeline {
    db: MetaDb,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    extractor: Arc<dyn PageExtractor>,
    settings: IngestSettings,
    locks: KeyedLocks<(i64, String)>,
}

impl IngestPipeline {
    pub fn new(
        db: MetaDb,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        extractor: Arc<dyn PageExtractor>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            db,
            index,
            embedder,
            extractor,
            settings,
            locks: KeyedLocks::new(),
        }
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    /// Submit and process inline
    pub async fn ingest(&self, bytes: &[u8], target: GameRef, filename: &str) -> Result<IngestOutcome> {
        let outcome = self.submit(bytes, target, filename).await?;
        if outcome.duplicate {
            return Ok(outcome);
        }

        let rulebook = self.process(outcome.rulebook.rulebook_id).await?;
        Ok(IngestOutcome {
            rulebook,
            duplicate: false,
        })
    }

    /// Validate, store and register an upload in `pending`.
    ///
    /// Bytes are persisted before a title target creates its game, so a
    /// storage failure leaves no empty game behind.
    pub async fn submit(&self, bytes: &[u8], target: GameRef, filename: &str) -> Result<IngestOutcome> {
        self.validate_upload(bytes)?;

        let known_game = match &target {
            GameRef::Id(game_id) => Some(
                self.db
                    .get_game(*game_id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("game {}", game_id)))?,
            ),
            GameRef::Title(title) => {
                if title.trim().is_empty() {
                    return Err(Error::Validation("Game title must not be empty".to_string()));
                }
                None
            }
        };

        let file_hash = compute_content_hash(bytes);
        let storage_path = self.store_bytes(filename, &file_hash, bytes).await?;

        let game = match (known_game, target) {
            (Some(game), _) => game,
            (None, GameRef::Title(title)) => self.db.find_or_create_game(&title).await?,
            (None, GameRef::Id(game_id)) => {
                return Err(Error::NotFound(format!("game {}", game_id)));
            }
        };

        let _guard = self.locks.lock((game.game_id, file_hash.clone())).await;

        if let Some(existing) = self.db.find_live_rulebook(game.game_id, &file_hash).await? {
            info!(
                rulebook_id = existing.rulebook_id,
                game_id = game.game_id,
                "Identical rulebook already uploaded"
            );
            return Ok(IngestOutcome {
                rulebook: existing,
                duplicate: true,
            });
        }

        let new_rulebook = NewRulebook {
            game_id: game.game_id,
            original_filename: filename.to_string(),
            storage_path: storage_path.to_string_lossy().into_owned(),
            file_hash: file_hash.clone(),
        };

        match self.db.try_insert_rulebook(&new_rulebook).await? {
            Some(rulebook) => {
                info!(
                    rulebook_id = rulebook.rulebook_id,
                    game_id = game.game_id,
                    filename,
                    "Rulebook registered"
                );
                Ok(IngestOutcome {
                    rulebook,
                    duplicate: false,
                })
            }
            // Another process registered the same content first
            None => {
                let existing = self
                    .db
                    .find_live_rulebook(game.game_id, &file_hash)
                    .await?
                    .ok_or_else(|| {
                        Error::Other(format!(
                            "Rulebook for game {} vanished after a uniqueness conflict",
                            game.game_id
                        ))
                    })?;
                Ok(IngestOutcome {
                    rulebook: existing,
                    duplicate: true,
                })
            }
        }
    }

    fn validate_upload(&self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Err(Error::Validation("Uploaded file is empty".to_string()));
        }
        if bytes.len() > self.settings.max_upload_bytes {
            return Err(Error::Validation(format!(
                "Uploaded file is {} bytes; the limit is {}",
                bytes.len(),
                self.settings.max_upload_bytes
            )));
        }
        if !is_pdf(bytes) {
            return Err(Error::Validation(
                "Invalid file type. Only PDF files are accepted.".to_string(),
            ));
        }
        Ok(())
    }

    /// Persist raw bytes under the upload directory.
    ///
    /// The bytes go to a private temp file first and are then hard-linked
    /// under the first free candidate name: the sanitized filename, then
    /// with a short hash prefix, then with the full hash. Linking never
    /// replaces an existing file, so concurrent uploads sharing a name cannot
    /// overwrite each other. A candidate already holding the same content is
    /// reused.
    async fn store_bytes(&self, filename: &str, file_hash: &str, bytes: &[u8]) -> Result<PathBuf> {
        let dir = &self.settings.upload_dir;
        tokio::fs::create_dir_all(dir).await?;

        let temp = dir.join(format!(".upload-{}.tmp", Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&temp, bytes).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }

        let stored = self.link_stored(&temp, filename, file_hash).await;
        if let Err(e) = tokio::fs::remove_file(&temp).await {
            debug!("Could not remove temp upload {:?}: {}", temp, e);
        }
        stored
    }

    async fn link_stored(&self, temp: &Path, filename: &str, file_hash: &str) -> Result<PathBuf> {
        let name = sanitize_filename(filename);
        let candidates = [
            name.clone(),
            format!("{}_{}", &file_hash[..8], name),
            format!("{}_{}", file_hash, name),
        ];

        for candidate in candidates {
            let path = self.settings.upload_dir.join(candidate);
            match tokio::fs::hard_link(temp, &path).await {
                Ok(()) => {
                    debug!("Stored upload at {:?}", path);
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if let Ok(existing) = tokio::fs::read(&path).await {
                        if compute_content_hash(&existing) == file_hash {
                            debug!("Reusing stored upload {:?}", path);
                            return Ok(path);
                        }
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::Other(format!(
            "No free storage name for upload '{}'",
            filename
        )))
    }

    /// Run a pending rulebook to `processed` or `failed`.
    ///
    /// Rulebooks not in `pending` are returned untouched. Job failures are
    /// recorded on the rulebook, not returned.
    pub async fn process(&self, rulebook_id: i64) -> Result<Rulebook> {
        let rulebook = self
            .db
            .get_rulebook(rulebook_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("rulebook {}", rulebook_id)))?;

        match self
            .db
            .transition_rulebook(rulebook_id, RulebookStatus::Pending, RulebookStatus::Processing)
            .await
        {
            Ok(()) => {}
            Err(Error::InvalidTransition { from, .. }) => {
                debug!(rulebook_id, status = %from, "Rulebook not pending; skipping");
                return Ok(rulebook);
            }
            Err(e) => return Err(e),
        }

        info!(rulebook_id, game_id = rulebook.game_id, "Processing rulebook");

        let outcome = match tokio::time::timeout(self.settings.job_timeout, self.run_job(&rulebook)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Other(format!(
                "Ingestion job exceeded {:?}",
                self.settings.job_timeout
            ))),
        };

        match outcome {
            Ok(stats) => info!(
                rulebook_id,
                pages = stats.pages,
                chunks = stats.chunks,
                "Rulebook processed"
            ),
            Err(e) => {
                error!(rulebook_id, "Rulebook processing failed: {}", e);
                self.db.mark_failed(rulebook_id, &e.to_string()).await?;
            }
        }

        self.db
            .get_rulebook(rulebook_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("rulebook {}", rulebook_id)))
    }

    async fn run_job(&self, rulebook: &Rulebook) -> Result<JobStats> {
        let bytes = tokio::fs::read(&rulebook.storage_path).await?;
        let pages = self.extractor.extract_pages(bytes).await?;

        if pages.iter().all(|p| p.text.trim().is_empty()) {
            return Err(Error::Extraction(
                "Document has no extractable text".to_string(),
            ));
        }

        let chunks = chunk_pages(&pages, &self.settings.chunk);
        debug!(
            rulebook_id = rulebook.rulebook_id,
            pages = pages.len(),
            chunks = chunks.len(),
            "Chunked rulebook"
        );

        let vectors = self.embed_chunks(&chunks).await?;
        let model = self.embedder.model_name().to_string();

        let points: Vec<ChunkPoint> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| ChunkPoint {
                id: chunk_point_id(rulebook.rulebook_id, chunk.index),
                vector,
                payload: ChunkPayload {
                    game_id: rulebook.game_id,
                    rulebook_id: rulebook.rulebook_id,
                    page_number: chunk.page_number as i64,
                    chunk_index: chunk.index as i64,
                    text: chunk.text.clone(),
                    chunk_hash: chunk.hash.clone(),
                    embedding_model: model.clone(),
                },
            })
            .collect();

        self.index_points(rulebook.rulebook_id, points).await?;

        let created_at = now_timestamp();
        let rows: Vec<ChunkRow> = chunks
            .iter()
            .map(|chunk| ChunkRow {
                id: chunk_point_id(rulebook.rulebook_id, chunk.index).to_string(),
                rulebook_id: rulebook.rulebook_id,
                game_id: rulebook.game_id,
                chunk_index: chunk.index as i64,
                page_number: chunk.page_number as i64,
                text: chunk.text.clone(),
                char_start: chunk.char_start as i64,
                char_end: chunk.char_end as i64,
                chunk_hash: chunk.hash.clone(),
                created_at: created_at.clone(),
            })
            .collect();

        self.db
            .mark_processed(rulebook.rulebook_id, pages.len(), &model, &rows)
            .await?;

        Ok(JobStats {
            pages: pages.len(),
            chunks: rows.len(),
        })
    }

    async fn embed_chunks(&self, chunks: &[TextChunk]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.settings.embed_batch_size) {
            let embedded = self
                .settings
                .embed_retry
                .run(
                    "embedding batch",
                    self.settings.embed_timeout,
                    Error::EmbeddingUnavailable,
                    || self.embedder.embed(batch.to_vec()),
                )
                .await?;
            vectors.extend(embedded);
        }

        Ok(vectors)
    }

    async fn index_points(&self, rulebook_id: i64, points: Vec<ChunkPoint>) -> Result<()> {
        let total = points.len();
        for (batch_number, batch) in points.chunks(self.settings.index_batch_size).enumerate() {
            self.settings
                .index_retry
                .run(
                    "vector upsert",
                    self.settings.index_timeout,
                    Error::IndexUnavailable,
                    || self.index.upsert(batch.to_vec()),
                )
                .await
                .map_err(|e| {
                    warn!(
                        rulebook_id,
                        batch = batch_number,
                        "Upsert failed; earlier batches stay until cleanup"
                    );
                    e
                })?;
        }
        debug!(rulebook_id, points = total, "Indexed rulebook chunks");
        Ok(())
    }

    /// Remove leftover vectors of failed rulebooks
    pub async fn purge_failed(&self) -> Result<PurgeReport> {
        let mut report = PurgeReport::default();

        for rulebook in self.db.list_failed_unpurged().await? {
            let id = rulebook.rulebook_id;
            let deleted = self
                .settings
                .index_retry
                .run(
                    "vector delete",
                    self.settings.index_timeout,
                    Error::IndexUnavailable,
                    || self.index.delete_rulebook(id),
                )
                .await;

            match deleted {
                Ok(()) => {
                    self.db.mark_vectors_purged(id).await?;
                    info!(rulebook_id = id, "Purged vectors of failed rulebook");
                    report.purged.push(id);
                }
                Err(e) => {
                    warn!(rulebook_id = id, "Could not purge vectors: {}", e);
                    report.errors.push((id, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// Fail rulebooks left in `processing` by a previous process.
    ///
    /// Only call this before any worker of this process has started, since
    /// a live job is indistinguishable from an orphaned one.
    pub async fn fail_interrupted(&self) -> Result<Vec<i64>> {
        let mut failed = Vec::new();
        for rulebook in self.db.list_rulebooks_by_status(RulebookStatus::Processing).await? {
            let id = rulebook.rulebook_id;
            self.db.mark_failed(id, INTERRUPTED_MESSAGE).await?;
            warn!(rulebook_id = id, "Rulebook was interrupted mid-processing; marked failed");
            failed.push(id);
        }
        Ok(failed)
    }

    /// Delete a rulebook, its chunks and its vectors
    pub async fn remove_rulebook(&self, rulebook_id: i64) -> Result<()> {
        let rulebook = self
            .db
            .get_rulebook(rulebook_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("rulebook {}", rulebook_id)))?;

        if rulebook.status()? == RulebookStatus::Processing {
            return Err(Error::Validation(format!(
                "Rulebook {} is being processed; try again later",
                rulebook_id
            )));
        }

        self.index.delete_rulebook(rulebook_id).await?;
        self.db.delete_rulebook(rulebook_id).await?;
        info!(rulebook_id, "Rulebook deleted");
        Ok(())
    }

    /// Delete a game with all of its rulebooks and vectors
    pub async fn remove_game(&self, game_id: i64) -> Result<()> {
        let rulebook_ids = self.db.delete_game(game_id).await?;
        for rulebook_id in rulebook_ids {
            self.index.delete_rulebook(rulebook_id).await?;
        }
        info!(game_id, "Game deleted");
        Ok(())
    }
}

struct JobStats {
    pages: usize,
    chunks: usize,
}

/// Reduce an uploaded filename to a safe single path component
pub fn sanitize_filename(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "rulebook.pdf".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Derive a game title from an uploaded filename (`catan_rules.pdf` → `catan_rules`)
pub fn title_from_filename(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Untitled".to_string())
}
