//! Shared fakes and fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use boardgame_rag::config::{Config, VectorBackend};
use boardgame_rag::embed::Embedder;
use boardgame_rag::error::{Error, Result};
use boardgame_rag::ingest::{IngestPipeline, IngestSettings};
use boardgame_rag::meta::{MetaDb, Rulebook, RulebookStatus};
use boardgame_rag::parse::{PageExtractor, PageText};
use boardgame_rag::retrieve::RetrievalEngine;
use boardgame_rag::store::{
    ChunkPoint, MemoryIndex, SearchFilter, SearchResult, StoredPoint, VectorIndex,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

pub const DIM: usize = 16;
pub const PAGE_BREAK: char = '\x0c';

/// Deterministic bag-of-words embedder
pub struct FakeEmbedder {
    pub calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn embed_text(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIM];
    for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        let hash = blake3::hash(word.to_lowercase().as_bytes());
        let slot = hash.as_bytes()[0] as usize % DIM;
        vector[slot] += 1.0;
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    } else {
        vector[0] = 1.0;
    }
    vector
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "fake-embedder"
    }
}

/// Embedder that is unavailable for its first `failures` calls
pub struct FlakyEmbedder {
    failures: usize,
    pub calls: AtomicUsize,
}

impl FlakyEmbedder {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always_down() -> Self {
        Self::new(usize::MAX)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(Error::EmbeddingUnavailable("model server busy".to_string()));
        }
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "fake-embedder"
    }
}

/// Reads `%PDF-` bytes whose body is page texts separated by form feeds.
///
/// A body containing `CORRUPT` is rejected like an unreadable document.
pub struct StaticExtractor;

#[async_trait]
impl PageExtractor for StaticExtractor {
    async fn extract_pages(&self, bytes: Vec<u8>) -> Result<Vec<PageText>> {
        let text = String::from_utf8_lossy(&bytes);
        let body = text
            .strip_prefix("%PDF-1.4\n")
            .ok_or_else(|| Error::Extraction("Not a PDF document".to_string()))?;
        if body.contains("CORRUPT") {
            return Err(Error::Extraction("Unreadable PDF: broken xref".to_string()));
        }
        Ok(body
            .split(PAGE_BREAK)
            .enumerate()
            .map(|(i, page)| PageText::new(i + 1, page))
            .collect())
    }
}

/// Bytes the [`StaticExtractor`] understands
pub fn fake_pdf(pages: &[&str]) -> Vec<u8> {
    let mut body = String::from("%PDF-1.4\n");
    body.push_str(&pages.join(&PAGE_BREAK.to_string()));
    body.into_bytes()
}

/// Memory index whose upserts fail once `healthy_upserts` calls succeeded
pub struct FailingIndex {
    pub inner: MemoryIndex,
    healthy_upserts: usize,
    upserts: AtomicUsize,
}

impl FailingIndex {
    pub fn new(healthy_upserts: usize) -> Self {
        Self {
            inner: MemoryIndex::new(DIM),
            healthy_upserts,
            upserts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VectorIndex for FailingIndex {
    fn name(&self) -> &str {
        "failing"
    }

    fn dimension(&self) -> usize {
        DIM
    }

    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn health(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, points: Vec<ChunkPoint>) -> Result<()> {
        if self.upserts.fetch_add(1, Ordering::SeqCst) >= self.healthy_upserts {
            return Err(Error::IndexUnavailable("connection reset".to_string()));
        }
        self.inner.upsert(points).await
    }

    async fn get(&self, ids: &[Uuid]) -> Result<Vec<StoredPoint>> {
        self.inner.get(ids).await
    }

    async fn search(&self, query: Vec<f32>, limit: usize, filter: &SearchFilter) -> Result<Vec<SearchResult>> {
        self.inner.search(query, limit, filter).await
    }

    async fn delete_points(&self, ids: &[Uuid]) -> Result<()> {
        self.inner.delete_points(ids).await
    }

    async fn delete_rulebook(&self, rulebook_id: i64) -> Result<()> {
        self.inner.delete_rulebook(rulebook_id).await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }
}

/// Config rooted in `dir` with the in-memory index and fast retries
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.init_paths(Some(dir.path().to_path_buf()));
    config.vector.backend = VectorBackend::Memory;
    config.embedding.dimension = DIM;
    config.ingest.backoff_base_ms = 1;
    config.ingest.backoff_max_ms = 5;
    config.ingest.workers = 2;
    config
}

/// Database, index, embedder and pipeline wired over a temp dir
pub struct TestEnv {
    pub dir: TempDir,
    pub config: Config,
    pub db: MetaDb,
    pub index: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn Embedder>,
    pub pipeline: IngestPipeline,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with(Arc::new(MemoryIndex::new(DIM)), Arc::new(FakeEmbedder::new()), |_| {}).await
    }

    pub async fn with(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        tweak: impl FnOnce(&mut Config),
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        tweak(&mut config);
        config.validate().unwrap();

        let db = MetaDb::new(&config.paths.db_file).await.unwrap();
        let pipeline = IngestPipeline::new(
            db.clone(),
            index.clone(),
            embedder.clone(),
            Arc::new(StaticExtractor),
            IngestSettings::from_config(&config),
        );

        Self {
            dir,
            config,
            db,
            index,
            embedder,
            pipeline,
        }
    }

    pub fn retrieval(&self) -> RetrievalEngine {
        RetrievalEngine::new(self.db.clone(), self.index.clone(), self.embedder.clone(), &self.config)
    }
}

/// Poll until the rulebook leaves `pending`/`processing`
pub async fn wait_for_terminal(db: &MetaDb, rulebook_id: i64) -> Rulebook {
    for _ in 0..200 {
        let rulebook = db.get_rulebook(rulebook_id).await.unwrap().unwrap();
        match rulebook.status().unwrap() {
            RulebookStatus::Processed | RulebookStatus::Failed => return rulebook,
            _ => tokio::time::sleep(Duration::from_millis(25)).await,
        }
    }
    panic!("rulebook {} never finished processing", rulebook_id);
}
