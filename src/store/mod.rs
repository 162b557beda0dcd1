//! Vector index abstraction
//!
//! Chunks are stored as points (id, vector, payload). Two backends exist:
//! - Qdrant for deployments
//! - An in-process index with brute-force cosine search for development and tests

mod memory;
mod payload;
mod qdrant;

pub use memory::{cosine_similarity, MemoryIndex};
pub use payload::*;
pub use qdrant::QdrantIndex;

use crate::config::{Config, VectorBackend};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// A scored neighbour returned by a search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: Uuid,
    pub score: f32,
    pub payload: ChunkPayload,
}

/// A point read back by id (payload only)
#[derive(Debug, Clone)]
pub struct StoredPoint {
    pub id: Uuid,
    pub payload: ChunkPayload,
}

/// Search filter options
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub game_id: Option<i64>,
    pub rulebook_ids: Option<Vec<i64>>,
}

impl SearchFilter {
    pub fn for_game(game_id: i64) -> Self {
        Self {
            game_id: Some(game_id),
            rulebook_ids: None,
        }
    }

    pub fn with_rulebooks(mut self, rulebook_ids: Vec<i64>) -> Self {
        self.rulebook_ids = Some(rulebook_ids);
        self
    }

    /// Whether a payload passes this filter
    pub fn matches(&self, payload: &ChunkPayload) -> bool {
        if let Some(game_id) = self.game_id {
            if payload.game_id != game_id {
                return false;
            }
        }
        if let Some(ref ids) = self.rulebook_ids {
            if !ids.contains(&payload.rulebook_id) {
                return false;
            }
        }
        true
    }
}

/// Operations the ingestion pipeline and retrieval engine need from an index
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name for logs and status output
    fn name(&self) -> &str;

    /// Vector dimension accepted by this index
    fn dimension(&self) -> usize;

    /// Prepare the index (create collection, payload indexes)
    async fn ensure_ready(&self) -> Result<()>;

    /// Cheap reachability probe
    async fn health(&self) -> Result<()>;

    /// Insert or overwrite points by id
    async fn upsert(&self, points: Vec<ChunkPoint>) -> Result<()>;

    /// Read points by id; missing ids are skipped
    async fn get(&self, ids: &[Uuid]) -> Result<Vec<StoredPoint>>;

    /// Nearest neighbours by cosine similarity, best first
    async fn search(
        &self,
        query: Vec<f32>,
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchResult>>;

    /// Delete points by id
    async fn delete_points(&self, ids: &[Uuid]) -> Result<()>;

    /// Delete every point written for a rulebook
    async fn delete_rulebook(&self, rulebook_id: i64) -> Result<()>;

    /// Number of stored points
    async fn count(&self) -> Result<usize>;
}

/// Reject vectors whose length differs from the index dimension
pub(crate) fn check_dimensions(points: &[ChunkPoint], dimension: usize, index: &str) -> Result<()> {
    if let Some(mismatch) = points.iter().find(|p| p.vector.len() != dimension) {
        return Err(Error::Index(format!(
            "Vector dimension mismatch for index '{}': expected {} (got {})",
            index,
            dimension,
            mismatch.vector.len()
        )));
    }
    Ok(())
}

/// Build the configured index backend
pub async fn connect_index(config: &Config, dimension: usize) -> Result<Arc<dyn VectorIndex>> {
    let index: Arc<dyn VectorIndex> = match config.vector.backend {
        VectorBackend::Qdrant => Arc::new(QdrantIndex::new(
            &config.vector.qdrant_url,
            config.qdrant_api_key(),
            &config.vector.collection_name,
            dimension,
            Duration::from_secs(config.vector.timeout_secs),
        )?),
        VectorBackend::Memory => Arc::new(MemoryIndex::new(dimension)),
    };
    Ok(index)
}
