use super::{check_dimensions, ChunkPayload, ChunkPoint, SearchFilter, SearchResult, StoredPoint, VectorIndex};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-process vector index for development and testing.
///
/// Uses brute-force cosine similarity search. Suitable for small datasets
/// (a handful of rulebooks). For deployments, use Qdrant.
pub struct MemoryIndex {
    dimension: usize,
    points: RwLock<HashMap<Uuid, (ChunkPayload, Vec<f32>)>>,
}

impl MemoryIndex {
    /// Create a new empty index.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            points: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    fn name(&self) -> &str {
        "memory"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn health(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, points: Vec<ChunkPoint>) -> Result<()> {
        check_dimensions(&points, self.dimension, self.name())?;

        let mut stored = self.points.write().await;
        for point in points {
            stored.insert(point.id, (point.payload, point.vector));
        }
        Ok(())
    }

    async fn get(&self, ids: &[Uuid]) -> Result<Vec<StoredPoint>> {
        let stored = self.points.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| {
                stored.get(id).map(|(payload, _)| StoredPoint {
                    id: *id,
                    payload: payload.clone(),
                })
            })
            .collect())
    }

    async fn search(
        &self,
        query: Vec<f32>,
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchResult>> {
        let stored = self.points.read().await;

        let mut results: Vec<SearchResult> = stored
            .iter()
            .filter(|(_, (payload, _))| filter.matches(payload))
            .map(|(id, (payload, vector))| SearchResult {
                id: *id,
                score: cosine_similarity(&query, vector),
                payload: payload.clone(),
            })
            .collect();

        // HashMap order is random; break score ties by id so runs agree
        results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        results.truncate(limit);
        Ok(results)
    }

    async fn delete_points(&self, ids: &[Uuid]) -> Result<()> {
        let mut stored = self.points.write().await;
        for id in ids {
            stored.remove(id);
        }
        Ok(())
    }

    async fn delete_rulebook(&self, rulebook_id: i64) -> Result<()> {
        let mut stored = self.points.write().await;
        stored.retain(|_, (payload, _)| payload.rulebook_id != rulebook_id);
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.points.read().await.len())
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 means identical direction.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
