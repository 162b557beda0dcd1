//! Question-time retrieval
//!
//! This module handles:
//! - Embedding a question with the ingestion embedder
//! - Searching the index within one game's processed rulebooks
//! - Deterministic ranking and page citations

use crate::config::{Config, QueryConfig};
use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use crate::store::{SearchFilter, SearchResult, VectorIndex};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// A passage returned for a question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub score: f32,
    pub game_id: i64,
    pub rulebook_id: i64,
    pub page_number: i64,
    pub chunk_index: i64,
    pub text: String,
}

impl From<SearchResult> for RetrievedChunk {
    fn from(result: SearchResult) -> Self {
        Self {
            id: result.id.to_string(),
            score: result.score,
            game_id: result.payload.game_id,
            rulebook_id: result.payload.rulebook_id,
            page_number: result.payload.page_number,
            chunk_index: result.payload.chunk_index,
            text: result.payload.text,
        }
    }
}

/// A page a passage was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Citation {
    pub rulebook_id: i64,
    pub page: i64,
}

/// Distinct `(rulebook, page)` pairs in rank order
pub fn citations(results: &[RetrievedChunk]) -> Vec<Citation> {
    let mut seen = HashSet::new();
    results
        .iter()
        .map(|r| Citation {
            rulebook_id: r.rulebook_id,
            page: r.page_number,
        })
        .filter(|c| seen.insert(*c))
        .collect()
}

/// Drop duplicates and low scores, then order best first.
///
/// Scores within `tie_epsilon` of each other fall back to document position:
/// lower chunk index, then lower rulebook id, then chunk id.
pub fn rank_results(results: Vec<SearchResult>, min_score: f32, tie_epsilon: f32) -> Vec<RetrievedChunk> {
    let mut seen = HashSet::new();
    let mut ranked: Vec<RetrievedChunk> = results
        .into_iter()
        .filter(|r| seen.insert(r.id))
        .filter(|r| r.score >= min_score)
        .map(RetrievedChunk::from)
        .collect();

    let epsilon = if tie_epsilon > 0.0 { tie_epsilon } else { f32::EPSILON };
    ranked.sort_by_cached_key(|r| {
        (
            Reverse((f64::from(r.score) / f64::from(epsilon)).round() as i64),
            r.chunk_index,
            r.rulebook_id,
            r.id.clone(),
        )
    });
    ranked
}

/// Answers questions against the indexed rulebooks of a game
pub struct RetrievalEngine {
    db: MetaDb,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    query: QueryConfig,
    embed_timeout: Duration,
    index_timeout: Duration,
}

impl RetrievalEngine {
    pub fn new(db: MetaDb, index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>, config: &Config) -> Self {
        Self {
            db,
            index,
            embedder,
            query: config.query.clone(),
            embed_timeout: config.embedding.timeout(),
            index_timeout: Duration::from_secs(config.vector.timeout_secs),
        }
    }

    /// Clamp a requested result count to `[1, max_k]`
    pub fn clamp_k(&self, k: Option<usize>) -> usize {
        k.unwrap_or(self.query.default_k)
            .clamp(1, self.query.max_k.max(1))
    }

    /// Top passages for `question` among the processed rulebooks of `game_id`
    pub async fn retrieve(&self, question: &str, game_id: i64, k: Option<usize>) -> Result<Vec<RetrievedChunk>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::Validation("Question must not be empty".to_string()));
        }
        let k = self.clamp_k(k);

        if self.db.get_game(game_id).await?.is_none() {
            return Err(Error::NotFound(format!("game {}", game_id)));
        }

        let rulebook_ids = self
            .db
            .processed_rulebook_ids(game_id, self.embedder.model_name())
            .await?;
        if rulebook_ids.is_empty() {
            debug!(game_id, "No processed rulebooks; nothing to search");
            return Ok(Vec::new());
        }

        let query_vector = self.embed_question(question).await?;

        let filter = SearchFilter::for_game(game_id).with_rulebooks(rulebook_ids);
        let limit = k.saturating_mul(self.query.candidate_factor.max(1));
        let raw = tokio::time::timeout(self.index_timeout, self.index.search(query_vector, limit, &filter))
            .await
            .map_err(|_| {
                Error::IndexUnavailable(format!("search timed out after {:?}", self.index_timeout))
            })??;
        debug!(game_id, candidates = raw.len(), "Index returned candidates");

        // Backends already filter, but a stale payload must never leak across games
        let raw: Vec<SearchResult> = raw.into_iter().filter(|r| filter.matches(&r.payload)).collect();

        let mut ranked = rank_results(raw, self.query.min_score, self.query.tie_epsilon);
        ranked.truncate(k);

        info!(game_id, results = ranked.len(), "Retrieved passages");
        Ok(ranked)
    }

    async fn embed_question(&self, question: &str) -> Result<Vec<f32>> {
        let embeddings = tokio::time::timeout(self.embed_timeout, self.embedder.embed(vec![question.to_string()]))
            .await
            .map_err(|_| {
                Error::EmbeddingUnavailable(format!("question embedding timed out after {:?}", self.embed_timeout))
            })??;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("No embedding returned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ChunkPayload;
    use uuid::Uuid;

    fn result(id: u128, score: f32, rulebook_id: i64, chunk_index: i64, page: i64) -> SearchResult {
        SearchResult {
            id: Uuid::from_u128(id),
            score,
            payload: ChunkPayload {
                game_id: 1,
                rulebook_id,
                page_number: page,
                chunk_index,
                text: format!("chunk {}", chunk_index),
                chunk_hash: String::new(),
                embedding_model: "test".to_string(),
            },
        }
    }

    #[test]
    fn test_rank_orders_by_score() {
        let ranked = rank_results(
            vec![result(1, 0.2, 1, 0, 1), result(2, 0.9, 1, 1, 1), result(3, 0.5, 1, 2, 2)],
            0.0,
            1e-6,
        );
        let scores: Vec<f32> = ranked.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![0.9, 0.5, 0.2]);
    }

    #[test]
    fn test_ties_break_by_position() {
        let ranked = rank_results(
            vec![
                result(1, 0.7, 2, 0, 1),
                result(2, 0.7, 1, 3, 2),
                result(3, 0.7000001, 1, 0, 1),
            ],
            0.0,
            1e-3,
        );
        let order: Vec<(i64, i64)> = ranked.iter().map(|r| (r.chunk_index, r.rulebook_id)).collect();
        assert_eq!(order, vec![(0, 1), (0, 2), (3, 1)]);
    }

    #[test]
    fn test_rank_drops_duplicates_and_low_scores() {
        let ranked = rank_results(
            vec![result(1, 0.8, 1, 0, 1), result(1, 0.8, 1, 0, 1), result(2, 0.1, 1, 1, 1)],
            0.3,
            1e-6,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, Uuid::from_u128(1).to_string());
    }

    #[test]
    fn test_citations_are_distinct_in_rank_order() {
        let ranked = rank_results(
            vec![
                result(1, 0.9, 1, 4, 3),
                result(2, 0.8, 1, 5, 3),
                result(3, 0.7, 2, 0, 1),
                result(4, 0.6, 1, 0, 1),
            ],
            0.0,
            1e-6,
        );
        assert_eq!(
            citations(&ranked),
            vec![
                Citation { rulebook_id: 1, page: 3 },
                Citation { rulebook_id: 2, page: 1 },
                Citation { rulebook_id: 1, page: 1 },
            ]
        );
    }
}
