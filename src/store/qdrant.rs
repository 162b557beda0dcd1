//! Qdrant vector database integration
//!
//! Every client call is bounded by the configured per-call timeout; expiry and
//! transport failures surface as [`Error::IndexUnavailable`] so the ingestion
//! pipeline can retry them.

use super::payload::json_from_qdrant_value;
use super::{check_dimensions, ChunkPayload, ChunkPoint, SearchFilter, SearchResult, StoredPoint, VectorIndex};
use crate::error::{Error, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Distance, FieldType, Filter, GetCollectionInfoResponse, GetPointsBuilder,
    PointId, PointStruct, ScalarQuantizationBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Qdrant, QdrantError};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Payload fields that get an integer index for filtered search
const INDEXED_FIELDS: [&str; 2] = ["game_id", "rulebook_id"];

/// Qdrant index handle
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    dimension: usize,
    timeout: Duration,
}

impl QdrantIndex {
    /// Create a client for the given URL and collection. No request is made
    /// until the first call.
    pub fn new(
        url: &str,
        api_key: Option<String>,
        collection: &str,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self> {
        debug!("Connecting to Qdrant at {}", url);

        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .timeout(timeout)
            .skip_compatibility_check()
            .build()
            .map_err(|e| Error::Config(format!("Invalid Qdrant configuration: {}", e)))?;

        Ok(Self {
            client,
            collection: collection.to_string(),
            dimension,
            timeout,
        })
    }

    async fn call<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, QdrantError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::IndexUnavailable(format!(
                "Qdrant {} on '{}' timed out after {:?}",
                operation, self.collection, self.timeout
            ))),
        }
    }

    async fn collection_vector_sizes(&self) -> Result<Option<Vec<(String, u64)>>> {
        let info = self
            .call("collection_info", self.client.collection_info(&self.collection))
            .await?;
        Ok(extract_vector_sizes(&info))
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    fn name(&self) -> &str {
        &self.collection
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    /// Ensure the collection exists with the configured dimension
    async fn ensure_ready(&self) -> Result<()> {
        let exists = self
            .call("collection_exists", self.client.collection_exists(&self.collection))
            .await?;

        if exists {
            debug!("Collection {} already exists", self.collection);

            if let Some(sizes) = self.collection_vector_sizes().await? {
                if sizes.len() > 1 {
                    return Err(Error::Index(format!(
                        "Collection '{}' uses named vectors ({}) which are not supported",
                        self.collection,
                        describe_vector_sizes(&sizes)
                    )));
                }

                if let Some((_, size)) = sizes.first() {
                    if *size as usize != self.dimension {
                        return Err(Error::Index(format!(
                            "Collection '{}' has vector size {}, but the embedding model produces {}. Use a new collection name or re-ingest with the matching model.",
                            self.collection, size, self.dimension
                        )));
                    }
                }
            }

            return Ok(());
        }

        info!(
            "Creating collection {} with dimension {}",
            self.collection, self.dimension
        );

        let vectors_config = VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine);
        self.call(
            "create_collection",
            self.client.create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(vectors_config)
                    .quantization_config(ScalarQuantizationBuilder::default()),
            ),
        )
        .await?;

        for field in INDEXED_FIELDS {
            self.call(
                "create_field_index",
                self.client.create_field_index(CreateFieldIndexCollectionBuilder::new(
                    &self.collection,
                    field,
                    FieldType::Integer,
                )),
            )
            .await?;
        }

        info!("Collection {} created successfully", self.collection);
        Ok(())
    }

    async fn health(&self) -> Result<()> {
        self.call("health_check", self.client.health_check()).await?;
        Ok(())
    }

    async fn upsert(&self, points: Vec<ChunkPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        check_dimensions(&points, self.dimension, &self.collection)?;

        debug!(
            "Upserting {} points to collection {}",
            points.len(),
            self.collection
        );

        let point_structs: Vec<PointStruct> =
            points.into_iter().map(|p| p.to_point_struct()).collect();

        self.call(
            "upsert",
            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, point_structs).wait(true)),
        )
        .await?;

        Ok(())
    }

    async fn get(&self, ids: &[Uuid]) -> Result<Vec<StoredPoint>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let point_ids: Vec<PointId> = ids.iter().map(|id| PointId::from(id.to_string())).collect();
        let response = self
            .call(
                "get",
                self.client.get_points(
                    GetPointsBuilder::new(&self.collection, point_ids)
                        .with_payload(true)
                        .with_vectors(false),
                ),
            )
            .await?;

        response
            .result
            .into_iter()
            .filter_map(|p| {
                let id = p.id.as_ref().and_then(point_id_to_uuid)?;
                Some(payload_from_qdrant(p.payload).map(|payload| StoredPoint { id, payload }))
            })
            .collect()
    }

    async fn search(
        &self,
        query: Vec<f32>,
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchResult>> {
        debug!(
            "Searching collection {} with limit {}",
            self.collection, limit
        );

        let mut search_builder = SearchPointsBuilder::new(&self.collection, query, limit as u64)
            .with_payload(true);

        if let Some(qdrant_filter) = to_qdrant_filter(filter) {
            search_builder = search_builder.filter(qdrant_filter);
        }

        let response = self
            .call("search", self.client.search_points(search_builder))
            .await?;

        response
            .result
            .into_iter()
            .filter_map(|p| {
                let id = p.id.as_ref().and_then(point_id_to_uuid)?;
                Some(payload_from_qdrant(p.payload).map(|payload| SearchResult {
                    id,
                    score: p.score,
                    payload,
                }))
            })
            .collect()
    }

    async fn delete_points(&self, ids: &[Uuid]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        debug!(
            "Deleting {} points from collection {}",
            ids.len(),
            self.collection
        );

        let point_ids: Vec<PointId> = ids.iter().map(|id| PointId::from(id.to_string())).collect();
        self.call(
            "delete",
            self.client
                .delete_points(DeletePointsBuilder::new(&self.collection).points(point_ids).wait(true)),
        )
        .await?;

        Ok(())
    }

    async fn delete_rulebook(&self, rulebook_id: i64) -> Result<()> {
        debug!(rulebook_id, "Deleting rulebook points from {}", self.collection);

        let filter = Filter::must([Condition::matches("rulebook_id", rulebook_id)]);
        self.call(
            "delete",
            self.client
                .delete_points(DeletePointsBuilder::new(&self.collection).points(filter).wait(true)),
        )
        .await?;

        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .call(
                "count",
                self.client
                    .count(CountPointsBuilder::new(&self.collection).exact(true)),
            )
            .await?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }
}

fn to_qdrant_filter(filter: &SearchFilter) -> Option<Filter> {
    let mut must_conditions: Vec<Condition> = Vec::new();

    if let Some(game_id) = filter.game_id {
        must_conditions.push(Condition::matches("game_id", game_id));
    }

    if let Some(ref rulebook_ids) = filter.rulebook_ids {
        must_conditions.push(Condition::matches("rulebook_id", rulebook_ids.clone()));
    }

    if must_conditions.is_empty() {
        return None;
    }

    Some(Filter::must(must_conditions))
}

fn payload_from_qdrant(payload: HashMap<String, QdrantValue>) -> Result<ChunkPayload> {
    let map: Map<String, Value> = payload
        .into_iter()
        .map(|(k, v)| (k, json_from_qdrant_value(v)))
        .collect();
    ChunkPayload::from_json_map(map)
}

fn describe_vector_sizes(sizes: &[(String, u64)]) -> String {
    sizes
        .iter()
        .map(|(name, size)| format!("{}:{}", name, size))
        .collect::<Vec<_>>()
        .join(", ")
}

fn extract_vector_sizes(info: &GetCollectionInfoResponse) -> Option<Vec<(String, u64)>> {
    let result = info.result.as_ref()?;
    let config = result.config.as_ref()?;
    let params = config.params.as_ref()?;
    let vectors_config = params.vectors_config.as_ref()?;
    let config = vectors_config.config.as_ref()?;

    match config {
        qdrant_client::qdrant::vectors_config::Config::Params(params) => {
            Some(vec![("default".to_string(), params.size)])
        }
        qdrant_client::qdrant::vectors_config::Config::ParamsMap(map) => {
            let sizes: Vec<(String, u64)> = map
                .map
                .iter()
                .map(|(name, params)| (name.clone(), params.size))
                .collect();
            if sizes.is_empty() {
                None
            } else {
                Some(sizes)
            }
        }
    }
}

/// Convert PointId to UUID
fn point_id_to_uuid(id: &PointId) -> Option<Uuid> {
    match &id.point_id_options {
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(uuid_str)) => {
            Uuid::try_parse(uuid_str).ok()
        }
        _ => None,
    }
}
