//! Payload schema for vector index points

use crate::error::{Error, Result};
use qdrant_client::qdrant::{PointStruct, Value as QdrantValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Stable point id for a chunk: the same rulebook and index always map to
/// the same id, so retried upserts overwrite instead of duplicating.
pub fn chunk_point_id(rulebook_id: i64, chunk_index: usize) -> Uuid {
    let name = format!("rulebook:{}:chunk:{}", rulebook_id, chunk_index);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

/// A point ready to be upserted to the index
#[derive(Debug, Clone)]
pub struct ChunkPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

impl ChunkPoint {
    /// Convert to qdrant-client PointStruct
    pub fn to_point_struct(self) -> PointStruct {
        let payload_map = self.payload.to_qdrant_payload();
        PointStruct::new(self.id.to_string(), self.vector, payload_map)
    }
}

/// Payload stored with each chunk vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    /// Game scope, copied from the rulebook at write time
    pub game_id: i64,

    pub rulebook_id: i64,

    /// 1-based page the chunk was cut from
    pub page_number: i64,

    /// Position of the chunk within the rulebook
    pub chunk_index: i64,

    pub text: String,

    /// Hash of the chunk content
    pub chunk_hash: String,

    /// Model that produced the vector
    pub embedding_model: String,
}

impl ChunkPayload {
    /// Convert to Qdrant payload format
    pub fn to_qdrant_payload(self) -> HashMap<String, QdrantValue> {
        let mut map = HashMap::new();

        map.insert("game_id".to_string(), int_to_qdrant(self.game_id));
        map.insert("rulebook_id".to_string(), int_to_qdrant(self.rulebook_id));
        map.insert("page_number".to_string(), int_to_qdrant(self.page_number));
        map.insert("chunk_index".to_string(), int_to_qdrant(self.chunk_index));
        map.insert("text".to_string(), string_to_qdrant(&self.text));
        map.insert("chunk_hash".to_string(), string_to_qdrant(&self.chunk_hash));
        map.insert(
            "embedding_model".to_string(),
            string_to_qdrant(&self.embedding_model),
        );

        map
    }

    /// Rebuild a payload from its JSON form, rejecting incomplete points
    pub fn from_json_map(map: Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(map))
            .map_err(|e| Error::Index(format!("Malformed chunk payload: {}", e)))
    }
}

fn string_to_qdrant(s: &str) -> QdrantValue {
    QdrantValue {
        kind: Some(qdrant_client::qdrant::value::Kind::StringValue(s.to_string())),
    }
}

fn int_to_qdrant(i: i64) -> QdrantValue {
    QdrantValue {
        kind: Some(qdrant_client::qdrant::value::Kind::IntegerValue(i)),
    }
}

/// Convert Qdrant value to serde_json Value
pub(crate) fn json_from_qdrant_value(v: QdrantValue) -> Value {
    use qdrant_client::qdrant::value::Kind;

    match v.kind {
        Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => Value::Array(
            list.values
                .into_iter()
                .map(json_from_qdrant_value)
                .collect(),
        ),
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, json_from_qdrant_value(v)))
                .collect(),
        ),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ChunkPayload {
        ChunkPayload {
            game_id: 3,
            rulebook_id: 11,
            page_number: 2,
            chunk_index: 5,
            text: "Each player draws two cards.".to_string(),
            chunk_hash: "hash123".to_string(),
            embedding_model: "model-a".to_string(),
        }
    }

    #[test]
    fn test_point_id_is_stable() {
        assert_eq!(chunk_point_id(11, 5), chunk_point_id(11, 5));
        assert_ne!(chunk_point_id(11, 5), chunk_point_id(11, 6));
        assert_ne!(chunk_point_id(11, 5), chunk_point_id(12, 5));
    }

    #[test]
    fn test_qdrant_payload_survives_json_conversion() {
        let payload = sample();
        let map: Map<String, Value> = payload
            .clone()
            .to_qdrant_payload()
            .into_iter()
            .map(|(k, v)| (k, json_from_qdrant_value(v)))
            .collect();

        assert_eq!(ChunkPayload::from_json_map(map).unwrap(), payload);
    }

    #[test]
    fn test_incomplete_payload_is_rejected() {
        let mut map = Map::new();
        map.insert("game_id".to_string(), Value::from(1));
        assert!(matches!(
            ChunkPayload::from_json_map(map),
            Err(Error::Index(_))
        ));
    }
}
