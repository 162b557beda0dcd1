//! Default values for configuration

/// Default HTTP bind address
pub fn default_bind_addr() -> String {
    "127.0.0.1:8000".to_string()
}

/// Default project name shown by the root endpoint
pub fn default_project_name() -> String {
    "Boardgame RAG".to_string()
}

/// Default API prefix
pub fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

/// Default maximum upload size (16 MiB)
pub fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

/// Content types accepted by the upload endpoint
pub fn default_allowed_content_types() -> Vec<String> {
    vec!["application/pdf".to_string()]
}

/// Origins allowed by the CORS layer
pub fn default_cors_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}

/// Default Qdrant gRPC URL for local development (port 6334, not 6333 REST)
pub fn default_qdrant_url() -> String {
    "http://127.0.0.1:6334".to_string()
}

/// Default environment variable name for Qdrant API key
pub fn default_qdrant_api_key_env() -> String {
    "QDRANT_API_KEY".to_string()
}

/// Default collection name
pub fn default_collection_name() -> String {
    "rulebook_chunks".to_string()
}

/// Default timeout for a single vector index call
pub fn default_vector_timeout() -> u64 {
    10
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

/// Default embedding dimension (matches the default model)
pub fn default_embedding_dimension() -> usize {
    384
}

/// Default batch size for embedding
pub fn default_embedding_batch_size() -> usize {
    32
}

/// Default embedding backend URL
pub fn default_embedding_backend_url() -> String {
    "http://127.0.0.1:7997".to_string()
}

/// Default timeout for a single embedding call
pub fn default_embedding_timeout() -> u64 {
    30
}

/// Default chunk window in characters
pub fn default_chunk_window() -> usize {
    500
}

/// Default overlap between neighbouring chunks
pub fn default_chunk_overlap() -> usize {
    50
}

/// Default minimum chunk size
pub fn default_chunk_min_chars() -> usize {
    20
}

/// Default number of ingestion workers
pub fn default_ingest_workers() -> usize {
    2
}

/// Default ingestion queue capacity
pub fn default_ingest_queue_capacity() -> usize {
    64
}

/// Default attempts per embedding batch
pub fn default_embed_max_attempts() -> u32 {
    4
}

/// Default attempts per vector index sub-batch
pub fn default_index_max_attempts() -> u32 {
    3
}

/// Default points per vector index upsert
pub fn default_index_batch_size() -> usize {
    64
}

/// Default first backoff delay
pub fn default_backoff_base_ms() -> u64 {
    200
}

/// Default backoff ceiling
pub fn default_backoff_max_ms() -> u64 {
    5_000
}

/// Default timeout for a whole ingestion job
pub fn default_job_timeout() -> u64 {
    600
}

/// Default number of passages returned
pub fn default_query_k() -> usize {
    5
}

/// Default maximum passages a caller may request
pub fn default_query_max_k() -> usize {
    50
}

/// Default minimum similarity score
pub fn default_query_min_score() -> f32 {
    0.0
}

/// Default over-fetch factor for index queries
pub fn default_candidate_factor() -> usize {
    2
}

/// Default tolerance below which two scores tie
pub fn default_tie_epsilon() -> f32 {
    1e-6
}
