//! Custom error types for boardgame-rag

use thiserror::Error;

/// Main error type for rulebook ingestion and retrieval
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Vector index error: {0}")]
    Index(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid status transition for rulebook {rulebook_id}: {from} -> {to}")]
    InvalidTransition {
        rulebook_id: i64,
        from: String,
        to: String,
    },

    #[error("Already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Transient collaborator failures that the pipeline retries with backoff
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::EmbeddingUnavailable(_) | Error::IndexUnavailable(_)
        )
    }
}

/// Result type alias for boardgame-rag
pub type Result<T> = std::result::Result<T, Error>;

/// Qdrant transport failures surface as an unavailable index
impl From<qdrant_client::QdrantError> for Error {
    fn from(err: qdrant_client::QdrantError) -> Self {
        Error::IndexUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::EmbeddingUnavailable("down".into()).is_transient());
        assert!(Error::IndexUnavailable("down".into()).is_transient());
        assert!(!Error::Extraction("corrupt".into()).is_transient());
        assert!(!Error::Validation("bad".into()).is_transient());
        assert!(!Error::Embedding("dimension mismatch".into()).is_transient());
    }

    #[test]
    fn test_transition_message() {
        let err = Error::InvalidTransition {
            rulebook_id: 7,
            from: "processed".to_string(),
            to: "processing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid status transition for rulebook 7: processed -> processing"
        );
    }
}
