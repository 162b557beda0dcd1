//! Embedding generation
//!
//! This module provides an abstraction over embedding models with:
//! - A trait shared by ingestion and retrieval
//! - HTTP embedding backend (default)
//! - Local FastEmbed backend behind the `local-embed` feature

#[cfg(feature = "local-embed")]
mod fastembed_impl;
mod http_backend;

#[cfg(feature = "local-embed")]
pub use fastembed_impl::FastEmbedder;
pub use http_backend::HttpEmbedder;

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for embedding providers
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts; one vector per input, in order
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.backend {
        EmbeddingBackend::Http => Ok(Arc::new(HttpEmbedder::new(config)?)),
        #[cfg(feature = "local-embed")]
        EmbeddingBackend::Local => Ok(Arc::new(FastEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embed"))]
        EmbeddingBackend::Local => Err(Error::Config(
            "embedding.backend = \"local\" requires building with the local-embed feature"
                .to_string(),
        )),
    }
}

/// Check that a backend answered with one vector of the right size per input
pub(crate) fn validate_embeddings(
    embeddings: &[Vec<f32>],
    expected_count: usize,
    dimension: usize,
    model: &str,
) -> Result<()> {
    if embeddings.len() != expected_count {
        return Err(Error::Embedding(format!(
            "Model '{}' returned {} embeddings for {} inputs",
            model,
            embeddings.len(),
            expected_count
        )));
    }

    if let Some(mismatch) = embeddings.iter().find(|vec| vec.len() != dimension) {
        return Err(Error::Embedding(format!(
            "Embedding dimension mismatch for model '{}': expected {}, got {}",
            model,
            dimension,
            mismatch.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_embeddings() {
        let good = vec![vec![0.0; 4], vec![1.0; 4]];
        assert!(validate_embeddings(&good, 2, 4, "m").is_ok());

        let short = validate_embeddings(&good, 3, 4, "m").unwrap_err();
        assert!(short.to_string().contains("returned 2 embeddings for 3 inputs"));

        let wrong_dim = validate_embeddings(&good, 2, 8, "m").unwrap_err();
        assert!(matches!(wrong_dim, Error::Embedding(_)));
        assert!(!wrong_dim.is_transient());
    }

    #[cfg(not(feature = "local-embed"))]
    #[test]
    fn test_local_backend_requires_feature() {
        let config = EmbeddingConfig {
            backend: EmbeddingBackend::Local,
            ..Default::default()
        };
        assert!(matches!(create_embedder(&config), Err(Error::Config(_))));
    }
}
