//! HTTP embedding backend client
//!
//! Talks to a text-embedding sidecar exposing `POST /v1/embed/text`. One call
//! is one attempt: retries belong to the caller, which knows the policy.

use super::{validate_embeddings, Embedder};
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Serialize)]
struct EmbedTextRequest<'a> {
    model: &'a str,
    inputs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Embeddings { embeddings: Vec<Vec<f32>> },
    Vectors { vectors: Vec<Vec<f32>> },
    Data { data: Vec<EmbeddingData> },
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbeddingResponse {
    fn into_embeddings(self) -> Vec<Vec<f32>> {
        match self {
            EmbeddingResponse::Embeddings { embeddings } => embeddings,
            EmbeddingResponse::Vectors { vectors } => vectors,
            EmbeddingResponse::Data { data } => data.into_iter().map(|d| d.embedding).collect(),
        }
    }
}

pub struct HttpEmbedder {
    client: Client,
    endpoint: Url,
    model: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let endpoint = embed_endpoint(&config.backend_url)?;
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            dimension: config.resolved_dimension(),
        })
    }
}

/// `{base}/v1/embed/text`, keeping any path prefix of the base URL
fn embed_endpoint(backend_url: &str) -> Result<Url> {
    let mut base_url = Url::parse(backend_url)?;
    if !base_url.path().ends_with('/') {
        let path = format!("{}/", base_url.path());
        base_url.set_path(&path);
    }
    base_url
        .join("v1/embed/text")
        .map_err(|e| Error::Config(format!("Invalid embedding backend URL: {}", e)))
}

/// Transport failures, timeouts, throttling and server errors may clear up
fn classify_status(status: StatusCode, body: &str) -> Error {
    let message = format!("embedding backend returned {}: {}", status, body.trim());
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Error::EmbeddingUnavailable(message)
    } else {
        Error::Embedding(message)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let expected = texts.len();
        debug!("Embedding {} texts with {}", expected, self.model);

        let request = EmbedTextRequest {
            model: &self.model,
            inputs: texts,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                Error::EmbeddingUnavailable(e.to_string())
            } else {
                Error::Embedding(format!("Unreadable embedding response: {}", e))
            }
        })?;

        let embeddings = parsed.into_embeddings();
        validate_embeddings(&embeddings, expected, self.dimension, &self.model)?;
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_endpoint_keeps_path_prefix() {
        let plain = embed_endpoint("http://localhost:8080").unwrap();
        assert_eq!(plain.as_str(), "http://localhost:8080/v1/embed/text");

        let prefixed = embed_endpoint("http://host/embedder").unwrap();
        assert_eq!(prefixed.as_str(), "http://host/embedder/v1/embed/text");

        let slashed = embed_endpoint("http://host/embedder/").unwrap();
        assert_eq!(slashed.as_str(), "http://host/embedder/v1/embed/text");
    }

    fn config_for(server: &MockServer, dimension: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            model: "custom-model".to_string(),
            dimension,
            backend_url: server.uri(),
            timeout_secs: 2,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_embed_accepts_embeddings_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embed/text"))
            .and(body_partial_json(json!({"model": "custom-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]
            })))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(&config_for(&server, 3)).unwrap();
        let vectors = embedder
            .embed(vec!["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1], vec![0.4, 0.5, 0.6]);
    }

    #[tokio::test]
    async fn test_embed_accepts_openai_data_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embed/text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [1.0, 0.0]}]
            })))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(&config_for(&server, 2)).unwrap();
        let vectors = embedder.embed(vec!["a".to_string()]).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0]]);
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embed/text"))
            .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(&config_for(&server, 2)).unwrap();
        let err = embedder.embed(vec!["a".to_string()]).await.unwrap_err();
        assert!(err.is_transient(), "got {err:?}");
    }

    #[tokio::test]
    async fn test_client_error_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embed/text"))
            .respond_with(ResponseTemplate::new(422).set_body_string("unknown model"))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(&config_for(&server, 2)).unwrap();
        let err = embedder.embed(vec!["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embed/text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "vectors": [[1.0, 0.0, 0.0]]
            })))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(&config_for(&server, 2)).unwrap();
        let err = embedder.embed(vec!["a".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transient() {
        let config = EmbeddingConfig {
            model: "custom-model".to_string(),
            dimension: 2,
            backend_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            ..Default::default()
        };
        let embedder = HttpEmbedder::new(&config).unwrap();
        let err = embedder.embed(vec!["a".to_string()]).await.unwrap_err();
        assert!(err.is_transient());
    }
}
