use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use url::Url;

use crate::{SemanticError, similarity::l2_normalize};

/// Embedding provider contract: text in, unit-norm vectors out.
///
/// Implementations may be slow on the first call (model load) and are
/// expected to be fast afterwards; every call site bounds them with the
/// configured timeout.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts. The result has one vector per input, in
    /// input order, each L2-normalized.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SemanticError>;

    /// Dimensionality of the vectors this provider produces.
    fn dimensions(&self) -> usize;
}

/// Lazily initialized embedder handle.
///
/// Construction of the inner embedder is deferred to the first `embed`
/// call, happens at most once per process, and is retried on the next call
/// if it failed.
pub struct LazyEmbedder<F> {
    init: F,
    dimensions: usize,
    inner: OnceCell<Box<dyn Embedder>>,
}

impl<F, Fut> LazyEmbedder<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Box<dyn Embedder>, SemanticError>> + Send,
{
    /// Wrap an initializer producing the real embedder on first use.
    pub fn new(dimensions: usize, init: F) -> Self {
        Self {
            init,
            dimensions,
            inner: OnceCell::new(),
        }
    }
}

#[async_trait]
impl<F, Fut> Embedder for LazyEmbedder<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Box<dyn Embedder>, SemanticError>> + Send,
{
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SemanticError> {
        let inner = self.inner.get_or_try_init(|| (self.init)()).await?;
        inner.embed(texts).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedder speaking the OpenAI-compatible `/embeddings` protocol.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
    dimensions: usize,
}

impl HttpEmbedder {
    /// Build a client for the given endpoint. `base_url` is the API root;
    /// `/embeddings` is appended.
    pub fn new(
        base_url: &Url,
        api_key: Option<&SecretString>,
        model: impl Into<String>,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self, SemanticError> {
        let mut headers = reqwest::header::HeaderMap::new();

        if let Some(key) = api_key {
            let value = format!("Bearer {}", key.expose_secret())
                .parse()
                .map_err(|_| {
                    SemanticError::EmbeddingUnavailable("API key is not a valid header value".into())
                })?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| SemanticError::EmbeddingUnavailable(err.to_string()))?;

        let endpoint = base_url
            .join("embeddings")
            .map_err(|err| SemanticError::EmbeddingUnavailable(err.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            model: model.into(),
            dimensions,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SemanticError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|err| SemanticError::EmbeddingUnavailable(err.to_string()))?
            .error_for_status()
            .map_err(|err| SemanticError::EmbeddingUnavailable(err.to_string()))?;

        let mut body: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|err| SemanticError::EmbeddingUnavailable(err.to_string()))?;

        if body.data.len() != texts.len() {
            return Err(SemanticError::EmbeddingShape {
                expected: texts.len(),
                got: body.data.len(),
            });
        }

        // The protocol does not promise response order; the index field does.
        body.data.sort_by_key(|datum| datum.index);

        Ok(body
            .data
            .into_iter()
            .map(|datum| {
                let mut vector = datum.embedding;
                l2_normalize(&mut vector);
                vector
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
