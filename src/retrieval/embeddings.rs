use async_openai::{
    config::OpenAIConfig,
    types::{CreateEmbeddingRequest, EmbeddingInput},
    Client,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::Config;

/// Error types for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Outcome of embedding one piece of text.
///
/// `Empty` means the embedding is unavailable; callers skip the text
/// instead of failing.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingResult {
    Success(Vec<f32>),
    Empty,
}

impl EmbeddingResult {
    pub fn into_vector(self) -> Option<Vec<f32>> {
        match self {
            EmbeddingResult::Success(vector) => Some(vector),
            EmbeddingResult::Empty => None,
        }
    }
}

/// Trait for remote embedding providers
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text. Providers may return several results; the
    /// first one is used.
    async fn embed(&self, text: &str) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Fail-soft wrapper around an [`EmbeddingProvider`].
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    dimension: usize,
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, dimension: usize) -> Self {
        Self {
            provider,
            dimension,
        }
    }

    /// Embed `text`, mapping every failure to [`EmbeddingResult::Empty`].
    pub async fn embed(&self, text: &str) -> EmbeddingResult {
        let embeddings = match self.provider.embed(text).await {
            Ok(embeddings) => embeddings,
            Err(e) => {
                error!("Embedding failed: {}", e);
                return EmbeddingResult::Empty;
            }
        };

        match embeddings.into_iter().next() {
            Some(vector) if vector.len() == self.dimension => EmbeddingResult::Success(vector),
            Some(vector) => {
                warn!(
                    "Embedding from {} has dimension {}, expected {}",
                    self.provider.model_name(),
                    vector.len(),
                    self.dimension
                );
                EmbeddingResult::Empty
            }
            None => {
                warn!(
                    "Embedding model {} returned no embeddings",
                    self.provider.model_name()
                );
                EmbeddingResult::Empty
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedResponse {
    embedding: Option<GeminiEmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbeddingValues {
    values: Vec<f32>,
}

/// Gemini `embedContent` provider
pub struct GeminiEmbeddings {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiEmbeddings {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str, model: &str) -> Self {
        let model = model.trim_start_matches("models/").to_string();

        info!("Initialized Gemini embeddings: model={}", model);

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model,
        }
    }

    fn endpoint_url(&self) -> String {
        format!("{}/models/{}:embedContent", self.base_url, self.model)
    }

    fn parse_response(body: &str) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let response: GeminiEmbedResponse = serde_json::from_str(body)
            .map_err(|e| EmbeddingError::InvalidResponse(format!("Invalid JSON: {}", e)))?;

        Ok(response
            .embedding
            .map(|embedding| vec![embedding.values])
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for GeminiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let payload = json!({
            "model": format!("models/{}", self.model),
            "content": {
                "parts": [{ "text": text }]
            }
        });

        debug!("Requesting Gemini embedding for {} chars", text.len());

        let response = self
            .client
            .post(self.endpoint_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| EmbeddingError::ApiError(format!("Request to Gemini failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EmbeddingError::ApiError(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(EmbeddingError::ApiError(format!(
                "Gemini embedding failed: {} - {}",
                status, body
            )));
        }

        Self::parse_response(&body)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// OpenAI-compatible embedding provider
pub struct OpenAIEmbeddings {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIEmbeddings {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str, model: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        let client = Client::with_config(config).with_http_client(http);

        info!("Initialized OpenAI embeddings: model={}", model);

        Self {
            client,
            model: model.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAIEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = CreateEmbeddingRequest {
            model: self.model.clone(),
            input: EmbeddingInput::String(text.to_string()),
            encoding_format: None,
            user: None,
            dimensions: None,
        };

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| EmbeddingError::ApiError(format!("OpenAI API error: {}", e)))?;

        Ok(response
            .data
            .into_iter()
            .map(|embedding| embedding.embedding)
            .collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Factory for creating embedding providers
pub struct EmbeddingFactory;

impl EmbeddingFactory {
    /// Create the provider selected by `RAG_EMBEDDING_ENGINE`
    pub fn from_config(
        config: &Config,
        http: reqwest::Client,
    ) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
        let engine = config.embedding_engine.as_str();

        info!("Creating embedding provider: {}", engine);

        let api_key = config.api_key_for(engine);

        match (engine, api_key) {
            ("gemini", Some(key)) => Ok(Arc::new(GeminiEmbeddings::new(
                http,
                &config.gemini_base_url,
                key,
                &config.embedding_model,
            ))),
            ("openai", Some(key)) => Ok(Arc::new(OpenAIEmbeddings::new(
                http,
                &config.openai_base_url,
                key,
                &config.embedding_model,
            ))),
            ("gemini", None) | ("openai", None) => Err(EmbeddingError::ConfigError(format!(
                "No API key configured for embedding engine: {}",
                engine
            ))),
            _ => Err(EmbeddingError::ConfigError(format!(
                "Unsupported embedding engine: {}. Supported: gemini, openai",
                engine
            ))),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Deterministic provider for tests. Texts listed in `failing` produce
    /// an API error; everything else maps to `vector_for(text)`.
    pub(crate) struct FakeEmbeddings {
        pub dimension: usize,
        pub failing: HashSet<String>,
        pub vectors: Vec<(String, Vec<f32>)>,
    }

    impl FakeEmbeddings {
        pub(crate) fn new(dimension: usize) -> Self {
            Self {
                dimension,
                failing: HashSet::new(),
                vectors: Vec::new(),
            }
        }

        pub(crate) fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
            self.vectors.push((text.to_string(), vector));
            self
        }

        pub(crate) fn failing_on(mut self, text: &str) -> Self {
            self.failing.insert(text.to_string());
            self
        }
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for FakeEmbeddings {
        async fn embed(&self, text: &str) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            if self.failing.contains(text) {
                return Err(EmbeddingError::ApiError("rate limited".to_string()));
            }

            if let Some((_, vector)) = self.vectors.iter().find(|(t, _)| t == text) {
                return Ok(vec![vector.clone()]);
            }

            let mut vector = vec![0.0; self.dimension];
            vector[text.len() % self.dimension] = 1.0;
            Ok(vec![vector])
        }

        fn model_name(&self) -> &str {
            "fake-embedding"
        }
    }

    #[tokio::test]
    async fn test_client_returns_vector() {
        let provider = FakeEmbeddings::new(4).with_vector("hello", vec![0.1, 0.2, 0.3, 0.4]);
        let client = EmbeddingClient::new(Arc::new(provider), 4);

        assert_eq!(
            client.embed("hello").await,
            EmbeddingResult::Success(vec![0.1, 0.2, 0.3, 0.4])
        );
    }

    #[tokio::test]
    async fn test_client_swallows_provider_errors() {
        let provider = FakeEmbeddings::new(4).failing_on("boom");
        let client = EmbeddingClient::new(Arc::new(provider), 4);

        assert_eq!(client.embed("boom").await, EmbeddingResult::Empty);
    }

    #[tokio::test]
    async fn test_client_rejects_wrong_dimension() {
        let provider = FakeEmbeddings::new(4).with_vector("short", vec![1.0, 0.0]);
        let client = EmbeddingClient::new(Arc::new(provider), 4);

        assert_eq!(client.embed("short").await, EmbeddingResult::Empty);
    }

    #[test]
    fn test_parse_gemini_response() {
        let body = r#"{"embedding": {"values": [0.5, -0.25, 1.0]}}"#;
        let parsed = GeminiEmbeddings::parse_response(body).unwrap();
        assert_eq!(parsed, vec![vec![0.5, -0.25, 1.0]]);
    }

    #[test]
    fn test_parse_gemini_response_without_embedding() {
        let parsed = GeminiEmbeddings::parse_response("{}").unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_parse_gemini_response_malformed() {
        assert!(matches!(
            GeminiEmbeddings::parse_response("not json"),
            Err(EmbeddingError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_gemini_endpoint_strips_model_prefix() {
        let provider = GeminiEmbeddings::new(
            reqwest::Client::new(),
            "https://example.test/v1beta/",
            "key",
            "models/text-embedding-004",
        );
        assert_eq!(
            provider.endpoint_url(),
            "https://example.test/v1beta/models/text-embedding-004:embedContent"
        );
    }

    #[test]
    fn test_factory_requires_api_key() {
        let config = Config::default();
        let result = EmbeddingFactory::from_config(&config, reqwest::Client::new());
        assert!(matches!(result, Err(EmbeddingError::ConfigError(_))));
    }

    #[test]
    fn test_factory_rejects_unknown_engine() {
        let config = Config {
            embedding_engine: "word2vec".to_string(),
            ..Config::default()
        };
        let result = EmbeddingFactory::from_config(&config, reqwest::Client::new());
        assert!(matches!(result, Err(EmbeddingError::ConfigError(_))));
    }

    #[tokio::test]
    #[ignore] // Requires GEMINI_API_KEY
    async fn test_gemini_embeddings_live() {
        let key = std::env::var("GEMINI_API_KEY").unwrap();
        let config = Config::default();
        let provider = GeminiEmbeddings::new(
            reqwest::Client::new(),
            &config.gemini_base_url,
            &key,
            &config.embedding_model,
        );
        let client = EmbeddingClient::new(Arc::new(provider), config.embedding_dimension);

        let vector = client.embed("Hello world").await.into_vector().unwrap();
        assert_eq!(vector.len(), 768);
    }
}
