use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::retrieval::{
    EmbeddingClient, EmbeddingFactory, VectorError, VectorStore, VectorStoreFactory,
};
use crate::services::generation::{AnswerGenerator, GenerationFactory, Persona};
use crate::services::knowledge_base::{IngestOutcome, KnowledgeBaseInitializer};
use crate::services::retriever::{build_context, Retriever};

/// Answer returned when retrieval produced no context.
pub const INSUFFICIENT_INFORMATION: &str =
    "I don't have enough information in my profile to answer that.";

/// Retrieve-then-generate pipeline over the profile knowledge base.
///
/// Built once at startup and shared read-only between request handlers.
/// [`RagEngine::initialize`] must complete before the first call to
/// [`RagEngine::answer`].
pub struct RagEngine {
    embeddings: EmbeddingClient,
    store: Arc<dyn VectorStore>,
    generator: AnswerGenerator,
    profile_path: PathBuf,
    top_k: usize,
    ready: AtomicBool,
}

impl RagEngine {
    pub fn new(
        embeddings: EmbeddingClient,
        store: Arc<dyn VectorStore>,
        generator: AnswerGenerator,
        profile_path: PathBuf,
        top_k: usize,
    ) -> Self {
        Self {
            embeddings,
            store,
            generator,
            profile_path,
            top_k,
            ready: AtomicBool::new(false),
        }
    }

    /// Wire up providers and the vector store from configuration.
    ///
    /// Fails when an engine has no API key or the store cannot be opened.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http = config.http_client()?;

        let embedding_provider = EmbeddingFactory::from_config(config, http.clone())?;
        let generation_provider = GenerationFactory::from_config(config, http)?;
        let store = VectorStoreFactory::from_config(config).await?;

        info!(
            "RAG engine: embeddings={} generation={} store={}",
            embedding_provider.model_name(),
            generation_provider.model_name(),
            store.backend()
        );

        Ok(Self::new(
            EmbeddingClient::new(embedding_provider, config.embedding_dimension),
            store,
            AnswerGenerator::new(
                generation_provider,
                Persona::new(&config.persona_name, &config.persona_role),
                config.temperature,
            ),
            PathBuf::from(&config.profile_path),
            config.top_k,
        ))
    }

    /// Populate the knowledge base if needed and record readiness.
    pub async fn initialize(&self) -> Result<IngestOutcome, VectorError> {
        let initializer =
            KnowledgeBaseInitializer::new(self.store.as_ref(), &self.embeddings, &self.profile_path);

        let outcome = initializer.initialize().await?;
        self.ready.store(outcome.is_populated(), Ordering::SeqCst);

        if !outcome.is_populated() {
            warn!("Knowledge base is empty ({:?}); answers will fall back", outcome);
        }
        Ok(outcome)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Answer `question` from the knowledge base.
    ///
    /// Always yields a displayable string: the fallback when nothing was
    /// retrieved, or an error description when generation fails.
    pub async fn answer(&self, question: &str) -> String {
        let chunks = Retriever::new(self.store.as_ref(), &self.embeddings)
            .retrieve(question, self.top_k)
            .await;

        if chunks.is_empty() {
            info!("No context retrieved, returning fallback answer");
            return INSUFFICIENT_INFORMATION.to_string();
        }

        let context = build_context(&chunks);

        match self.generator.generate(&context, question).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Generation failed: {}", e);
                format!("Error generating response: {}", e)
            }
        }
    }
}
