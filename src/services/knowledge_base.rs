use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::retrieval::{
    split_markdown_sections, EmbeddingClient, VectorError, VectorItem, VectorStore,
};

/// What a call to [`KnowledgeBaseInitializer::initialize`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    AlreadyPopulated,
    DocumentMissing,
    NothingEmbedded,
    Ingested { stored: usize, dropped: usize },
}

impl IngestOutcome {
    /// Whether the store holds chunks after this run
    pub fn is_populated(&self) -> bool {
        matches!(
            self,
            IngestOutcome::AlreadyPopulated | IngestOutcome::Ingested { .. }
        )
    }
}

/// One-shot ingestion of the profile document into a vector store.
pub struct KnowledgeBaseInitializer<'a> {
    store: &'a dyn VectorStore,
    embeddings: &'a EmbeddingClient,
    profile_path: &'a Path,
}

impl<'a> KnowledgeBaseInitializer<'a> {
    pub fn new(
        store: &'a dyn VectorStore,
        embeddings: &'a EmbeddingClient,
        profile_path: &'a Path,
    ) -> Self {
        KnowledgeBaseInitializer {
            store,
            embeddings,
            profile_path,
        }
    }

    pub async fn initialize(&self) -> Result<IngestOutcome, VectorError> {
        if self.store.exists_and_populated().await? {
            info!(
                "Knowledge base already populated ({} backend), skipping ingestion",
                self.store.backend()
            );
            return Ok(IngestOutcome::AlreadyPopulated);
        }

        let document = match tokio::fs::read_to_string(self.profile_path).await {
            Ok(document) => document,
            Err(e) => {
                warn!(
                    "Profile document {} not readable: {}. Knowledge base stays empty",
                    self.profile_path.display(),
                    e
                );
                return Ok(IngestOutcome::DocumentMissing);
            }
        };

        let chunks = split_markdown_sections(&document);
        info!(
            "Ingesting {} chunks from {}",
            chunks.len(),
            self.profile_path.display()
        );

        let mut items = Vec::with_capacity(chunks.len());
        let mut dropped = 0;

        for (index, text) in chunks.into_iter().enumerate() {
            debug!("Embedding chunk {}", index);

            match self.embeddings.embed(&text).await.into_vector() {
                Some(vector) => items.push(VectorItem {
                    id: index as i64,
                    text,
                    vector,
                }),
                None => {
                    warn!("Dropping chunk {}: no embedding", index);
                    dropped += 1;
                }
            }
        }

        if items.is_empty() {
            error!("No chunks could be embedded; knowledge base stays empty");
            return Ok(IngestOutcome::NothingEmbedded);
        }

        let stored = items.len();
        self.store.insert_all(items).await?;

        info!(
            "Knowledge base ready: {} chunks stored, {} dropped",
            stored, dropped
        );
        Ok(IngestOutcome::Ingested { stored, dropped })
    }
}
