use tracing::{debug, error, warn};

use crate::retrieval::{EmbeddingClient, VectorStore};

/// Separator placed between retrieved chunks in the prompt context
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

pub struct Retriever<'a> {
    store: &'a dyn VectorStore,
    embeddings: &'a EmbeddingClient,
}

impl<'a> Retriever<'a> {
    pub fn new(store: &'a dyn VectorStore, embeddings: &'a EmbeddingClient) -> Self {
        Retriever { store, embeddings }
    }

    /// Texts of the `k` chunks closest to `query`, best first.
    ///
    /// Never fails: an unusable query embedding or a store error yields an
    /// empty result.
    pub async fn retrieve(&self, query: &str, k: usize) -> Vec<String> {
        let Some(vector) = self.embeddings.embed(query).await.into_vector() else {
            warn!("Query embedding unavailable, retrieving nothing");
            return Vec::new();
        };

        match self.store.search(&vector, k).await {
            Ok(results) => {
                debug!(
                    "Retrieved {} chunks from {} (top score: {:?})",
                    results.len(),
                    self.store.backend(),
                    results.first().map(|r| r.score)
                );
                results.into_iter().map(|r| r.text).collect()
            }
            Err(e) => {
                error!("Vector search failed: {}", e);
                Vec::new()
            }
        }
    }
}

pub fn build_context(chunks: &[String]) -> String {
    chunks.join(CONTEXT_DELIMITER)
}
