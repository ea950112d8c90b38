use super::types::{ScoredChunk, VectorError, VectorItem, VectorStore};
use crate::config::Config;
use crate::retrieval::similarity::rank_top_k;
use async_trait::async_trait;
use chromadb::client::{ChromaAuthMethod, ChromaClient as ChromaDbClient, ChromaClientOptions};
use chromadb::collection::{ChromaCollection, CollectionEntries, QueryOptions};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Configuration for ChromaDB
#[derive(Debug, Clone)]
pub struct ChromaConfig {
    pub url: Option<String>,
    pub database: String,
    pub auth: ChromaAuthMethod,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            url: None,
            database: "default_database".to_string(),
            auth: ChromaAuthMethod::None,
        }
    }
}

impl ChromaConfig {
    pub fn from_config(config: &Config) -> Self {
        let auth = match &config.chroma_auth_token {
            Some(token) => ChromaAuthMethod::TokenAuth {
                token: token.clone(),
                header: chromadb::client::ChromaTokenHeader::Authorization,
            },
            None => ChromaAuthMethod::None,
        };

        Self {
            url: config.chroma_url.clone(),
            database: config.chroma_database.clone(),
            auth,
        }
    }
}

/// Vector-native store backed by a Chroma collection.
///
/// Ranking is delegated to Chroma's nearest-neighbour query over a
/// collection created in cosine space.
pub struct ChromaVectorStore {
    client: ChromaDbClient,
    collection_name: String,
}

impl ChromaVectorStore {
    pub async fn new(config: ChromaConfig, collection_name: &str) -> Result<Self, VectorError> {
        info!(
            "Initializing ChromaDB client: {:?} (database: {})",
            config.url, config.database
        );

        let options = ChromaClientOptions {
            url: config.url,
            database: config.database,
            auth: config.auth,
        };

        let client = ChromaDbClient::new(options).await.map_err(|e| {
            VectorError::ConnectionError(format!("Failed to connect to ChromaDB: {}", e))
        })?;

        info!("Successfully connected to ChromaDB");

        Ok(Self {
            client,
            collection_name: collection_name.to_string(),
        })
    }

    /// The collection, or `None` if it has not been created yet.
    ///
    /// Any other failure (server down, auth, timeout) is an error.
    async fn existing_collection(&self) -> Result<Option<ChromaCollection>, VectorError> {
        match self.client.get_collection(&self.collection_name).await {
            Ok(collection) => Ok(Some(collection)),
            Err(e) => {
                let message = format!("{:#}", e);
                if is_missing_collection(&message) {
                    debug!("Collection '{}' does not exist", self.collection_name);
                    Ok(None)
                } else {
                    Err(VectorError::ConnectionError(format!(
                        "Failed to get collection '{}': {}",
                        self.collection_name, message
                    )))
                }
            }
        }
    }

    fn cosine_space() -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("hnsw:space".to_string(), Value::String("cosine".to_string()));
        metadata
    }

    fn items_to_entries<'a>(
        ids: &'a [String],
        items: &'a [VectorItem],
    ) -> CollectionEntries<'a> {
        CollectionEntries {
            ids: ids.iter().map(|id| id.as_str()).collect(),
            embeddings: Some(items.iter().map(|item| item.vector.clone()).collect()),
            metadatas: None,
            documents: Some(items.iter().map(|item| item.text.as_str()).collect()),
        }
    }
}

/// Whether a `get_collection` error means the collection is absent, as
/// opposed to the server being unreachable or rejecting the request.
fn is_missing_collection(message: &str) -> bool {
    let message = message.to_lowercase();
    ["does not exist", "not found", "notfounderror"]
        .iter()
        .any(|marker| message.contains(marker))
}

/// Zip one row of a Chroma query result into scored chunks.
///
/// Chroma reports cosine *distance*; the score is `1 - distance`.
fn to_scored_chunks(ids: Vec<String>, documents: Vec<String>, distances: Vec<f32>) -> Vec<ScoredChunk> {
    ids.into_iter()
        .zip(documents)
        .zip(distances)
        .filter_map(|((id, text), distance)| match id.parse::<i64>() {
            Ok(id) => Some(ScoredChunk {
                score: 1.0 - distance,
                id,
                text,
            }),
            Err(_) => {
                warn!("Skipping Chroma record with non-numeric id: {}", id);
                None
            }
        })
        .collect()
}

#[async_trait]
impl VectorStore for ChromaVectorStore {
    async fn exists_and_populated(&self) -> Result<bool, VectorError> {
        Ok(self.count().await? > 0)
    }

    async fn insert_all(&self, items: Vec<VectorItem>) -> Result<(), VectorError> {
        if items.is_empty() {
            debug!("No items to insert into collection: {}", self.collection_name);
            return Ok(());
        }

        // Overwrite: drop whatever a previous, possibly interrupted, run left
        if self.existing_collection().await?.is_some() {
            info!("Recreating collection: {}", self.collection_name);
            self.client
                .delete_collection(&self.collection_name)
                .await
                .map_err(|e| {
                    VectorError::DatabaseError(format!(
                        "Failed to delete collection '{}': {}",
                        self.collection_name, e
                    ))
                })?;
        }

        let collection = self
            .client
            .get_or_create_collection(&self.collection_name, Some(Self::cosine_space()))
            .await
            .map_err(|e| {
                VectorError::DatabaseError(format!(
                    "Failed to create collection '{}': {}",
                    self.collection_name, e
                ))
            })?;

        info!(
            "Inserting {} items into collection: {}",
            items.len(),
            self.collection_name
        );

        let ids: Vec<String> = items.iter().map(|item| item.id.to_string()).collect();
        let entries = Self::items_to_entries(&ids, &items);

        collection.add(entries, None).await.map_err(|e| {
            VectorError::OperationError(format!(
                "Failed to insert items into collection '{}': {}",
                self.collection_name, e
            ))
        })?;

        info!(
            "Successfully inserted {} items into collection: {}",
            items.len(),
            self.collection_name
        );
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, VectorError> {
        let Some(collection) = self.existing_collection().await? else {
            return Ok(Vec::new());
        };

        debug!(
            "Searching collection '{}' with limit: {}",
            self.collection_name, k
        );

        let query_options = QueryOptions {
            query_embeddings: Some(vec![query.to_vec()]),
            query_texts: None,
            n_results: Some(k),
            where_metadata: None,
            where_document: None,
            include: Some(vec!["documents", "distances"]),
        };

        let result = collection.query(query_options, None).await.map_err(|e| {
            VectorError::OperationError(format!(
                "Failed to search collection '{}': {}",
                self.collection_name, e
            ))
        })?;

        let ids = result.ids.into_iter().next().unwrap_or_default();
        let documents = result
            .documents
            .and_then(|docs| docs.into_iter().next())
            .unwrap_or_default();
        let distances = result
            .distances
            .and_then(|dists| dists.into_iter().next())
            .unwrap_or_default();

        Ok(rank_top_k(to_scored_chunks(ids, documents, distances), k))
    }

    async fn count(&self) -> Result<usize, VectorError> {
        let Some(collection) = self.existing_collection().await? else {
            return Ok(0);
        };

        collection.count().await.map_err(|e| {
            VectorError::DatabaseError(format!(
                "Failed to count collection '{}': {}",
                self.collection_name, e
            ))
        })
    }

    fn backend(&self) -> &'static str {
        "chroma"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_scored_chunks_converts_distance() {
        let chunks = to_scored_chunks(
            vec!["0".to_string(), "3".to_string()],
            vec!["## A".to_string(), "## B".to_string()],
            vec![0.0, 0.75],
        );

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, 0);
        assert_eq!(chunks[0].score, 1.0);
        assert_eq!(chunks[1].id, 3);
        assert_eq!(chunks[1].score, 0.25);
    }

    #[test]
    fn test_to_scored_chunks_skips_foreign_ids() {
        let chunks = to_scored_chunks(
            vec!["doc-1".to_string(), "2".to_string()],
            vec!["x".to_string(), "y".to_string()],
            vec![0.1, 0.2],
        );

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "y");
    }

    #[test]
    fn test_missing_collection_errors() {
        assert!(is_missing_collection(
            "400 Bad Request: {\"error\":\"ValueError('Collection profile_chunks does not exist.')\"}"
        ));
        assert!(is_missing_collection(
            "404 Not Found: {\"error\":\"NotFoundError\",\"message\":\"Collection [profile_chunks] does not exists\"}"
        ));
    }

    #[test]
    fn test_outage_errors_are_not_missing_collection() {
        assert!(!is_missing_collection(
            "error sending request for url (http://localhost:8000/api/v2/heartbeat): Connection refused (os error 111)"
        ));
        assert!(!is_missing_collection("401 Unauthorized: {\"error\":\"AuthError\"}"));
        assert!(!is_missing_collection("operation timed out"));
    }

    #[test]
    fn test_config_uses_token_auth() {
        let config = Config {
            chroma_auth_token: Some("secret".to_string()),
            chroma_url: Some("http://localhost:8000".to_string()),
            ..Config::default()
        };
        let chroma = ChromaConfig::from_config(&config);

        assert_eq!(chroma.url.as_deref(), Some("http://localhost:8000"));
        assert!(matches!(chroma.auth, ChromaAuthMethod::TokenAuth { .. }));
    }

    // Note: These tests require a running Chroma instance
    // Run with: docker run -p 8000:8000 chromadb/chroma

    #[tokio::test]
    #[ignore]
    async fn test_insert_and_search() {
        let store = ChromaVectorStore::new(ChromaConfig::default(), "portfolio_rag_test")
            .await
            .unwrap();

        store
            .insert_all(vec![
                VectorItem {
                    id: 0,
                    text: "## Skills".to_string(),
                    vector: vec![1.0, 0.0],
                },
                VectorItem {
                    id: 1,
                    text: "## Hobbies".to_string(),
                    vector: vec![0.0, 1.0],
                },
            ])
            .await
            .unwrap();

        assert!(store.exists_and_populated().await.unwrap());

        let results = store.search(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(results[0].id, 0);

        // Re-ingesting overwrites instead of appending
        store
            .insert_all(vec![VectorItem {
                id: 0,
                text: "## Skills".to_string(),
                vector: vec![1.0, 0.0],
            }])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
