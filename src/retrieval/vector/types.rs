use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A chunk of the profile document ready to be persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorItem {
    pub id: i64,
    pub text: String,
    pub vector: Vec<f32>,
}

/// A stored chunk scored against a query vector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    pub score: f32,
    pub id: i64,
    pub text: String,
}

/// Error types for vector store operations
#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Persistence for the knowledge base.
///
/// The store is written once by `insert_all` and only read afterwards.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// True when the backing table or collection exists and holds rows
    async fn exists_and_populated(&self) -> Result<bool, VectorError>;

    /// Replace the store contents with `items`
    async fn insert_all(&self, items: Vec<VectorItem>) -> Result<(), VectorError>;

    /// Top `k` chunks by similarity to `query`, best first
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, VectorError>;

    /// Number of stored chunks
    async fn count(&self) -> Result<usize, VectorError>;

    /// Backend name for logs
    fn backend(&self) -> &'static str;
}
