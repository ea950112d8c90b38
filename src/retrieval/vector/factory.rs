use super::chroma::{ChromaConfig, ChromaVectorStore};
use super::sqlite::SqliteVectorStore;
use super::types::{VectorError, VectorStore};
use crate::config::Config;
use std::sync::Arc;
use tracing::info;

/// Supported vector store backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorStoreType {
    Sqlite,
    Chroma,
}

impl VectorStoreType {
    /// Parse vector store type from string
    pub fn from_str(s: &str) -> Result<Self, VectorError> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(VectorStoreType::Sqlite),
            "chroma" => Ok(VectorStoreType::Chroma),
            _ => Err(VectorError::ConfigError(format!(
                "Unsupported VECTOR_DB type: {}. Supported types: sqlite, chroma",
                s
            ))),
        }
    }
}

/// Factory for creating vector stores
pub struct VectorStoreFactory;

impl VectorStoreFactory {
    /// Create the store selected by `VECTOR_DB`
    pub async fn from_config(config: &Config) -> Result<Arc<dyn VectorStore>, VectorError> {
        let store_type = VectorStoreType::from_str(&config.vector_db)?;

        info!("Creating vector store: {:?}", store_type);

        match store_type {
            VectorStoreType::Sqlite => {
                let store =
                    SqliteVectorStore::connect(&config.sqlite_path, &config.collection_name)
                        .await?;
                Ok(Arc::new(store))
            }
            VectorStoreType::Chroma => {
                let store = ChromaVectorStore::new(
                    ChromaConfig::from_config(config),
                    &config.collection_name,
                )
                .await?;
                Ok(Arc::new(store))
            }
        }
    }
}
