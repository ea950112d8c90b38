pub mod chroma;
pub mod factory;
pub mod sqlite;
pub mod types;

pub use factory::VectorStoreFactory;
pub use sqlite::SqliteVectorStore;
pub use types::{ScoredChunk, VectorError, VectorItem, VectorStore};
