pub mod chunking;
pub mod embeddings;
pub mod similarity;
pub mod vector;

pub use chunking::split_markdown_sections;
pub use embeddings::{EmbeddingClient, EmbeddingFactory};
pub use vector::{VectorError, VectorItem, VectorStore, VectorStoreFactory};
