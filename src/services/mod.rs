pub mod generation;
pub mod knowledge_base;
pub mod rag;
pub mod retriever;

pub use rag::RagEngine;
