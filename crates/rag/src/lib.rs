//! Retrieval for the DM assistant
//!
//! Features:
//! - Query expansion with domain synonyms and acronyms
//! - In-memory BM25 lexical index
//! - Semantic index over a pluggable embedding backend and vector store
//! - Hybrid fusion of lexical and semantic rankings
//!
//! The hybrid layer's availability contract is "never worse than semantic
//! alone": a lexical failure degrades to semantic-only results.

pub mod bm25;
pub mod query_expansion;
pub mod retriever;
pub mod semantic;

pub use bm25::{Bm25Config, Bm25Index};
pub use query_expansion::QueryExpander;
pub use retriever::{HybridRetriever, RetrieverConfig, SearchOptions};
pub use semantic::{FlatVectorStore, HashEmbedder, SemanticIndex};

use thiserror::Error;

/// Retrieval errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<RagError> for dm_assistant_core::Error {
    fn from(err: RagError) -> Self {
        dm_assistant_core::Error::Rag(err.to_string())
    }
}

impl From<dm_assistant_core::Error> for RagError {
    fn from(err: dm_assistant_core::Error) -> Self {
        RagError::Search(err.to_string())
    }
}
