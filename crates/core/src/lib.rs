//! Core traits and types for the DM assistant
//!
//! This crate provides foundational types used across all other crates:
//! - Core traits for pluggable backends (LLM, embeddings, vector store)
//! - Document and retrieval result types
//! - Conversation types
//! - Error types

pub mod conversation;
pub mod document;
pub mod error;
pub mod message;
pub mod traits;

pub use conversation::{Turn, TurnRole};
pub use document::{Document, RetrievalResult};
pub use error::{Error, Result};
pub use message::{ChatMessage, Role};

pub use traits::{
    // LLM
    LanguageModel,
    // Embeddings
    EmbeddingBackend,
    // Vector search
    VectorBackend,
    // Alerting
    AlertEvent, AlertSink, NullAlertSink,
};
