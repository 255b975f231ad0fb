//! Document and retrieval result types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A document held by the retrieval indices.
///
/// Immutable once indexed; an update is a delete followed by a reinsert.
/// `doc_id` is unique within a creator namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Document ID
    pub doc_id: String,
    /// Document text
    pub text: String,
    /// Arbitrary metadata (creator namespace lives under "creator_id")
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Document {
    /// Create a new document
    pub fn new(doc_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            text: text.into(),
            metadata: HashMap::new(),
        }
    }

    /// Add a metadata entry
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Creator namespace this document belongs to, if any
    pub fn creator_id(&self) -> Option<&str> {
        self.metadata.get("creator_id").and_then(|v| v.as_str())
    }
}

/// A scored retrieval hit, computed per query.
///
/// All score fields are normalized to [0, 1] before they are combined or
/// compared across retrieval strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Document ID
    pub doc_id: String,
    /// Document text
    pub text: String,
    /// Metadata carried over from the document
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Combined relevance score
    pub score: f32,
    /// Score contribution from the semantic index
    pub semantic_score: f32,
    /// Score contribution from the lexical (BM25) index
    pub bm25_score: f32,
}

impl RetrievalResult {
    /// Build a result from a document with a single-source score
    pub fn from_document(doc: &Document, score: f32) -> Self {
        Self {
            doc_id: doc.doc_id.clone(),
            text: doc.text.clone(),
            metadata: doc.metadata.clone(),
            score,
            semantic_score: 0.0,
            bm25_score: 0.0,
        }
    }
}
