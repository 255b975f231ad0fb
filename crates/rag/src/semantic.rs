//! Semantic index
//!
//! Ranks documents by embedding-space similarity through an injected
//! `EmbeddingBackend` and `VectorBackend`. When neither is configured
//! the index lazily falls back to a deterministic hash embedder and a
//! flat in-memory store, keeping the pipeline functional in
//! reduced-quality mode instead of failing.

use crate::RagError;
use dm_assistant_core::{Document, EmbeddingBackend, RetrievalResult, VectorBackend};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Flat in-memory vector store with brute-force L2 search.
///
/// Append-only: deletion is not supported, matching the contract of the
/// ANN structures this stands in for.
pub struct FlatVectorStore {
    vectors: RwLock<Vec<Vec<f32>>>,
}

impl FlatVectorStore {
    pub fn new() -> Self {
        Self {
            vectors: RwLock::new(Vec::new()),
        }
    }
}

impl Default for FlatVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorBackend for FlatVectorStore {
    fn add(&self, vectors: &[Vec<f32>]) -> dm_assistant_core::Result<usize> {
        let mut store = self.vectors.write();
        let first_index = store.len();
        store.extend(vectors.iter().cloned());
        Ok(first_index)
    }

    fn search(&self, query: &[f32], k: usize) -> dm_assistant_core::Result<(Vec<f32>, Vec<usize>)> {
        let store = self.vectors.read();
        let mut scored: Vec<(f32, usize)> = store
            .iter()
            .enumerate()
            .map(|(i, v)| (l2_distance(query, v), i))
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        let (distances, indices) = scored.into_iter().unzip();
        Ok((distances, indices))
    }

    fn len(&self) -> usize {
        self.vectors.read().len()
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Deterministic hash-based embedder.
///
/// Meaningless as a semantic signal but stable across calls, which keeps
/// tests and degraded deployments reproducible.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl EmbeddingBackend for HashEmbedder {
    fn encode(&self, texts: &[String]) -> dm_assistant_core::Result<Vec<Vec<f32>>> {
        let vectors = texts
            .iter()
            .map(|text| {
                let mut embedding = vec![0.0f32; self.dimension];
                for (i, c) in text.chars().enumerate() {
                    let idx = (c as usize + i) % self.dimension;
                    embedding[idx] += 1.0;
                }
                let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for v in &mut embedding {
                        *v /= norm;
                    }
                }
                embedding
            })
            .collect();
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hash-embedder"
    }
}

struct Backends {
    embedder: Arc<dyn EmbeddingBackend>,
    store: Arc<dyn VectorBackend>,
}

/// Embedding-based nearest-neighbor index
pub struct SemanticIndex {
    backends: RwLock<Option<Backends>>,
    /// Vector index -> document. Deletion removes the entry here; the
    /// vector itself stays in the store until a full rebuild.
    lookup: RwLock<HashMap<usize, Document>>,
}

impl SemanticIndex {
    /// Create an index that lazily falls back to the mock backends
    pub fn new() -> Self {
        Self {
            backends: RwLock::new(None),
            lookup: RwLock::new(HashMap::new()),
        }
    }

    /// Create an index over explicit backends
    pub fn with_backends(
        embedder: Arc<dyn EmbeddingBackend>,
        store: Arc<dyn VectorBackend>,
    ) -> Self {
        Self {
            backends: RwLock::new(Some(Backends { embedder, store })),
            lookup: RwLock::new(HashMap::new()),
        }
    }

    fn ensure_backends(&self) {
        let mut guard = self.backends.write();
        if guard.is_none() {
            tracing::warn!(
                "no embedding backend configured, using hash embedder (reduced quality)"
            );
            *guard = Some(Backends {
                embedder: Arc::new(HashEmbedder::default()),
                store: Arc::new(FlatVectorStore::new()),
            });
        }
    }

    fn embedder(&self) -> Arc<dyn EmbeddingBackend> {
        self.ensure_backends();
        Arc::clone(&self.backends.read().as_ref().expect("initialized").embedder)
    }

    fn store(&self) -> Arc<dyn VectorBackend> {
        self.ensure_backends();
        Arc::clone(&self.backends.read().as_ref().expect("initialized").store)
    }

    /// Embed and append a document.
    ///
    /// Embedding inference is CPU-bound, so it runs off the async
    /// executor.
    pub async fn add_document(&self, doc: Document) -> Result<(), RagError> {
        let embedder = self.embedder();
        let text = doc.text.clone();
        let vector = tokio::task::spawn_blocking(move || embedder.encode_one(&text))
            .await
            .map_err(|e| RagError::Embedding(format!("embedding task failed: {e}")))?
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        let index = self
            .store()
            .add(&[vector])
            .map_err(|e| RagError::VectorStore(e.to_string()))?;
        self.lookup.write().insert(index, doc);
        Ok(())
    }

    /// Nearest neighbors for a query, with optional post-hoc creator
    /// namespace filtering.
    ///
    /// Distance converts to a score via `1 / (1 + distance)`, bounded
    /// (0, 1]. Filtering happens after retrieval, so a sparse namespace
    /// can under-return; callers needing exact counts must over-fetch.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        namespace_filter: Option<&str>,
    ) -> Result<Vec<RetrievalResult>, RagError> {
        if self.lookup.read().is_empty() {
            return Ok(Vec::new());
        }

        let embedder = self.embedder();
        let query_owned = query.to_string();
        let query_vector = tokio::task::spawn_blocking(move || embedder.encode_one(&query_owned))
            .await
            .map_err(|e| RagError::Embedding(format!("embedding task failed: {e}")))?
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        let (distances, indices) = self
            .store()
            .search(&query_vector, top_k)
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        let lookup = self.lookup.read();
        let mut results = Vec::with_capacity(indices.len());
        for (distance, index) in distances.into_iter().zip(indices) {
            // Tombstoned vectors have no lookup entry
            let doc = match lookup.get(&index) {
                Some(doc) => doc,
                None => continue,
            };
            if let Some(namespace) = namespace_filter {
                if doc.creator_id() != Some(namespace) {
                    continue;
                }
            }
            let score = 1.0 / (1.0 + distance);
            let mut result = RetrievalResult::from_document(doc, score);
            result.semantic_score = score;
            results.push(result);
        }
        Ok(results)
    }

    /// Remove a document from the lookup.
    ///
    /// The backing vector store does not support point deletion, so the
    /// vector remains until a full reindex; this only makes the document
    /// unreachable.
    pub fn delete_document(&self, doc_id: &str) -> Result<(), RagError> {
        let mut lookup = self.lookup.write();
        let index = lookup
            .iter()
            .find(|(_, doc)| doc.doc_id == doc_id)
            .map(|(index, _)| *index);
        match index {
            Some(index) => {
                lookup.remove(&index);
                tracing::debug!(doc_id, "document tombstoned, vector remains until reindex");
                Ok(())
            }
            None => Err(RagError::NotFound(doc_id.to_string())),
        }
    }

    /// Number of reachable documents
    pub fn len(&self) -> usize {
        self.lookup.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.read().is_empty()
    }
}

impl Default for SemanticIndex {
    fn default() -> Self {
        Self::new()
    }
}
