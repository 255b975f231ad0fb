//! Hybrid retriever
//!
//! Merges lexical (BM25) and semantic rankings into one ordered list.
//! Each side's scores are normalized by that side's own max before
//! combining, so the top hit per index contributes 1.0.

use crate::{Bm25Index, QueryExpander, RagError, SemanticIndex};
use dm_assistant_core::{Document, RetrievalResult};
use parking_lot::RwLock;
use std::collections::HashMap;

#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

/// Retriever configuration
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Weight of the BM25 side in the combined score (0.0 - 1.0)
    pub bm25_weight: f32,
    /// Expansion variants fed to the lexical query
    pub max_query_expansions: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            bm25_weight: 0.3,
            max_query_expansions: 3,
        }
    }
}

/// Per-search options
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Post-hoc creator namespace filter for the semantic side
    pub namespace_filter: Option<String>,
    /// When false, return semantic-only results
    pub use_hybrid: bool,
}

impl SearchOptions {
    pub fn hybrid() -> Self {
        Self {
            namespace_filter: None,
            use_hybrid: true,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace_filter = Some(namespace.into());
        self
    }
}

/// Combined lexical + semantic retriever
pub struct HybridRetriever {
    config: RetrieverConfig,
    bm25: RwLock<Bm25Index>,
    semantic: SemanticIndex,
    expander: QueryExpander,
    /// Corpus mirror for BM25 re-fits
    corpus: RwLock<Vec<Document>>,
    /// Failure injection for the lexical side
    #[cfg(test)]
    fail_lexical: AtomicBool,
}

impl HybridRetriever {
    pub fn new(config: RetrieverConfig) -> Self {
        Self {
            config,
            bm25: RwLock::new(Bm25Index::default()),
            semantic: SemanticIndex::new(),
            expander: QueryExpander::new(),
            corpus: RwLock::new(Vec::new()),
            #[cfg(test)]
            fail_lexical: AtomicBool::new(false),
        }
    }

    /// Build a retriever around a pre-configured semantic index
    pub fn with_semantic_index(config: RetrieverConfig, semantic: SemanticIndex) -> Self {
        Self {
            config,
            bm25: RwLock::new(Bm25Index::default()),
            semantic,
            expander: QueryExpander::new(),
            corpus: RwLock::new(Vec::new()),
            #[cfg(test)]
            fail_lexical: AtomicBool::new(false),
        }
    }

    /// Query expander, exposed for custom vocabulary registration
    pub fn expander(&self) -> &QueryExpander {
        &self.expander
    }

    /// Add a document to both indices.
    ///
    /// BM25 statistics are global, so each addition re-fits the lexical
    /// index over the mirrored corpus.
    pub async fn add_document(&self, doc: Document) -> Result<(), RagError> {
        self.semantic.add_document(doc.clone()).await?;
        let mut corpus = self.corpus.write();
        corpus.push(doc);
        self.bm25.write().fit(corpus.clone());
        Ok(())
    }

    /// Remove a document from both indices.
    ///
    /// The semantic side only tombstones (see `SemanticIndex`); the
    /// lexical side re-fits fully.
    pub async fn remove_document(&self, doc_id: &str) -> Result<(), RagError> {
        self.semantic.delete_document(doc_id)?;
        let mut corpus = self.corpus.write();
        corpus.retain(|d| d.doc_id != doc_id);
        self.bm25.write().fit(corpus.clone());
        Ok(())
    }

    /// Hybrid search.
    ///
    /// Fetches `2 * top_k` from each index before fusing; with a highly
    /// selective namespace filter the final list can still hold fewer
    /// than `top_k` hits (known under-return case).
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        options: &SearchOptions,
    ) -> Result<Vec<RetrievalResult>, RagError> {
        let fetch_k = top_k * 2;
        let semantic_results = self
            .semantic
            .search(query, fetch_k, options.namespace_filter.as_deref())
            .await?;

        if !options.use_hybrid {
            let mut results = semantic_results;
            results.truncate(top_k);
            return Ok(results);
        }

        // Lexical half: any failure degrades to semantic-only, so the
        // hybrid layer is never worse than semantic alone.
        let bm25_results = match self.search_lexical(query, fetch_k) {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(error = %e, "lexical search failed, degrading to semantic-only");
                let mut results = semantic_results;
                results.truncate(top_k);
                return Ok(results);
            }
        };

        let mut fused = self.fuse(semantic_results, bm25_results);
        fused.truncate(top_k);
        Ok(fused)
    }

    fn search_lexical(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalResult>, RagError> {
        #[cfg(test)]
        if self.fail_lexical.load(Ordering::Relaxed) {
            return Err(RagError::Index("lexical index unavailable".into()));
        }
        let tokens = self
            .expander
            .expand_tokens(query, self.config.max_query_expansions);
        let widened: String = tokens.into_iter().collect::<Vec<_>>().join(" ");
        Ok(self.bm25.read().search(&widened, top_k))
    }

    /// Max-normalize each side, then combine:
    /// `combined = semantic_norm * (1 - w) + bm25_norm * w`.
    /// A document missing from one side contributes 0 for that side.
    fn fuse(
        &self,
        semantic: Vec<RetrievalResult>,
        bm25: Vec<RetrievalResult>,
    ) -> Vec<RetrievalResult> {
        let semantic_max = max_score(&semantic);
        let bm25_max = max_score(&bm25);
        let w = self.config.bm25_weight;

        let mut merged: HashMap<String, RetrievalResult> = HashMap::new();

        for result in semantic {
            let norm = result.semantic_score / semantic_max;
            let mut entry = result;
            entry.semantic_score = norm;
            entry.bm25_score = 0.0;
            merged.insert(entry.doc_id.clone(), entry);
        }

        for result in bm25 {
            let norm = result.bm25_score / bm25_max;
            merged
                .entry(result.doc_id.clone())
                .and_modify(|entry| entry.bm25_score = norm)
                .or_insert_with(|| {
                    let mut entry = result;
                    entry.bm25_score = norm;
                    entry.semantic_score = 0.0;
                    entry
                });
        }

        let mut results: Vec<RetrievalResult> = merged
            .into_values()
            .map(|mut entry| {
                entry.score = entry.semantic_score * (1.0 - w) + entry.bm25_score * w;
                entry
            })
            .collect();
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results
    }

    /// Number of documents in the mirrored corpus
    pub fn len(&self) -> usize {
        self.corpus.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.corpus.read().is_empty()
    }
}

fn max_score(results: &[RetrievalResult]) -> f32 {
    results
        .iter()
        .map(|r| r.score)
        .fold(0.0f32, f32::max)
        .max(f32::EPSILON)
}
