//! In-memory BM25 lexical index
//!
//! Ranks a fixed corpus by term-overlap relevance. Index statistics
//! (document frequency, idf, average length) are global across the
//! corpus, so any corpus change requires a re-fit; `remove_document`
//! rebuilds from the remaining documents for that reason.

use dm_assistant_core::{Document, RetrievalResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").expect("static regex"));

/// BM25 tuning parameters
#[derive(Debug, Clone, Copy)]
pub struct Bm25Config {
    /// Term-frequency saturation
    pub k1: f32,
    /// Length normalization
    pub b: f32,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// Lexical index over a per-creator document corpus
pub struct Bm25Index {
    config: Bm25Config,
    documents: Vec<Document>,
    /// Per-document term frequencies, parallel to `documents`
    term_freqs: Vec<HashMap<String, f32>>,
    /// Token count per document, parallel to `documents`
    doc_lens: Vec<f32>,
    /// Inverse document frequency per term
    idf: HashMap<String, f32>,
    avgdl: f32,
}

impl Bm25Index {
    pub fn new(config: Bm25Config) -> Self {
        Self {
            config,
            documents: Vec::new(),
            term_freqs: Vec::new(),
            doc_lens: Vec::new(),
            idf: HashMap::new(),
            avgdl: 0.0,
        }
    }

    /// Tokenize: lowercase word tokens, keeping only tokens longer than
    /// 2 characters. This drops short stopword-like tokens as a side
    /// effect, including meaningful short tokens such as "ia"; the query
    /// expander is expected to widen those before they reach the index.
    fn tokenize(text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        WORD_RE
            .find_iter(&lower)
            .map(|m| m.as_str().to_string())
            .filter(|token| token.chars().count() > 2)
            .collect()
    }

    /// Build index statistics from a corpus, replacing any previous fit.
    pub fn fit(&mut self, corpus: Vec<Document>) {
        self.documents = corpus;
        self.term_freqs.clear();
        self.doc_lens.clear();
        self.idf.clear();

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut total_len = 0.0f32;

        for doc in &self.documents {
            let tokens = Self::tokenize(&doc.text);
            total_len += tokens.len() as f32;
            self.doc_lens.push(tokens.len() as f32);

            let mut freqs: HashMap<String, f32> = HashMap::new();
            for token in tokens {
                *freqs.entry(token).or_insert(0.0) += 1.0;
            }
            for term in freqs.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            self.term_freqs.push(freqs);
        }

        let n = self.documents.len() as f32;
        if n > 0.0 {
            self.avgdl = total_len / n;
            for (term, df) in doc_freq {
                let df = df as f32;
                self.idf
                    .insert(term, ((n - df + 0.5) / (df + 0.5) + 1.0).ln());
            }
        } else {
            self.avgdl = 0.0;
        }
    }

    /// Top-k documents by descending BM25 score.
    ///
    /// Zero-scoring documents are excluded; ties keep corpus order.
    /// Empty corpus or a query with no surviving tokens returns an empty
    /// list, never an error.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<RetrievalResult> {
        if self.documents.is_empty() {
            return Vec::new();
        }
        let query_tokens = Self::tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let k1 = self.config.k1;
        let b = self.config.b;

        let mut scored: Vec<(usize, f32)> = Vec::new();
        for (i, freqs) in self.term_freqs.iter().enumerate() {
            let doc_len = self.doc_lens[i];
            let mut score = 0.0f32;
            for term in &query_tokens {
                let freq = match freqs.get(term) {
                    Some(f) => *f,
                    None => continue,
                };
                let idf = self.idf.get(term).copied().unwrap_or(0.0);
                let denom = freq + k1 * (1.0 - b + b * doc_len / self.avgdl);
                score += idf * freq * (k1 + 1.0) / denom;
            }
            if score > 0.0 {
                scored.push((i, score));
            }
        }

        // Stable sort keeps corpus order on ties
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(top_k)
            .map(|(i, score)| {
                let mut result = RetrievalResult::from_document(&self.documents[i], score);
                result.bm25_score = score;
                result.semantic_score = 0.0;
                result
            })
            .collect()
    }

    /// Remove a document and rebuild the global statistics.
    pub fn remove_document(&mut self, doc_id: &str) {
        let remaining: Vec<Document> = self
            .documents
            .iter()
            .filter(|d| d.doc_id != doc_id)
            .cloned()
            .collect();
        if remaining.len() != self.documents.len() {
            tracing::debug!(doc_id, "removing document, re-fitting BM25 statistics");
            self.fit(remaining);
        }
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new(Bm25Config::default())
    }
}
