//! Embedding backend trait

use crate::Result;

/// Embedding backend interface
///
/// Fixed dimensionality per backend instance. Implementations run CPU or
/// network inference, so callers treat `encode` as potentially blocking
/// and move it off the async executor where needed.
pub trait EmbeddingBackend: Send + Sync {
    /// Encode a batch of texts into float vectors
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embedding dimension
    fn dimension(&self) -> usize;

    /// Backend name for logging
    fn name(&self) -> &str;

    /// Encode a single text
    fn encode_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.encode(&[text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| crate::Error::Rag("embedding backend returned no vector".into()))
    }
}
