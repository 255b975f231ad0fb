//! Vector store trait

use crate::Result;

/// Vector store interface
///
/// Append-only by design: the underlying nearest-neighbor structures do
/// not support efficient point deletion, so a "deleted" vector stays in
/// the store until a full rebuild. Callers that need true deletion must
/// reindex.
pub trait VectorBackend: Send + Sync {
    /// Append vectors, returning the index assigned to the first one
    fn add(&self, vectors: &[Vec<f32>]) -> Result<usize>;

    /// Nearest neighbors by L2 distance.
    ///
    /// Returns `(distances, indices)` sorted by ascending distance,
    /// at most `k` entries.
    fn search(&self, query: &[f32], k: usize) -> Result<(Vec<f32>, Vec<usize>)>;

    /// Number of stored vectors (including tombstoned ones)
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
