use crate::error::{CompletionError, IndexError};
use crate::models::Metric;
use async_trait::async_trait;

/// Nearest-neighbour structure over row-ordered vectors.
///
/// Row positions are append-only: the `n`th vector added is row `n` for the
/// lifetime of the index.
pub trait VectorIndex {
    fn metric(&self) -> Metric;

    fn dimension(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), IndexError>;

    /// Returns up to `k` `(row, score)` pairs, best first.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, IndexError>;
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}
