use crate::embeddings::Embedder;
use crate::error::{GenerateError, IndexError};
use crate::models::SearchHit;
use crate::store::IndexStore;
use tracing::debug;

/// Query used when a quiz is generated without a user question.
pub const KEY_CONCEPTS_QUERY: &str =
    "Generate multiple choice questions covering the key concepts in this document.";

pub const CONTEXT_DELIMITER: &str = "\n---\n";

pub struct Retriever<'a, E: Embedder> {
    embedder: &'a E,
    store: &'a IndexStore,
}

impl<'a, E: Embedder> Retriever<'a, E> {
    /// Fails when the embedder cannot have produced the stored vectors.
    pub fn new(embedder: &'a E, store: &'a IndexStore) -> Result<Self, IndexError> {
        let query_model = embedder.model_id();
        if query_model != store.header().model {
            return Err(IndexError::EmbedderMismatch {
                index_model: store.header().model.clone(),
                query_model,
            });
        }
        if embedder.dimensions() != store.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: store.dimension(),
                actual: embedder.dimensions(),
            });
        }
        Ok(Self { embedder, store })
    }

    /// Ranked hits for `query`, best first. Normalisation for the index
    /// metric is applied by the store.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, GenerateError> {
        let vector = self.embedder.embed_one(query)?;
        let hits = self.store.query(&vector, top_k)?;
        debug!(
            top_k,
            returned = hits.len(),
            metric = %self.store.metric(),
            "retrieved chunks"
        );
        Ok(hits)
    }

    pub fn retrieve_key_concepts(&self, top_k: usize) -> Result<Vec<SearchHit>, GenerateError> {
        self.retrieve(KEY_CONCEPTS_QUERY, top_k)
    }
}

pub fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| hit.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_DELIMITER)
}
