use crate::chunking::ChunkingConfig;
use crate::embeddings::{DEFAULT_EMBEDDING_DIMENSIONS, LOCAL_EMBED_MODEL};
use crate::error::IngestError;
use crate::models::Metric;
use std::path::PathBuf;

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;
pub const DEFAULT_COMPLETION_MODEL: &str = "openai/gpt-oss-20b";
pub const DEFAULT_COMPLETION_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Process-wide settings, built once at startup and handed to the
/// components that need them.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub embed_model: String,
    pub embed_base_url: Option<String>,
    pub embed_api_key: Option<String>,
    pub embed_dimensions: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub index_dir: PathBuf,
    pub data_dir: PathBuf,
    pub metric: Metric,
    pub use_mock: bool,
    pub completion_model: String,
    pub completion_base_url: String,
    pub completion_api_key: Option<String>,
    /// Chunks retrieved to ground one quiz.
    pub context_chunks: usize,
    pub question_count: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            embed_model: LOCAL_EMBED_MODEL.to_string(),
            embed_base_url: None,
            embed_api_key: None,
            embed_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            index_dir: PathBuf::from("indices"),
            data_dir: PathBuf::from("data"),
            metric: Metric::Cosine,
            use_mock: true,
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            completion_base_url: DEFAULT_COMPLETION_BASE_URL.to_string(),
            completion_api_key: None,
            context_chunks: 3,
            question_count: 10,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        self.chunking()?;

        if self.embed_dimensions == 0 {
            return Err(IngestError::InvalidArgument(
                "embedding dimensions must be positive".to_string(),
            ));
        }

        if self.embed_model != LOCAL_EMBED_MODEL && self.embed_base_url.is_none() {
            return Err(IngestError::InvalidArgument(format!(
                "embed model `{}` needs an embeddings base url",
                self.embed_model
            )));
        }

        if self.context_chunks == 0 {
            return Err(IngestError::InvalidArgument(
                "context chunk count must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn chunking(&self) -> Result<ChunkingConfig, IngestError> {
        ChunkingConfig::new(self.chunk_size, self.chunk_overlap)
    }
}
