use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("text decode error in {path}: {details}")]
    Decode { path: PathBuf, details: String },

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported source type: {0}")]
    UnsupportedSource(String),

    #[error("could not read text from {0}")]
    EmptyDocument(String),

    #[error(transparent)]
    Embedding(#[from] EmbedError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from {backend}: {details}")]
    Backend { backend: String, details: String },

    #[error("embedding shape mismatch: {0}")]
    Shape(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("no index found in {dir}; build an index first")]
    NotFound { dir: PathBuf },

    #[error("index in {dir} is corrupted: {details}")]
    Corrupted { dir: PathBuf, details: String },

    #[error("vector dimension {actual} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index was built with embedder `{index_model}` but queried with `{query_model}`")]
    EmbedderMismatch {
        index_model: String,
        query_model: String,
    },

    #[error("cannot build an index from zero chunks")]
    EmptyBuild,

    #[error("{vectors} vectors cannot pair with {metadata} metadata rows")]
    RowMismatch { vectors: usize, metadata: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid response from {backend}: {details}")]
    Backend { backend: String, details: String },

    #[error("completion client unavailable: {0}")]
    Unavailable(String),

    #[error("completion response had no content")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Embedding(#[from] EmbedError),

    #[error(transparent)]
    Completion(#[from] CompletionError),
}

impl IndexError {
    /// True for conditions the caller can fix by building an index.
    pub fn is_not_found(&self) -> bool {
        matches!(self, IndexError::NotFound { .. })
    }
}
