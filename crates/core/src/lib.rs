pub mod chunking;
pub mod completion;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod quiz;
pub mod retriever;
pub mod store;
pub mod stores;
pub mod traits;

pub use chunking::{chunk_words, segment_document, split_by_headings, ChunkingConfig};
pub use completion::{CompletionConfig, OpenAiCompatibleClient};
pub use config::RetrievalConfig;
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, HttpEmbedder, HttpEmbedderConfig,
    DEFAULT_EMBEDDING_DIMENSIONS, LOCAL_EMBED_MODEL,
};
pub use error::{CompletionError, EmbedError, GenerateError, IndexError, IngestError};
pub use extractor::{load_source_text, PageText, PdfExtractor, SourceKind};
pub use ingest::{
    discover_source_files, ingest_folder_best_effort, ingest_single_document, IngestionReport,
    SkippedSource,
};
pub use models::{Chunk, Metric, QuizEntry, QuizPayload, QuizQuestion, SearchHit, SourceDocument};
pub use normalize::TextNormalizer;
pub use orchestrator::{BuildSummary, QuizCoordinator};
pub use quiz::{mock_payload, parse_quiz_output, QuizGenerator};
pub use retriever::{build_context, Retriever, KEY_CONCEPTS_QUERY};
pub use store::{IndexStore, METADATA_FILE, VECTOR_FILE};
pub use stores::FlatIndex;
pub use traits::{CompletionClient, VectorIndex};
