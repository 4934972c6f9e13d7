use crate::chunking::ChunkingConfig;
use crate::config::RetrievalConfig;
use crate::embeddings::Embedder;
use crate::error::{GenerateError, IngestError};
use crate::ingest::{ingest_folder_best_effort, ingest_single_document, SkippedSource};
use crate::models::{Chunk, QuizPayload, SearchHit, SourceDigest};
use crate::quiz::{mock_payload, QuizGenerator};
use crate::retriever::{build_context, Retriever};
use crate::store::{BuildParams, IndexStore};
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

pub struct BuildSummary {
    pub chunk_count: usize,
    pub source_count: usize,
    pub generation: Uuid,
    pub skipped_files: Vec<SkippedSource>,
}

/// Owns the embedder and quiz generator for one process and runs the build
/// and query pipelines against `config.index_dir`.
///
/// Builds replace the index wholesale. Run at most one build at a time per
/// index directory.
pub struct QuizCoordinator<E: Embedder> {
    config: RetrievalConfig,
    chunking: ChunkingConfig,
    embedder: E,
    generator: QuizGenerator,
}

impl<E: Embedder> QuizCoordinator<E> {
    pub fn new(
        config: RetrievalConfig,
        embedder: E,
        generator: QuizGenerator,
    ) -> Result<Self, IngestError> {
        config.validate()?;
        let chunking = config.chunking()?;
        Ok(Self {
            config,
            chunking,
            embedder,
            generator,
        })
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Chunks every source in `data_dir` and builds a new index from them.
    pub fn build_from_folder(&self) -> Result<BuildSummary, IngestError> {
        let report = ingest_folder_best_effort(&self.config.data_dir, self.chunking)?;
        let chunk_count = report.chunks.len();
        let source_count = report.sources.len();

        let store = self.build_index(report.chunks, report.sources)?;
        Ok(BuildSummary {
            chunk_count,
            source_count,
            generation: store.header().generation,
            skipped_files: report.skipped_files,
        })
    }

    /// Indexes a single uploaded document, replacing the current index.
    /// Returns the number of chunks created.
    pub fn ingest_document(&self, path: &Path) -> Result<usize, IngestError> {
        let (document, chunks) = ingest_single_document(path, self.chunking)?;
        let chunk_count = chunks.len();
        info!(source = %document.source_name, chunks = chunk_count, "document segmented");

        self.build_index(chunks, vec![SourceDigest::from(&document)])?;
        Ok(chunk_count)
    }

    fn build_index(
        &self,
        chunks: Vec<Chunk>,
        sources: Vec<SourceDigest>,
    ) -> Result<IndexStore, IngestError> {
        let texts = chunks
            .iter()
            .map(|chunk| chunk.text.clone())
            .collect::<Vec<_>>();
        let embeddings = self.embedder.embed(&texts)?;

        let params = BuildParams {
            metric: self.config.metric,
            model: self.embedder.model_id(),
            dimension: self.embedder.dimensions(),
            sources,
        };
        Ok(IndexStore::build(&self.config.index_dir, params, chunks, embeddings)?)
    }

    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, GenerateError> {
        let store = IndexStore::load(&self.config.index_dir)?;
        Retriever::new(&self.embedder, &store)?.retrieve(query, top_k)
    }

    /// Retrieves context with the key-concepts query and asks the generator
    /// for `question_count` questions. With mock mode on, a missing index or
    /// a failed query embedding yields the mock quiz instead of an error.
    pub async fn generate_quiz(&self, question_count: usize) -> Result<QuizPayload, GenerateError> {
        let store = match IndexStore::load(&self.config.index_dir) {
            Ok(store) => store,
            Err(error) if error.is_not_found() && self.generator.use_mock() => {
                warn!(
                    dir = %self.config.index_dir.display(),
                    "no index built, returning mock quiz"
                );
                return Ok(mock_payload(question_count));
            }
            Err(error) => return Err(error.into()),
        };

        let retriever = Retriever::new(&self.embedder, &store)?;
        let hits = match retriever.retrieve_key_concepts(self.config.context_chunks) {
            Ok(hits) => hits,
            Err(GenerateError::Embedding(error)) if self.generator.use_mock() => {
                warn!(%error, "query embedding failed, returning mock quiz");
                return Ok(mock_payload(question_count));
            }
            Err(error) => return Err(error),
        };
        let context = build_context(&hits);

        Ok(self.generator.generate(&context, question_count).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::error::{CompletionError, EmbedError, IndexError};
    use crate::quiz::tests::ScriptedClient;
    use std::fs;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    /// Local embedder that starts returning backend errors once `down` is set.
    struct FlakyEmbedder {
        inner: CharacterNgramEmbedder,
        down: Arc<AtomicBool>,
    }

    impl Embedder for FlakyEmbedder {
        fn model_id(&self) -> String {
            self.inner.model_id()
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(EmbedError::Backend {
                    backend: "flaky".to_string(),
                    details: "503".to_string(),
                });
            }
            self.inner.embed(texts)
        }
    }

    fn flaky_coordinator(
        config: RetrievalConfig,
        generator: QuizGenerator,
    ) -> (QuizCoordinator<FlakyEmbedder>, Arc<AtomicBool>) {
        let down = Arc::new(AtomicBool::new(false));
        let embedder = FlakyEmbedder {
            inner: CharacterNgramEmbedder::default(),
            down: down.clone(),
        };
        let coordinator = QuizCoordinator::new(config, embedder, generator).expect("valid config");
        (coordinator, down)
    }

    fn config(workspace: &TempDir, chunk_size: usize, overlap: usize) -> RetrievalConfig {
        RetrievalConfig {
            chunk_size,
            chunk_overlap: overlap,
            index_dir: workspace.path().join("indices"),
            data_dir: workspace.path().join("data"),
            ..RetrievalConfig::default()
        }
    }

    fn coordinator(
        config: RetrievalConfig,
        generator: QuizGenerator,
    ) -> QuizCoordinator<CharacterNgramEmbedder> {
        QuizCoordinator::new(config, CharacterNgramEmbedder::default(), generator)
            .expect("valid config")
    }

    #[test]
    fn ingesting_a_header_document_builds_two_chunks() -> Result<(), Box<dyn std::error::Error>> {
        let workspace = tempdir()?;
        let path = workspace.path().join("lecture.txt");
        fs::write(&path, "HEADER:\nAlpha bravo charlie.")?;

        let coordinator = coordinator(config(&workspace, 2, 0), QuizGenerator::new(None, true));
        assert_eq!(coordinator.ingest_document(&path)?, 2);

        let store = IndexStore::load(&workspace.path().join("indices"))?;
        let chunks = store.chunks();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|chunk| chunk.block_id.ends_with("_block0")));
        assert!(chunks[0].chunk_id.ends_with("_chunk0"));
        assert!(chunks[1].chunk_id.ends_with("_chunk1"));
        assert_eq!(chunks[0].text, "HEADER: Alpha");
        assert_eq!(chunks[1].text, "bravo charlie.");
        assert_eq!(store.header().model, "char-trigram-128");
        Ok(())
    }

    #[test]
    fn ingesting_an_empty_document_fails() -> Result<(), Box<dyn std::error::Error>> {
        let workspace = tempdir()?;
        let path = workspace.path().join("blank.txt");
        fs::write(&path, "\n \n")?;

        let coordinator = coordinator(config(&workspace, 50, 10), QuizGenerator::new(None, true));
        assert!(matches!(
            coordinator.ingest_document(&path),
            Err(IngestError::EmptyDocument(_))
        ));
        assert!(!IndexStore::exists(&workspace.path().join("indices")));
        Ok(())
    }

    #[test]
    fn folder_build_skips_bad_sources() -> Result<(), Box<dyn std::error::Error>> {
        let workspace = tempdir()?;
        let data = workspace.path().join("data");
        fs::create_dir(&data)?;
        fs::write(data.join("biology.txt"), "CELLS\nCells are the basic unit of life.")?;
        fs::write(data.join("broken.pdf"), b"%PDF-1.4\n%broken")?;

        let coordinator = coordinator(config(&workspace, 50, 10), QuizGenerator::new(None, true));
        let summary = coordinator.build_from_folder()?;
        assert_eq!(summary.source_count, 1);
        assert_eq!(summary.chunk_count, 1);
        assert_eq!(summary.skipped_files.len(), 1);

        let hits = coordinator.search("basic unit of life", 5)?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.chunk_id, "biology_block0_chunk0");
        Ok(())
    }

    #[test]
    fn search_before_build_is_not_found() {
        let workspace = tempdir().expect("tempdir");
        let coordinator = coordinator(config(&workspace, 50, 10), QuizGenerator::new(None, true));
        assert!(matches!(
            coordinator.search("anything", 3),
            Err(GenerateError::Index(IndexError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn mock_mode_without_index_returns_mock_questions() {
        let workspace = tempdir().expect("tempdir");
        let coordinator = coordinator(config(&workspace, 50, 10), QuizGenerator::new(None, true));

        let payload = coordinator.generate_quiz(2).await.expect("mock payload");
        assert!(payload.from_mock);
        assert_eq!(payload.questions.len(), 2);

        let payload = coordinator.generate_quiz(10).await.expect("mock payload");
        assert_eq!(payload.questions.len(), 3);
    }

    #[tokio::test]
    async fn strict_mode_without_index_is_not_found() {
        let workspace = tempdir().expect("tempdir");
        let coordinator = coordinator(
            RetrievalConfig {
                use_mock: false,
                ..config(&workspace, 50, 10)
            },
            QuizGenerator::new(None, false),
        );

        assert!(matches!(
            coordinator.generate_quiz(3).await,
            Err(GenerateError::Index(IndexError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn generation_grounds_the_prompt_in_retrieved_chunks() {
        let workspace = tempdir().expect("tempdir");
        let path = workspace.path().join("physics.txt");
        fs::write(&path, "NEWTON\nForce equals mass times acceleration.").expect("write source");

        let client = Arc::new(ScriptedClient::replying(
            r#"Here you go: [{"question":"Q","choices":{"A":"a","B":"b","C":"c","D":"d"},"answer":"A","explanation":"E"}] thanks"#,
        ));
        let coordinator = coordinator(
            config(&workspace, 50, 10),
            QuizGenerator::new(Some(client.clone()), false),
        );
        coordinator.ingest_document(&path).expect("ingest");

        let payload = coordinator.generate_quiz(4).await.expect("quiz");
        assert!(!payload.from_mock);
        assert_eq!(payload.questions.len(), 1);

        let prompts = client.prompts.lock().expect("prompt log");
        assert!(prompts[0].contains("Force equals mass times acceleration."));
    }

    #[tokio::test]
    async fn completion_failure_surfaces_without_mock() {
        let workspace = tempdir().expect("tempdir");
        let path = workspace.path().join("history.txt");
        fs::write(&path, "The printing press spread literacy.").expect("write source");

        let coordinator = coordinator(
            RetrievalConfig {
                use_mock: false,
                ..config(&workspace, 50, 10)
            },
            QuizGenerator::new(Some(Arc::new(ScriptedClient::failing("timeout"))), false),
        );
        coordinator.ingest_document(&path).expect("ingest");

        assert!(matches!(
            coordinator.generate_quiz(3).await,
            Err(GenerateError::Completion(CompletionError::Backend { .. }))
        ));
    }

    #[tokio::test]
    async fn embedder_outage_serves_mock_quiz_in_mock_mode() {
        let workspace = tempdir().expect("tempdir");
        let path = workspace.path().join("chemistry.txt");
        fs::write(&path, "ATOMS\nAtoms bond by sharing electrons.").expect("write source");

        let client = Arc::new(ScriptedClient::replying(r#"[{"question":"Q"}]"#));
        let (coordinator, down) = flaky_coordinator(
            config(&workspace, 50, 10),
            QuizGenerator::new(Some(client.clone()), true),
        );
        coordinator.ingest_document(&path).expect("ingest");
        down.store(true, Ordering::SeqCst);

        let payload = coordinator.generate_quiz(2).await.expect("mock payload");
        assert!(payload.from_mock);
        assert_eq!(payload.questions.len(), 2);
        assert!(client.prompts.lock().expect("prompt log").is_empty());
    }

    #[tokio::test]
    async fn embedder_outage_surfaces_without_mock() {
        let workspace = tempdir().expect("tempdir");
        let path = workspace.path().join("chemistry.txt");
        fs::write(&path, "ATOMS\nAtoms bond by sharing electrons.").expect("write source");

        let (coordinator, down) = flaky_coordinator(
            RetrievalConfig {
                use_mock: false,
                ..config(&workspace, 50, 10)
            },
            QuizGenerator::new(None, false),
        );
        coordinator.ingest_document(&path).expect("ingest");
        down.store(true, Ordering::SeqCst);

        assert!(matches!(
            coordinator.generate_quiz(2).await,
            Err(GenerateError::Embedding(EmbedError::Backend { .. }))
        ));
    }
}
