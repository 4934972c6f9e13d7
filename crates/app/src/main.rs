use chrono::Utc;
use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand};
use quiz_rag_core::{
    CharacterNgramEmbedder, CompletionClient, CompletionConfig, Embedder, GenerateError,
    HttpEmbedder, HttpEmbedderConfig, Metric, OpenAiCompatibleClient, QuizCoordinator,
    QuizGenerator, RetrievalConfig, LOCAL_EMBED_MODEL,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "quiz-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Embedding model; `char-trigram` uses the built-in local embedder
    #[arg(long, env = "EMBED_MODEL", default_value = LOCAL_EMBED_MODEL)]
    embed_model: String,

    /// OpenAI-compatible embeddings base URL, required for remote models
    #[arg(long, env = "EMBED_BASE_URL")]
    embed_base_url: Option<String>,

    /// API key for the embeddings endpoint
    #[arg(long, env = "EMBED_API_KEY", hide_env_values = true)]
    embed_api_key: Option<String>,

    /// Embedding vector dimension
    #[arg(long, env = "EMBED_DIMENSIONS", default_value = "128")]
    embed_dimensions: usize,

    /// Words per chunk
    #[arg(long, env = "CHUNK_SIZE", default_value = "500")]
    chunk_size: usize,

    /// Words shared by consecutive chunks
    #[arg(long, env = "CHUNK_OVERLAP", default_value = "100")]
    chunk_overlap: usize,

    /// Directory holding the index artifacts
    #[arg(long, env = "INDEX_DIR", default_value = "indices")]
    index_dir: PathBuf,

    /// Directory scanned by `build`
    #[arg(long, env = "DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Similarity metric: `cosine` or `l2`
    #[arg(long, env = "INDEX_METRIC", default_value = "cosine")]
    metric: Metric,

    /// Serve canned questions when the completion backend is unavailable
    #[arg(
        long,
        env = "USE_MOCK",
        default_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    use_mock: bool,

    /// Completion model name
    #[arg(long, env = "GROQ_MODEL", default_value = "openai/gpt-oss-20b")]
    completion_model: String,

    /// OpenAI-compatible completion base URL
    #[arg(long, env = "GROQ_BASE_URL", default_value = "https://api.groq.com/openai/v1")]
    completion_base_url: String,

    /// API key for the completion endpoint; `OPENAI_API_KEY` is used when unset
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    completion_api_key: Option<String>,

    /// Chunks retrieved to ground one quiz
    #[arg(long, env = "CONTEXT_CHUNKS", default_value = "3")]
    context_chunks: usize,

    /// Questions per quiz when `generate` is not given `--questions`
    #[arg(long, env = "QUESTION_COUNT", default_value = "10")]
    question_count: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk every PDF and text file in the data directory and rebuild the index.
    Build,
    /// Index a single document, replacing the current index.
    Ingest {
        /// PDF or text file to index.
        #[arg(long)]
        file: PathBuf,
    },
    /// Print the chunks closest to a query.
    Search {
        /// Search query
        #[arg(long)]
        query: String,
        /// Number of chunks to return.
        #[arg(long, default_value = "5")]
        top_k: usize,
    },
    /// Generate a quiz grounded in the indexed documents.
    Generate {
        /// Number of questions to request.
        #[arg(long)]
        questions: Option<usize>,
    },
}

impl Cli {
    fn retrieval_config(&self) -> RetrievalConfig {
        RetrievalConfig {
            embed_model: self.embed_model.clone(),
            embed_base_url: self.embed_base_url.clone(),
            embed_api_key: self.embed_api_key.clone(),
            embed_dimensions: self.embed_dimensions,
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            index_dir: self.index_dir.clone(),
            data_dir: self.data_dir.clone(),
            metric: self.metric,
            use_mock: self.use_mock,
            completion_model: self.completion_model.clone(),
            completion_base_url: self.completion_base_url.clone(),
            completion_api_key: resolve_api_key(
                self.completion_api_key.clone(),
                std::env::var("OPENAI_API_KEY").ok(),
            ),
            context_chunks: self.context_chunks,
            question_count: self.question_count,
        }
    }
}

/// First non-blank key, preferring the Groq flag or env value.
fn resolve_api_key(primary: Option<String>, fallback: Option<String>) -> Option<String> {
    primary
        .into_iter()
        .chain(fallback)
        .find(|key| !key.trim().is_empty())
}

fn build_embedder(config: &RetrievalConfig) -> Box<dyn Embedder> {
    match &config.embed_base_url {
        Some(base_url) if config.embed_model != LOCAL_EMBED_MODEL => {
            Box::new(HttpEmbedder::new(HttpEmbedderConfig {
                base_url: base_url.clone(),
                model: config.embed_model.clone(),
                api_key: config.embed_api_key.clone(),
                dimensions: config.embed_dimensions,
            }))
        }
        _ => Box::new(CharacterNgramEmbedder {
            dimensions: config.embed_dimensions,
        }),
    }
}

fn build_completion_client(
    config: &RetrievalConfig,
) -> anyhow::Result<Option<Arc<dyn CompletionClient>>> {
    let Some(api_key) = config.completion_api_key.clone() else {
        warn!(use_mock = config.use_mock, "neither GROQ_API_KEY nor OPENAI_API_KEY is set");
        return Ok(None);
    };

    let created = OpenAiCompatibleClient::new(CompletionConfig {
        base_url: config.completion_base_url.clone(),
        model: config.completion_model.clone(),
        api_key,
    });

    match created {
        Ok(client) => Ok(Some(Arc::new(client))),
        Err(error) if config.use_mock => {
            warn!(%error, "completion client init failed, mock quiz will be served");
            Ok(None)
        }
        Err(error) => Err(anyhow::anyhow!(error.to_string())),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli.retrieval_config();
    config
        .validate()
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    let embedder = build_embedder(&config);
    let client = build_completion_client(&config)?;
    let generator = QuizGenerator::new(client, config.use_mock);
    let coordinator = QuizCoordinator::new(config, embedder, generator)
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        index_dir = %coordinator.config().index_dir.display(),
        "quiz-rag boot"
    );

    match cli.command {
        Command::Build => {
            let summary = coordinator
                .build_from_folder()
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            for skipped in &summary.skipped_files {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped source");
            }

            println!(
                "{} chunks from {} sources indexed at {} (generation {})",
                summary.chunk_count,
                summary.source_count,
                Utc::now().to_rfc3339(),
                summary.generation
            );
        }
        Command::Ingest { file } => {
            let chunk_count = coordinator
                .ingest_document(&file)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!(
                "{}: file processed and indexed successfully. Created {chunk_count} chunks.",
                file.display()
            );
        }
        Command::Search { query, top_k } => {
            let hits = coordinator
                .search(&query, top_k)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!("query: {query}");
            for hit in hits {
                println!(
                    "[{}] score={:.4} chunk={} source={}",
                    hit.row, hit.score, hit.chunk.chunk_id, hit.chunk.source
                );
                println!("  chunk_text:\n{}", hit.chunk.text);
            }
        }
        Command::Generate { questions } => {
            let question_count = questions.unwrap_or(coordinator.config().question_count);
            match coordinator.generate_quiz(question_count).await {
                Ok(payload) => {
                    let body = json!({
                        "status": "ok",
                        "from_mock": payload.from_mock,
                        "data": payload.questions,
                    });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                Err(GenerateError::Index(error)) if error.is_not_found() => {
                    let body = json!({
                        "status": "not_found",
                        "message": "Index not found. Please upload a document first.",
                    });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                    return Err(anyhow::anyhow!(error.to_string()));
                }
                Err(error) => {
                    let body = json!({ "status": "error", "detail": error.to_string() });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                    return Err(anyhow::anyhow!(error.to_string()));
                }
            }
        }
    }

    Ok(())
}
