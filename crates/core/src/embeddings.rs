use crate::error::EmbedError;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::debug;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

/// Model name that selects [`CharacterNgramEmbedder`].
pub const LOCAL_EMBED_MODEL: &str = "char-trigram";

/// Turns texts into fixed-dimension vectors.
///
/// Output order matches input order, every vector has `dimensions()`
/// entries, and the same text always maps to the same vector for a given
/// `model_id()`.
pub trait Embedder {
    /// Identifies the model configuration; persisted with the index so a
    /// query-time embedder can be checked against the build-time one.
    fn model_id(&self) -> String;

    fn dimensions(&self) -> usize;

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.embed(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Shape("embedder returned no vector".to_string()))
    }
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn model_id(&self) -> String {
        (**self).model_id()
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        (**self).embed(texts)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

impl Embedder for CharacterNgramEmbedder {
    fn model_id(&self) -> String {
        format!("{LOCAL_EMBED_MODEL}-{}", self.dimensions.max(1))
    }

    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub dimensions: usize,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
///
/// The blocking HTTP client is created per batch. Outside a runtime the call
/// runs directly; inside one it goes through `block_in_place`, which needs the
/// multi-thread scheduler, so a current-thread runtime gets an error.
pub struct HttpEmbedder {
    config: HttpEmbedderConfig,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(mut config: HttpEmbedderConfig) -> Self {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Self { config }
    }

    fn embed_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let url = format!("{}/embeddings", self.config.base_url);
        debug!(
            url = %url,
            model = %self.config.model,
            batch = texts.len(),
            "requesting embeddings"
        );

        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        let mut request = client.post(&url).json(&EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        });
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send()?;
        if !response.status().is_success() {
            return Err(EmbedError::Backend {
                backend: url,
                details: response.status().to_string(),
            });
        }

        let payload: EmbeddingResponse = response.json()?;
        order_embeddings(payload.data, texts.len(), self.config.dimensions)
    }
}

fn order_embeddings(
    mut items: Vec<EmbeddingItem>,
    expected: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    if items.len() != expected {
        return Err(EmbedError::Shape(format!(
            "embedding count {} doesn't match input count {}",
            items.len(),
            expected
        )));
    }

    if items.iter().all(|item| item.index.is_some()) {
        items.sort_by_key(|item| item.index);
    }

    items
        .into_iter()
        .map(|item| {
            if item.embedding.len() != dimensions {
                return Err(EmbedError::Shape(format!(
                    "embedding dimension {} != {}",
                    item.embedding.len(),
                    dimensions
                )));
            }
            Ok(item.embedding)
        })
        .collect()
}

impl Embedder for HttpEmbedder {
    fn model_id(&self) -> String {
        self.config.model.clone()
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| self.embed_blocking(texts))
            }
            Ok(_) => Err(EmbedError::Backend {
                backend: self.config.model.clone(),
                details: "blocking embeddings call needs a multi-thread tokio runtime".to_string(),
            }),
            Err(_) => self.embed_blocking(texts),
        }
    }
}
