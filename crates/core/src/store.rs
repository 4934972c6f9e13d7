use crate::error::IndexError;
use crate::models::{Chunk, Metric, SearchHit, SourceDigest};
use crate::stores::FlatIndex;
use crate::traits::VectorIndex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const VECTOR_FILE: &str = "vectors.json";
pub const METADATA_FILE: &str = "meta.json";

/// Describes how an index generation was produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexHeader {
    pub generation: Uuid,
    pub model: String,
    pub built_at: DateTime<Utc>,
    pub sources: Vec<SourceDigest>,
}

#[derive(Debug, Deserialize)]
struct VectorArtifact {
    header: IndexHeader,
    index: FlatIndex,
}

/// Settings for one build.
#[derive(Debug, Clone)]
pub struct BuildParams {
    pub metric: Metric,
    pub model: String,
    pub dimension: usize,
    pub sources: Vec<SourceDigest>,
}

/// Vector index plus the parallel chunk metadata, joined by row position.
#[derive(Debug)]
pub struct IndexStore {
    dir: PathBuf,
    header: IndexHeader,
    index: FlatIndex,
    metadata: Vec<Chunk>,
}

impl IndexStore {
    /// Builds a fresh generation and persists it to `dir`, replacing any
    /// earlier one. The vector artifact is written first; if the metadata
    /// write then fails the vector artifact is removed again so no partial
    /// generation is left behind.
    pub fn build(
        dir: &Path,
        params: BuildParams,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self, IndexError> {
        if chunks.is_empty() {
            return Err(IndexError::EmptyBuild);
        }
        if chunks.len() != embeddings.len() {
            return Err(IndexError::RowMismatch {
                vectors: embeddings.len(),
                metadata: chunks.len(),
            });
        }

        let mut index = FlatIndex::new(params.metric, params.dimension);
        index.add(&embeddings)?;

        let header = IndexHeader {
            generation: Uuid::new_v4(),
            model: params.model,
            built_at: Utc::now(),
            sources: params.sources,
        };

        let store = Self {
            dir: dir.to_path_buf(),
            header,
            index,
            metadata: chunks,
        };
        store.persist()?;

        info!(
            dir = %store.dir.display(),
            generation = %store.header.generation,
            rows = store.len(),
            metric = %store.metric(),
            "index built"
        );
        Ok(store)
    }

    fn persist(&self) -> Result<(), IndexError> {
        fs::create_dir_all(&self.dir)?;

        let vector_path = self.dir.join(VECTOR_FILE);
        let artifact = VectorArtifactRef {
            header: &self.header,
            index: &self.index,
        };
        write_replacing(&vector_path, &serde_json::to_vec(&artifact)?)?;
        debug!(path = %vector_path.display(), "vector artifact written");

        let metadata_path = self.dir.join(METADATA_FILE);
        let written = serde_json::to_vec_pretty(&self.metadata)
            .map_err(IndexError::from)
            .and_then(|bytes| write_replacing(&metadata_path, &bytes));

        if let Err(error) = written {
            warn!(
                path = %metadata_path.display(),
                %error,
                "metadata write failed, discarding vector artifact"
            );
            if let Err(cleanup) = fs::remove_file(&vector_path) {
                warn!(
                    path = %vector_path.display(),
                    error = %cleanup,
                    "could not remove vector artifact"
                );
            }
            return Err(error);
        }

        Ok(())
    }

    pub fn exists(dir: &Path) -> bool {
        dir.join(VECTOR_FILE).is_file() && dir.join(METADATA_FILE).is_file()
    }

    pub fn load(dir: &Path) -> Result<Self, IndexError> {
        if !Self::exists(dir) {
            return Err(IndexError::NotFound {
                dir: dir.to_path_buf(),
            });
        }

        let artifact: VectorArtifact = read_json(dir, VECTOR_FILE)?;
        let metadata: Vec<Chunk> = read_json(dir, METADATA_FILE)?;

        if let Some(vector) = artifact
            .index
            .rows()
            .find(|vector| vector.len() != artifact.index.dimension())
        {
            return Err(IndexError::Corrupted {
                dir: dir.to_path_buf(),
                details: format!(
                    "stored vector has dimension {} but header says {}",
                    vector.len(),
                    artifact.index.dimension()
                ),
            });
        }

        if metadata.len() != artifact.index.len() {
            warn!(
                dir = %dir.display(),
                vectors = artifact.index.len(),
                metadata = metadata.len(),
                "index row count mismatch, out-of-range results will be dropped"
            );
        }

        debug!(
            dir = %dir.display(),
            generation = %artifact.header.generation,
            rows = metadata.len(),
            "index loaded"
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            header: artifact.header,
            index: artifact.index,
            metadata,
        })
    }

    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    pub fn metric(&self) -> Metric {
        self.index.metric()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.metadata
    }

    /// Up to `k` hits, best first. Rows with no metadata entry are skipped.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        let rows = self.index.search(vector, k)?;
        let found = rows.len();

        let hits = rows
            .into_iter()
            .filter_map(|(row, score)| {
                self.metadata.get(row).map(|chunk| SearchHit {
                    chunk: chunk.clone(),
                    score,
                    row,
                })
            })
            .collect::<Vec<_>>();

        if hits.len() < found {
            warn!(
                dir = %self.dir.display(),
                dropped = found - hits.len(),
                "dropped search rows without metadata"
            );
        }

        Ok(hits)
    }
}

#[derive(Serialize)]
struct VectorArtifactRef<'a> {
    header: &'a IndexHeader,
    index: &'a FlatIndex,
}

fn read_json<T: serde::de::DeserializeOwned>(dir: &Path, name: &str) -> Result<T, IndexError> {
    let path = dir.join(name);
    let bytes = fs::read(&path)?;
    serde_json::from_slice(&bytes).map_err(|error| IndexError::Corrupted {
        dir: dir.to_path_buf(),
        details: format!("{name}: {error}"),
    })
}

/// Writes to a sibling temp file and renames it over `path`.
fn write_replacing(path: &Path, bytes: &[u8]) -> Result<(), IndexError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("artifact");
    let temp = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&temp, bytes)?;
    if let Err(error) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(error.into());
    }
    Ok(())
}
