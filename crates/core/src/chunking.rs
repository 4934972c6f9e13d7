use crate::error::IngestError;
use crate::models::{Chunk, SourceDocument};

/// Word-window settings. `overlap < chunk_size` and `chunk_size > 0` hold for
/// every value built through [`ChunkingConfig::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, IngestError> {
        if chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be positive".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {overlap} must be smaller than chunk size {chunk_size}"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Words the window advances per chunk, never zero.
    pub fn stride(&self) -> usize {
        self.chunk_size.saturating_sub(self.overlap).max(1)
    }
}

pub fn block_id(stem: &str, block: usize) -> String {
    format!("{stem}_block{block}")
}

pub fn chunk_id(stem: &str, block: usize, chunk: usize) -> String {
    format!("{stem}_block{block}_chunk{chunk}")
}

/// A trimmed line opens a new block when it is fully upper-case or ends with
/// a colon.
pub fn is_heading(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.ends_with(':') {
        return true;
    }
    trimmed.chars().any(char::is_uppercase) && !trimmed.chars().any(char::is_lowercase)
}

/// Splits normalised text into heading-delimited blocks. Blank lines close
/// the open block and are never part of one.
pub fn split_by_headings(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            flush_block(&mut blocks, &mut current);
            continue;
        }

        if is_heading(line) {
            flush_block(&mut blocks, &mut current);
        }
        current.push(line);
    }

    flush_block(&mut blocks, &mut current);
    blocks
}

fn flush_block(blocks: &mut Vec<String>, current: &mut Vec<&str>) {
    if current.is_empty() {
        return;
    }
    blocks.push(current.join("\n").trim().to_string());
    current.clear();
}

/// Cuts one block into overlapping word windows.
///
/// A block that fits in one window is returned verbatim. Longer blocks yield
/// windows starting every `stride` words until the start passes the end, so
/// the tail window may be shorter than `chunk_size`.
pub fn chunk_words(block: &str, config: ChunkingConfig) -> Vec<String> {
    let words = block.split_whitespace().collect::<Vec<_>>();
    if words.is_empty() {
        return Vec::new();
    }

    if words.len() <= config.chunk_size() {
        return vec![block.to_string()];
    }

    let stride = config.stride();
    let mut chunks = Vec::with_capacity(words.len().div_ceil(stride));
    let mut start = 0;
    while start < words.len() {
        let end = (start + config.chunk_size()).min(words.len());
        chunks.push(words[start..end].join(" "));
        start += stride;
    }

    chunks
}

/// Runs both segmentation stages over one document and assigns ids.
pub fn segment_document(document: &SourceDocument, config: ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for (block_index, block) in split_by_headings(&document.text).iter().enumerate() {
        let block_id = block_id(&document.stem, block_index);
        for (chunk_index, text) in chunk_words(block, config).into_iter().enumerate() {
            chunks.push(Chunk {
                source: document.source_name.clone(),
                source_path: document.source_path.clone(),
                block_id: block_id.clone(),
                chunk_id: chunk_id(&document.stem, block_index, chunk_index),
                text,
            });
        }
    }

    chunks
}
