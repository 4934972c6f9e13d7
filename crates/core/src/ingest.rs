use crate::chunking::{segment_document, ChunkingConfig};
use crate::error::IngestError;
use crate::extractor::{load_source_text, SourceKind};
use crate::models::{Chunk, SourceDigest, SourceDocument};
use crate::normalize::TextNormalizer;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Lists `.pdf` and `.txt` files directly inside `folder`, sorted.
pub fn discover_source_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        if SourceKind::from_path(entry.path()).is_some() {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    Ok(digest_bytes(&fs::read(path)?))
}

/// Hands out id stems so two sources in one run never share one.
#[derive(Debug, Default)]
pub struct StemRegistry {
    claimed: HashSet<String>,
}

impl StemRegistry {
    pub fn claim(&mut self, path: &Path) -> Result<String, IngestError> {
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| {
                IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
            })?;

        if self.claimed.insert(stem.to_string()) {
            return Ok(stem.to_string());
        }

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(stem)
            .replace('.', "_");
        let mut candidate = file_name.clone();
        let mut suffix = 1usize;
        while !self.claimed.insert(candidate.clone()) {
            candidate = format!("{file_name}_{suffix}");
            suffix += 1;
        }
        Ok(candidate)
    }
}

/// Reads, checksums and normalises one source file.
pub fn load_document(
    path: &Path,
    stem: String,
    normalizer: &TextNormalizer,
) -> Result<SourceDocument, IngestError> {
    let source_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
        })?
        .to_string();

    let checksum = digest_file(path)?;
    let raw = load_source_text(path)?;
    let text = normalizer.normalize(&raw);

    if text.is_empty() {
        return Err(IngestError::EmptyDocument(source_name));
    }

    Ok(SourceDocument {
        source_name,
        source_path: path.to_string_lossy().to_string(),
        stem,
        checksum,
        text,
    })
}

pub struct SkippedSource {
    pub path: PathBuf,
    pub reason: String,
}

pub struct IngestionReport {
    pub chunks: Vec<Chunk>,
    pub sources: Vec<SourceDigest>,
    pub skipped_files: Vec<SkippedSource>,
}

/// Chunks every readable source in `folder`. A source that fails to load,
/// decode or yields no text is recorded in `skipped_files` and the rest of
/// the folder is still processed.
pub fn ingest_folder_best_effort(
    folder: &Path,
    config: ChunkingConfig,
) -> Result<IngestionReport, IngestError> {
    let files = discover_source_files(folder);

    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no pdf or txt files found in {}",
            folder.display()
        )));
    }

    let normalizer = TextNormalizer::new()?;
    let mut stems = StemRegistry::default();
    let mut chunks = Vec::new();
    let mut sources = Vec::new();
    let mut skipped_files = Vec::new();

    for path in files {
        let loaded = stems
            .claim(&path)
            .and_then(|stem| load_document(&path, stem, &normalizer));

        match loaded {
            Ok(document) => {
                let document_chunks = segment_document(&document, config);
                debug!(
                    source = %document.source_name,
                    stem = %document.stem,
                    chunks = document_chunks.len(),
                    "segmented source"
                );
                sources.push(SourceDigest::from(&document));
                chunks.extend(document_chunks);
            }
            Err(error) => {
                warn!(path = %path.display(), reason = %error, "skipped source");
                skipped_files.push(SkippedSource {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    info!(
        folder = %folder.display(),
        chunks = chunks.len(),
        sources = sources.len(),
        skipped = skipped_files.len(),
        "folder ingested"
    );

    Ok(IngestionReport {
        chunks,
        sources,
        skipped_files,
    })
}

/// Chunks one document. Unlike the folder path, every failure is returned
/// to the caller, including a document with no readable text.
pub fn ingest_single_document(
    path: &Path,
    config: ChunkingConfig,
) -> Result<(SourceDocument, Vec<Chunk>), IngestError> {
    if SourceKind::from_path(path).is_none() {
        return Err(IngestError::UnsupportedSource(path.display().to_string()));
    }

    let normalizer = TextNormalizer::new()?;
    let stem = StemRegistry::default().claim(path)?;
    let document = load_document(path, stem, &normalizer)?;
    let chunks = segment_document(&document, config);
    Ok((document, chunks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    fn config() -> ChunkingConfig {
        ChunkingConfig::new(4, 1).expect("valid config")
    }

    #[test]
    fn discovery_is_top_level_and_filtered() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        fs::write(base.join("b.TXT"), "text")?;
        fs::write(base.join("c.md"), "ignored")?;
        fs::write(nested.join("d.txt"), "ignored")?;

        let names = discover_source_files(base)
            .into_iter()
            .filter_map(|path| path.file_name().and_then(|name| name.to_str()).map(str::to_string))
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a.pdf", "b.TXT"]);
        Ok(())
    }

    #[test]
    fn checksum_is_reproducible() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file_path = dir.path().join("a.txt");
        fs::write(&file_path, b"abc")?;

        let first = digest_file(&file_path)?;
        let second = digest_file(&file_path)?;
        assert_eq!(first, second);
        assert_eq!(first, digest_bytes(b"abc"));
        Ok(())
    }

    #[test]
    fn ingestion_fails_without_sources() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let result = ingest_folder_best_effort(dir.path(), config());
        assert!(matches!(result, Err(IngestError::InvalidArgument(_))));
        Ok(())
    }

    #[test]
    fn best_effort_skips_unreadable_sources() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("unreadable.pdf"), b"%PDF-1.4\n%broken")?;
        fs::write(dir.path().join("undecodable.txt"), [0xff, 0xfe, 0xfd])?;
        fs::write(dir.path().join("blank.txt"), "  \n\n \t ")?;
        fs::write(dir.path().join("good.txt"), "INTRO\nthe quick brown fox jumps")?;

        let report = ingest_folder_best_effort(dir.path(), config())?;

        assert_eq!(report.skipped_files.len(), 3);
        assert_eq!(report.sources.len(), 1);
        assert_eq!(report.sources[0].source, "good.txt");
        assert!(!report.chunks.is_empty());
        assert!(report
            .chunks
            .iter()
            .all(|chunk| chunk.chunk_id.starts_with("good_block0_chunk")));
        Ok(())
    }

    #[test]
    fn chunk_ids_are_unique_across_a_run() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let body = "OVERVIEW\none two three four five six seven\n\n\
                    DETAILS:\neight nine ten eleven twelve";
        fs::write(dir.path().join("notes.txt"), body)?;
        fs::write(dir.path().join("notes.pdf.txt"), body)?;
        fs::write(dir.path().join("other.txt"), body)?;

        let report = ingest_folder_best_effort(dir.path(), config())?;
        let ids = report
            .chunks
            .iter()
            .map(|chunk| chunk.chunk_id.as_str())
            .collect::<HashSet<_>>();
        assert_eq!(ids.len(), report.chunks.len());
        assert_eq!(report.sources.len(), 3);
        Ok(())
    }

    #[test]
    fn colliding_stems_fall_back_to_file_names() -> Result<(), Box<dyn std::error::Error>> {
        let mut stems = StemRegistry::default();
        assert_eq!(stems.claim(Path::new("/data/notes.pdf"))?, "notes");
        assert_eq!(stems.claim(Path::new("/data/notes.txt"))?, "notes_txt");
        assert_eq!(stems.claim(Path::new("/other/notes.txt"))?, "notes_txt_1");
        Ok(())
    }

    #[test]
    fn single_document_reports_empty_text() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("empty.txt");
        fs::write(&path, "\r\n\r\n   ")?;

        assert!(matches!(
            ingest_single_document(&path, config()),
            Err(IngestError::EmptyDocument(name)) if name == "empty.txt"
        ));
        Ok(())
    }

    #[test]
    fn single_document_keeps_source_metadata() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("lesson.txt");
        fs::write(&path, "HEADER:\nAlpha bravo charlie.")?;

        let (document, chunks) =
            ingest_single_document(&path, ChunkingConfig::new(2, 0)?)?;
        assert_eq!(document.source_name, "lesson.txt");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].source_path, path.to_string_lossy());
        assert_eq!(chunks[1].chunk_id, "lesson_block0_chunk1");
        Ok(())
    }
}
