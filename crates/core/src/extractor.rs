use crate::error::IngestError;
use lopdf::Document;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    PlainText,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension().and_then(|ext| ext.to_str())?;
        if extension.eq_ignore_ascii_case("pdf") {
            Some(SourceKind::Pdf)
        } else if extension.eq_ignore_ascii_case("txt") {
            Some(SourceKind::PlainText)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    /// Every page is returned in order; a page whose text cannot be
    /// extracted comes back empty instead of failing the document.
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let pages = document
            .get_pages()
            .into_keys()
            .map(|page_no| {
                let text = document.extract_text(&[page_no]).unwrap_or_else(|error| {
                    debug!(
                        path = %path.display(),
                        page = page_no,
                        %error,
                        "page has no extractable text"
                    );
                    String::new()
                });
                PageText {
                    number: page_no,
                    text,
                }
            })
            .collect();

        Ok(pages)
    }
}

/// Joins page texts in page order, one newline between non-empty pages.
pub fn join_pages(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(|page| page.text.trim_end_matches('\n'))
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Page numbers whose text is empty or whitespace only.
pub fn blank_pages(pages: &[PageText]) -> Vec<u32> {
    pages
        .iter()
        .filter(|page| page.text.trim().is_empty())
        .map(|page| page.number)
        .collect()
}

pub fn decode_plain_text(path: &Path, bytes: Vec<u8>) -> Result<String, IngestError> {
    String::from_utf8(bytes).map_err(|error| IngestError::Decode {
        path: path.to_path_buf(),
        details: error.to_string(),
    })
}

/// Best-effort text for one source file, dispatched on its extension.
pub fn load_source_text(path: &Path) -> Result<String, IngestError> {
    match SourceKind::from_path(path) {
        Some(SourceKind::Pdf) => {
            let pages = LopdfExtractor.extract_pages(path)?;
            let blank = blank_pages(&pages);
            if !blank.is_empty() {
                debug!(path = %path.display(), pages = ?blank, "pages without text");
            }
            Ok(join_pages(&pages))
        }
        Some(SourceKind::PlainText) => decode_plain_text(path, std::fs::read(path)?),
        None => Err(IngestError::UnsupportedSource(path.display().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn source_kind_is_case_insensitive() {
        assert_eq!(SourceKind::from_path(Path::new("a.PDF")), Some(SourceKind::Pdf));
        assert_eq!(SourceKind::from_path(Path::new("b.Txt")), Some(SourceKind::PlainText));
        assert_eq!(SourceKind::from_path(Path::new("c.docx")), None);
        assert_eq!(SourceKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn empty_pages_contribute_nothing() {
        let pages = vec![
            PageText {
                number: 1,
                text: "First page\n".to_string(),
            },
            PageText {
                number: 2,
                text: String::new(),
            },
            PageText {
                number: 3,
                text: "Third page".to_string(),
            },
        ];
        assert_eq!(join_pages(&pages), "First page\nThird page");
        assert_eq!(blank_pages(&pages), vec![2]);
    }

    #[test]
    fn plain_text_is_read_as_utf8() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("notes.txt");
        fs::write(&path, "HEADER:\nAlpha bravo charlie.")?;

        assert_eq!(load_source_text(&path)?, "HEADER:\nAlpha bravo charlie.");
        Ok(())
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.txt");
        fs::write(&path, [0xff, 0xfe, 0x00, 0xc3])?;

        assert!(matches!(
            load_source_text(&path),
            Err(IngestError::Decode { .. })
        ));
        Ok(())
    }

    #[test]
    fn malformed_pdf_is_a_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"%PDF-1.4\n%broken")?;

        assert!(matches!(
            load_source_text(&path),
            Err(IngestError::PdfParse(_))
        ));
        Ok(())
    }
}
