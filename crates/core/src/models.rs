use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A logical input file after extraction. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub source_name: String,
    pub source_path: String,
    /// Identifier prefix for block and chunk ids.
    pub stem: String,
    pub checksum: String,
    pub text: String,
}

/// The atomic retrieval unit, persisted row-for-row alongside its vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub source: String,
    pub source_path: String,
    pub block_id: String,
    pub chunk_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceDigest {
    pub source: String,
    pub checksum: String,
}

impl From<&SourceDocument> for SourceDigest {
    fn from(document: &SourceDocument) -> Self {
        Self {
            source: document.source_name.clone(),
            checksum: document.checksum.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Squared euclidean distance, smaller is better.
    L2,
    /// Inner product over L2-normalised vectors, larger is better.
    #[default]
    Cosine,
}

impl Metric {
    pub fn normalizes(self) -> bool {
        matches!(self, Metric::Cosine)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::L2 => f.write_str("l2"),
            Metric::Cosine => f.write_str("cosine"),
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "l2" | "euclidean" => Ok(Metric::L2),
            "cosine" | "ip" | "inner_product" => Ok(Metric::Cosine),
            other => Err(format!("unknown metric `{other}` (expected `l2` or `cosine`)")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
    /// Row position in the index, 0-based.
    pub row: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizQuestion {
    pub question: String,
    #[serde(default)]
    pub choices: BTreeMap<String, String>,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
}

/// One element of a quiz payload. Model output that does not fit the
/// question shape is carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum QuizEntry {
    Question(QuizQuestion),
    Raw { raw_text: String },
    Unstructured(Value),
}

impl QuizEntry {
    pub fn as_question(&self) -> Option<&QuizQuestion> {
        match self {
            QuizEntry::Question(question) => Some(question),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizPayload {
    pub from_mock: bool,
    pub questions: Vec<QuizEntry>,
}
