use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Classification of a source file assigned by the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentCategory {
    /// Source code
    Code,
    /// Prose documentation (README, guides, API docs)
    Docs,
    /// Configuration (manifests, YAML, TOML, env files)
    Config,
    /// Test sources
    Test,
    /// Anything the scanner could not classify
    #[default]
    Other,
}

impl DocumentCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Docs => "docs",
            Self::Config => "config",
            Self::Test => "test",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentCategory {
    type Err = std::convert::Infallible;

    /// Unknown names map to [`DocumentCategory::Other`]
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(match raw.trim().to_ascii_lowercase().as_str() {
            "code" | "source" => Self::Code,
            "docs" | "doc" | "documentation" => Self::Docs,
            "config" | "configuration" => Self::Config,
            "test" | "tests" => Self::Test,
            _ => Self::Other,
        })
    }
}

/// One ordered text chunk of a document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Globally unique chunk identifier
    pub id: String,

    /// Chunk text
    pub text: String,

    /// Number of words in `text`
    #[serde(default)]
    pub word_count: usize,

    /// Start position (word offset) inside the document
    #[serde(default)]
    pub start_pos: usize,

    /// End position (word offset, exclusive) inside the document
    #[serde(default)]
    pub end_pos: usize,

    /// Free-form metadata attached by the chunker
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Chunk {
    /// Create a chunk, deriving the word count from the text
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>, start_pos: usize) -> Self {
        let text = text.into();
        let word_count = text.split_whitespace().count();
        Self {
            id: id.into(),
            word_count,
            start_pos,
            end_pos: start_pos + word_count,
            text,
            metadata: BTreeMap::new(),
        }
    }

    /// Builder: attach a metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A scanned source document and its chunks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Stable document identifier
    pub id: String,

    /// Path relative to the project root
    pub file_path: String,

    /// Language name as reported by the scanner ("Go", "Python", "Markdown", ...)
    #[serde(default)]
    pub language: String,

    #[serde(default)]
    pub category: DocumentCategory,

    /// Full document text (may be empty when only chunks were shipped)
    #[serde(default)]
    pub content: String,

    /// Chunks in document order
    #[serde(default)]
    pub chunks: Vec<Chunk>,

    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    /// Last modification time of the source file, when known
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

impl Document {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        file_path: impl Into<String>,
        language: impl Into<String>,
        category: DocumentCategory,
    ) -> Self {
        Self {
            id: id.into(),
            file_path: file_path.into(),
            language: language.into(),
            category,
            content: String::new(),
            chunks: Vec::new(),
            metadata: BTreeMap::new(),
            modified_at: None,
        }
    }

    /// Builder: append a chunk
    #[must_use]
    pub fn with_chunk(mut self, chunk: Chunk) -> Self {
        self.chunks.push(chunk);
        self
    }

    /// Builder: set the full content
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Builder: set the modification time
    #[must_use]
    pub const fn with_modified_at(mut self, modified_at: DateTime<Utc>) -> Self {
        self.modified_at = Some(modified_at);
        self
    }

    /// Index of a chunk inside this document
    #[must_use]
    pub fn chunk_position(&self, chunk_id: &str) -> Option<usize> {
        self.chunks.iter().position(|chunk| chunk.id == chunk_id)
    }

    #[must_use]
    pub fn is_code(&self) -> bool {
        self.category == DocumentCategory::Code
    }
}
