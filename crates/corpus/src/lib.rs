//! # Codedocs Corpus
//!
//! Documents and ordered text chunks as produced by the external chunking stage.
//!
//! The retrieval core never chunks text itself: it receives a [`Corpus`] (usually
//! loaded from the chunker's JSON output) and treats it as read-only input for
//! embedding generation and for the keyword/structural retrieval strategies.
//!
//! ```text
//! corpus.json
//!     │
//!     └──> Corpus
//!            └─> Document[] (file path, language, category)
//!                  └─> Chunk[] (text, word count, positions)
//! ```

mod corpus;
mod error;
mod types;

pub use corpus::{Corpus, CORPUS_SCHEMA_VERSION};
pub use error::{CorpusError, Result};
pub use types::{Chunk, Document, DocumentCategory};
