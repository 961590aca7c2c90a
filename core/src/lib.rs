//! Index-and-query engine for a news corpus: AVL-balanced key indexes for
//! terms, organizations and persons, their binary persistence, a TF-IDF
//! normalization pass and a clause-based query engine.

pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod tokenizer;
pub mod tree;

pub use error::{IndexError, Result};
pub use index::{DocId, DocumentRecord, IndexCatalog, IngestDocument};
pub use query::{ParsedQuery, QueryEngine, QueryResult, TermNormalizer, DEFAULT_RESULT_LIMIT};
pub use tokenizer::{EnglishNormalizer, Tokenizer};
pub use tree::{KeyIndex, PostingStore};
