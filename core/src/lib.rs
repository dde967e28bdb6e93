//! Inverted-index search core: analysis, index construction and storage,
//! structured queries and ranked top-k evaluation.

pub mod analyzer;
pub mod builder;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod search;

pub use analyzer::{Analyzer, AnalyzerConfig, Token};
pub use builder::{build, IndexBuilder};
pub use config::{EngineConfig, FieldNames};
pub use document::{Document, Field, FieldValue};
pub use engine::{SearchEngine, Searcher};
pub use error::{Result, SearchError};
pub use index::{DocId, InvertedIndex, Posting, PostingList, TermId};
pub use query::{Clause, Occur, Query, QueryParser, RangeClause, SearchRequest, TermsClause};
pub use search::{evaluate, ScoredHit, TopDocs};
