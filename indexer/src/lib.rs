//! Document acquisition for the search core.

pub mod repl;
pub mod source;

pub use source::{feed_documents, load_documents, text_documents, FeedItem, SourceFormat};
