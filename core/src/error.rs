//! Error type shared by the indexing and query layers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    /// The document source could not be read. Builds continue with zero documents.
    #[error("invalid document source: {0}")]
    InvalidDocumentSource(String),

    /// A range bound could not be converted to the range field's integer form.
    #[error("cannot parse range bound {value:?} for field {field}")]
    UnparsableRangeBound { field: String, value: String },

    /// A query was evaluated before any index was built or loaded.
    #[error("index not built")]
    IndexNotBuilt,

    /// A persisted index failed its consistency check on load.
    #[error("corrupt index: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SearchError>;
