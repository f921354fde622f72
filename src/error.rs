//! Error taxonomy
//!
//! Two layers: `FlattenError` for the parse/flatten core, `ExportError` for
//! the export surfaces wrapping it. The CDATA "not a document" outcome is
//! deliberately absent here - it is an expected branch handled inside the
//! engine, not a failure a caller can observe.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while flattening one document
#[derive(Error, Debug)]
pub enum FlattenError {
    /// The source could not be opened or read
    #[error("failed to read source: {0}")]
    Io(#[from] std::io::Error),

    /// The document is structurally malformed; rows already produced for
    /// the document must be discarded by the caller
    #[error("malformed document at byte {position}: {message}")]
    Malformed { message: String, position: usize },
}

impl FlattenError {
    pub(crate) fn malformed(message: impl Into<String>, position: usize) -> Self {
        FlattenError::Malformed {
            message: message.into(),
            position,
        }
    }
}

impl From<crate::core::tokenizer::ParseError> for FlattenError {
    fn from(e: crate::core::tokenizer::ParseError) -> Self {
        FlattenError::Malformed {
            message: e.message,
            position: e.position,
        }
    }
}

/// Failures while exporting flattened rows to a destination
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Flatten(#[from] FlattenError),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A directory export found nothing to do
    #[error("no packages found under {0}")]
    NoPackages(PathBuf),
}
