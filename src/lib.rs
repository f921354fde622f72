//! dtsxrows - flatten SSIS package XML (DTSX) into a relational row model
//!
//! A DTSX package is a deeply nested XML document. This crate walks one as
//! a stream of events and emits uniform rows - (item id, item type, field
//! id, field name, value, linked item type) - wiring every element to its
//! parent and children through synthetic identifiers, so whole packages can
//! be bulk loaded into a single table and queried relationally.
//!
//! CDATA sections frequently hold further XML (expression trees, nested
//! package fragments); the engine speculatively re-parses them as nested
//! documents and falls back to opaque text when they are not.
//!
//! ```no_run
//! use dtsxrows::flatten_document;
//!
//! let doc = flatten_document("pkg.dtsx", b"<root attr=\"1\"><child>text</child></root>", 0)?;
//! for row in &doc.rows {
//!     println!("{} {} {} = {}", row.item_id, row.item_type, row.field_name, row.value);
//! }
//! // Seed the next document in the batch from doc.last_item_id.
//! # Ok::<(), dtsxrows::FlattenError>(())
//! ```

pub mod core;
pub mod error;
pub mod export;
pub mod flatten;
pub mod reader;

pub use error::{ExportError, FlattenError};
pub use flatten::{FlattenedDocument, Flattener, Row};

use std::path::Path;

/// Flatten one document held in memory.
///
/// `seed` is the caller's running item id total; ids are assigned strictly
/// above it. Fails atomically: on error no rows are returned.
pub fn flatten_document(
    document: &str,
    input: &[u8],
    seed: u64,
) -> Result<FlattenedDocument, FlattenError> {
    Flattener::new(document, input, seed).into_rows()
}

/// Read, decode and flatten one document file.
///
/// The file name becomes the document name on every row. UTF-16 input
/// (common for DTSX) is converted before parsing.
pub fn flatten_file(path: &Path, seed: u64) -> Result<FlattenedDocument, FlattenError> {
    let raw = std::fs::read(path)?;
    let input = core::encoding::convert_to_utf8(raw)
        .map_err(|message| FlattenError::Malformed { message, position: 0 })?;

    let document = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    flatten_document(&document, &input, seed)
}
