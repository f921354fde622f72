//! Flattening a document into relational rows
//!
//! The heart of the crate: a streaming walk over the XML event stream that
//! turns every element, attribute and text node into uniform rows carrying
//! synthetic identifiers and bidirectional parent/child linkage. CDATA
//! sections get a speculative re-parse as nested documents, falling back to
//! plain text when the payload is not XML.

mod engine;
mod row;
mod stack;

pub use engine::{FlattenedDocument, Flattener};
pub use row::{
    Row, CHILD_FIELD, PARENT_FIELD, PARENT_FIELD_ID, ROOT_TYPE, TEXT_TYPE, VALUE_FIELD,
};
