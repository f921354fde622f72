//! XML Reader Module
//!
//! Pull-event layer over the tokenizer:
//! - Events: XML event types for pull parsing
//! - SliceReader: event iterator over an in-memory byte slice

pub mod events;
pub mod slice;
