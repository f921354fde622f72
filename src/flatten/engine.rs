//! The flattening engine
//!
//! Streams XML events and emits `Row` values describing every element,
//! attribute and text node, in document order. Identifier assignment is a
//! single monotonic counter, seeded by the caller and returned with the
//! output, so batches of documents can keep ids globally unique without any
//! hidden cross-call state.
//!
//! CDATA sections are speculatively re-parsed as nested documents sharing
//! the engine's counter and ancestor stack; a payload that turns out not to
//! be a document is demoted to an ordinary TEXT node. The two outcomes are
//! kept structurally distinct from real parse failures: `NotADocument`
//! never leaves this module.

use std::collections::VecDeque;

use log::debug;

use crate::error::FlattenError;
use crate::reader::events::{StartElement, XmlEvent};
use crate::reader::slice::SliceReader;

use super::row::{Row, CHILD_FIELD, PARENT_FIELD, PARENT_FIELD_ID, ROOT_TYPE, TEXT_TYPE, VALUE_FIELD};
use super::stack::AncestorStack;

/// Outcome of a speculative CDATA re-parse that found no nested document.
/// An expected branch, not an error; must never reach the caller.
struct NotADocument;

/// Everything one parse produced
#[derive(Debug)]
pub struct FlattenedDocument {
    /// Name of the flattened document
    pub document: String,
    /// All rows, in document order
    pub rows: Vec<Row>,
    /// Highest item id assigned; feed this back as the seed of the next
    /// document when loading a batch into one destination
    pub last_item_id: u64,
}

/// Streaming document flattener
///
/// Iterates `Result<Row, FlattenError>`. After the first `Err` the iterator
/// is fused; rows yielded before the error belong to a failed parse and must
/// be discarded as a unit (or use [`Flattener::into_rows`], which does that
/// for you).
pub struct Flattener<'a> {
    document: String,
    reader: SliceReader<'a>,
    stack: AncestorStack,
    counter: u64,
    seed: u64,
    root_seen: bool,
    pending: VecDeque<Row>,
    done: bool,
}

impl<'a> Flattener<'a> {
    /// Create a flattener over one document held in memory.
    ///
    /// `seed` is the id the counter continues from: the first item gets
    /// `seed + 1`. Pass the previous document's `last_item_id` to keep ids
    /// unique across a batch, or 0 for a standalone parse.
    pub fn new(document: impl Into<String>, input: &'a [u8], seed: u64) -> Self {
        Flattener {
            document: document.into(),
            reader: SliceReader::new(input),
            stack: AncestorStack::new(),
            counter: seed,
            seed,
            root_seen: false,
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Name of the document being flattened
    pub fn document(&self) -> &str {
        &self.document
    }

    /// Highest item id assigned so far
    pub fn last_item_id(&self) -> u64 {
        self.counter
    }

    /// Drain the iterator into a [`FlattenedDocument`], failing atomically:
    /// on any error no rows are returned.
    pub fn into_rows(mut self) -> Result<FlattenedDocument, FlattenError> {
        let mut rows = Vec::new();
        for row in &mut self {
            rows.push(row?);
        }
        Ok(FlattenedDocument {
            document: self.document,
            rows,
            last_item_id: self.counter,
        })
    }

    fn handle_event(&mut self, event: XmlEvent<'_>, out: &mut Vec<Row>) -> Result<(), FlattenError> {
        match event {
            XmlEvent::StartElement(e) => self.open_element(&e, false, out),
            XmlEvent::EmptyElement(e) => self.open_element(&e, true, out),

            XmlEvent::EndElement(e) => {
                let position = self.reader.position();
                let name = utf8_name(&e.name, position)?;
                match self.stack.pop() {
                    None => Err(FlattenError::malformed(
                        format!("unexpected closing tag </{}>", name),
                        position,
                    )),
                    Some(frame) if frame.item_type != name => Err(FlattenError::malformed(
                        format!(
                            "mismatched closing tag: expected </{}>, found </{}>",
                            frame.item_type, name
                        ),
                        position,
                    )),
                    Some(_) => Ok(()),
                }
            }

            XmlEvent::Text(t) => {
                if is_xml_whitespace(&t) {
                    return Ok(());
                }
                let position = self.reader.position();
                if self.stack.is_empty() {
                    return Err(FlattenError::malformed(
                        "character data outside the root element",
                        position,
                    ));
                }
                let text = utf8_text(&t, position)?.to_string();
                self.text_node(&text, out);
                Ok(())
            }

            XmlEvent::CData(c) => {
                let position = self.reader.position();
                if self.stack.is_empty() {
                    return Err(FlattenError::malformed(
                        "CDATA section outside the root element",
                        position,
                    ));
                }
                match self.flatten_fragment(&c) {
                    Ok(rows) => {
                        out.extend(rows);
                        Ok(())
                    }
                    Err(NotADocument) => {
                        // Not nested XML: the payload becomes an ordinary
                        // text node, verbatim.
                        let text = utf8_text(&c, position)?.to_string();
                        self.text_node(&text, out);
                        Ok(())
                    }
                }
            }

            // Comments, processing instructions, declarations and DOCTYPE
            // carry nothing the row model stores.
            _ => Ok(()),
        }
    }

    /// Emit the rows for an opening (or self-closing) element: the parent's
    /// child reference, the element's own parent link, then one row per
    /// attribute in source order.
    fn open_element(
        &mut self,
        element: &StartElement<'_>,
        is_empty: bool,
        out: &mut Vec<Row>,
    ) -> Result<(), FlattenError> {
        let position = self.reader.position();
        let name = utf8_name(&element.name, position)?.to_string();

        if self.stack.is_empty() {
            if self.root_seen {
                return Err(FlattenError::malformed(
                    format!("multiple root elements: <{}>", name),
                    position,
                ));
            }
            self.root_seen = true;
        }

        let parent = self.stack.top().map(|f| (f.item_id, f.item_type.clone()));
        let child_field = self.stack.next_child_field();

        self.counter += 1;
        let item_id = self.counter;

        if let (Some(field_id), Some((parent_id, parent_type))) = (child_field, &parent) {
            out.push(self.row(
                *parent_id,
                parent_type.clone(),
                field_id,
                CHILD_FIELD,
                item_id.to_string(),
                name.clone(),
            ));
        }

        let (parent_value, parent_type) = match &parent {
            Some((parent_id, parent_type)) => (parent_id.to_string(), parent_type.clone()),
            None => ("0".to_string(), ROOT_TYPE.to_string()),
        };
        out.push(self.row(
            item_id,
            name.clone(),
            PARENT_FIELD_ID,
            PARENT_FIELD,
            parent_value,
            parent_type,
        ));

        if !is_empty {
            self.stack.push(item_id, name.clone());
        }

        let mut attr_count = 0u32;
        for attr in &element.attributes {
            attr_count += 1;
            let attr_name = utf8_name(&attr.name, position)?;
            let attr_value = utf8_text(&attr.value, position)?;
            out.push(self.row(
                item_id,
                name.clone(),
                attr_count,
                attr_name,
                attr_value.to_string(),
                String::new(),
            ));
        }

        // Attribute rows occupy field ids 1..=n, so child numbering for this
        // element continues after them.
        if !is_empty && attr_count > 0 {
            if let Some(frame) = self.stack.top_mut() {
                frame.children_count += attr_count;
            }
        }

        Ok(())
    }

    /// Emit the three rows of a TEXT pseudo-element under the current
    /// parent. Callers guarantee a parent frame exists.
    fn text_node(&mut self, text: &str, out: &mut Vec<Row>) {
        let Some(field_id) = self.stack.next_child_field() else {
            return;
        };
        let Some((parent_id, parent_type)) = self.stack.top().map(|f| (f.item_id, f.item_type.clone()))
        else {
            return;
        };

        self.counter += 1;
        let item_id = self.counter;

        out.push(self.row(
            parent_id,
            parent_type.clone(),
            field_id,
            CHILD_FIELD,
            item_id.to_string(),
            TEXT_TYPE.to_string(),
        ));
        out.push(self.row(
            item_id,
            TEXT_TYPE.to_string(),
            PARENT_FIELD_ID,
            PARENT_FIELD,
            parent_id.to_string(),
            parent_type,
        ));
        out.push(self.row(
            item_id,
            TEXT_TYPE.to_string(),
            1,
            VALUE_FIELD,
            text.to_string(),
            String::new(),
        ));
    }

    /// Speculatively flatten a CDATA payload as a nested document.
    ///
    /// Shares the enclosing parse's counter and ancestor stack, so a
    /// successful sub-document links to the enclosing parent exactly as if
    /// its elements had appeared inline. On failure every side effect is
    /// rolled back before reporting `NotADocument`.
    fn flatten_fragment(&mut self, payload: &[u8]) -> Result<Vec<Row>, NotADocument> {
        let saved_counter = self.counter;
        let saved_stack = self.stack.clone();

        match self.fragment_rows(payload) {
            Ok(rows) => Ok(rows),
            Err(NotADocument) => {
                self.counter = saved_counter;
                self.stack = saved_stack;
                Err(NotADocument)
            }
        }
    }

    fn fragment_rows(&mut self, payload: &[u8]) -> Result<Vec<Row>, NotADocument> {
        let base_depth = self.stack.depth();
        let mut rows = Vec::new();
        let mut roots = 0usize;
        let mut reader = SliceReader::new(payload);

        while let Some(item) = reader.next() {
            let event = item.map_err(|_| NotADocument)?;
            match event {
                XmlEvent::StartElement(e) => {
                    if self.stack.depth() == base_depth {
                        roots += 1;
                        if roots > 1 {
                            return Err(NotADocument);
                        }
                    }
                    self.open_element(&e, false, &mut rows).map_err(|_| NotADocument)?;
                }

                XmlEvent::EmptyElement(e) => {
                    if self.stack.depth() == base_depth {
                        roots += 1;
                        if roots > 1 {
                            return Err(NotADocument);
                        }
                    }
                    self.open_element(&e, true, &mut rows).map_err(|_| NotADocument)?;
                }

                XmlEvent::EndElement(e) => {
                    if self.stack.depth() == base_depth {
                        return Err(NotADocument);
                    }
                    let name = std::str::from_utf8(&e.name).map_err(|_| NotADocument)?;
                    match self.stack.pop() {
                        Some(frame) if frame.item_type == name => {}
                        _ => return Err(NotADocument),
                    }
                }

                XmlEvent::Text(t) => {
                    if is_xml_whitespace(&t) {
                        continue;
                    }
                    if self.stack.depth() == base_depth {
                        // Character data outside the fragment's root: this
                        // payload is prose, not a document.
                        return Err(NotADocument);
                    }
                    let text = std::str::from_utf8(&t).map_err(|_| NotADocument)?.to_string();
                    self.text_node(&text, &mut rows);
                }

                XmlEvent::CData(c) => {
                    if self.stack.depth() == base_depth {
                        return Err(NotADocument);
                    }
                    match self.flatten_fragment(&c) {
                        Ok(nested) => rows.extend(nested),
                        Err(NotADocument) => {
                            let text =
                                std::str::from_utf8(&c).map_err(|_| NotADocument)?.to_string();
                            self.text_node(&text, &mut rows);
                        }
                    }
                }

                _ => {}
            }
        }

        if self.stack.depth() != base_depth || roots != 1 {
            return Err(NotADocument);
        }
        Ok(rows)
    }

    fn row(
        &self,
        item_id: u64,
        item_type: String,
        field_id: u32,
        field_name: &str,
        value: String,
        linked_item_type: impl Into<String>,
    ) -> Row {
        Row {
            document: self.document.clone(),
            item_id,
            item_type,
            field_id,
            field_name: field_name.to_string(),
            value,
            linked_item_type: linked_item_type.into(),
        }
    }
}

impl Iterator for Flattener<'_> {
    type Item = Result<Row, FlattenError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Some(Ok(row));
            }
            if self.done {
                return None;
            }
            match self.reader.next() {
                None => {
                    self.done = true;
                    if let Some(frame) = self.stack.top() {
                        return Some(Err(FlattenError::malformed(
                            format!("unclosed element <{}>", frame.item_type),
                            self.reader.position(),
                        )));
                    }
                    if !self.root_seen {
                        return Some(Err(FlattenError::malformed(
                            "document has no root element",
                            self.reader.position(),
                        )));
                    }
                    debug!(
                        "flattened {}: {} items",
                        self.document,
                        self.counter - self.seed
                    );
                    return None;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
                Some(Ok(event)) => {
                    let mut out = Vec::new();
                    if let Err(e) = self.handle_event(event, &mut out) {
                        self.done = true;
                        return Some(Err(e));
                    }
                    self.pending.extend(out);
                }
            }
        }
    }
}

/// XML whitespace: space, tab, carriage return, line feed
fn is_xml_whitespace(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
}

fn utf8_name(bytes: &[u8], position: usize) -> Result<&str, FlattenError> {
    std::str::from_utf8(bytes)
        .map_err(|_| FlattenError::malformed("name is not valid UTF-8", position))
}

fn utf8_text(bytes: &[u8], position: usize) -> Result<&str, FlattenError> {
    std::str::from_utf8(bytes)
        .map_err(|_| FlattenError::malformed("content is not valid UTF-8", position))
}
