//! Slice Event Reader
//!
//! Parses XML events from a byte slice with zero-copy semantics where the
//! input allows it. Also the entry point for the recursive CDATA re-parse:
//! the flattening engine points a fresh `SliceReader` at a CDATA payload
//! held in memory.

use super::events::{EndElement, StartElement, XmlEvent};
use crate::core::attributes::{parse_attributes, Attribute};
use crate::core::tokenizer::{ParseError, Token, TokenKind, Tokenizer};

/// Zero-copy XML event reader over a byte slice
pub struct SliceReader<'a> {
    input: &'a [u8],
    tokenizer: Tokenizer<'a>,
}

impl<'a> SliceReader<'a> {
    /// Create a new slice reader
    pub fn new(input: &'a [u8]) -> Self {
        SliceReader {
            input,
            tokenizer: Tokenizer::new(input),
        }
    }

    /// Current byte position in the input
    pub fn position(&self) -> usize {
        self.tokenizer.position()
    }

    /// Get the next XML event
    pub fn next_event(&mut self) -> Option<Result<XmlEvent<'a>, ParseError>> {
        loop {
            let token = match self.tokenizer.next_token()? {
                Ok(token) => token,
                Err(e) => return Some(Err(e)),
            };

            match token.kind {
                TokenKind::Eof => return Some(Ok(XmlEvent::EndDocument)),

                TokenKind::StartTag => {
                    let attrs = self.parse_tag_attributes(&token);
                    let name = token.name?;
                    return Some(Ok(XmlEvent::StartElement(StartElement::from_cow(name, attrs))));
                }

                TokenKind::EndTag => {
                    let name = token.name?;
                    return Some(Ok(XmlEvent::EndElement(EndElement::from_cow(name))));
                }

                TokenKind::EmptyTag => {
                    let attrs = self.parse_tag_attributes(&token);
                    let name = token.name?;
                    return Some(Ok(XmlEvent::EmptyElement(StartElement::from_cow(name, attrs))));
                }

                TokenKind::Text => {
                    if let Some(content) = token.content {
                        if !content.is_empty() {
                            return Some(Ok(XmlEvent::Text(content)));
                        }
                    }
                }

                TokenKind::CData => {
                    if let Some(content) = token.content {
                        return Some(Ok(XmlEvent::CData(content)));
                    }
                }

                TokenKind::Comment => {
                    if let Some(content) = token.content {
                        return Some(Ok(XmlEvent::Comment(content)));
                    }
                }

                TokenKind::ProcessingInstruction => {
                    if let Some(name) = token.name {
                        return Some(Ok(XmlEvent::ProcessingInstruction { target: name }));
                    }
                }

                TokenKind::XmlDeclaration => return Some(Ok(XmlEvent::XmlDeclaration)),

                TokenKind::DocType => return Some(Ok(XmlEvent::DocType)),
            }
        }
    }

    /// Parse attributes from a tag token's raw span
    fn parse_tag_attributes(&mut self, token: &Token<'a>) -> Vec<Attribute<'a>> {
        let (start, end) = token.span;
        let tag_content = &self.input[start..end];

        // Skip '<' and the tag name
        let mut pos = 1;
        while pos < tag_content.len() {
            let b = tag_content[pos];
            if b == b' ' || b == b'\t' || b == b'\n' || b == b'\r' || b == b'>' || b == b'/' {
                break;
            }
            pos += 1;
        }

        // Trim the closing '>' or '/>'
        let mut attr_end = tag_content.len();
        if tag_content.ends_with(b"/>") {
            attr_end -= 2;
        } else if tag_content.ends_with(b">") {
            attr_end -= 1;
        }

        if pos >= attr_end {
            return Vec::new();
        }

        parse_attributes(&tag_content[pos..attr_end])
    }
}

impl<'a> Iterator for SliceReader<'a> {
    type Item = Result<XmlEvent<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_event()? {
            Ok(XmlEvent::EndDocument) => None,
            other => Some(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(input: &[u8]) -> Vec<XmlEvent<'_>> {
        SliceReader::new(input)
            .collect::<Result<Vec<_>, _>>()
            .expect("parse failed")
    }

    #[test]
    fn test_simple_element() {
        let events = events(b"<root>hello</root>");
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], XmlEvent::StartElement(e) if e.name_str() == Some("root")));
        assert!(matches!(&events[1], XmlEvent::Text(t) if t.as_ref() == b"hello"));
        assert!(matches!(&events[2], XmlEvent::EndElement(e) if e.name_str() == Some("root")));
    }

    #[test]
    fn test_empty_element() {
        let events = events(b"<br/>");
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], XmlEvent::EmptyElement(e) if e.name_str() == Some("br")));
    }

    #[test]
    fn test_attributes() {
        let events = events(b"<div id=\"main\" class=\"container\"/>");
        if let XmlEvent::EmptyElement(e) = &events[0] {
            assert_eq!(e.get_attribute_value("id"), Some("main"));
            assert_eq!(e.get_attribute_value("class"), Some("container"));
        } else {
            panic!("expected EmptyElement");
        }
    }

    #[test]
    fn test_cdata() {
        let events = events(b"<script><![CDATA[alert('hi')]]></script>");
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[1], XmlEvent::CData(c) if c.as_ref() == b"alert('hi')"));
    }

    #[test]
    fn test_comment_and_pi_pass_through() {
        let events = events(b"<?xml version=\"1.0\"?><root><!-- note --><?pi data?></root>");
        assert!(matches!(&events[0], XmlEvent::XmlDeclaration));
        assert!(matches!(&events[2], XmlEvent::Comment(_)));
        assert!(matches!(&events[3], XmlEvent::ProcessingInstruction { .. }));
    }

    #[test]
    fn test_nested() {
        let events = events(b"<a><b>text</b></a>");
        assert_eq!(events.len(), 5);
    }

    #[test]
    fn test_error_propagates() {
        let result: Result<Vec<_>, _> = SliceReader::new(b"<a><!-- truncated").collect();
        assert!(result.is_err());
    }
}
