//! XML Tokenizer - pull-style XML token extraction
//!
//! Extracts XML tokens one at a time:
//! - Element start/end/empty tags
//! - Text content (entities decoded)
//! - CDATA sections
//! - Comments, processing instructions, XML declarations, DOCTYPE
//!
//! The tokenizer is lenient about what XML 1.0 would reject at the character
//! level, but malformed markup (unterminated tags, comments, CDATA sections,
//! processing instructions) is reported as a `ParseError` carrying the byte
//! position where tokenization stopped. Nesting is not checked here; that is
//! the consumer's job, since only the consumer knows which structural
//! failures are fatal.

use super::scanner::Scanner;
use std::borrow::Cow;

/// Current parsing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Initial state before parsing starts
    Init,
    /// Between markup constructs
    Content,
    /// End of input reached, Eof token emitted
    Done,
}

/// Type of XML token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Element start tag: `<element>`
    StartTag,
    /// Element end tag: `</element>`
    EndTag,
    /// Empty element: `<element/>`
    EmptyTag,
    /// Text content
    Text,
    /// CDATA section: `<![CDATA[...]]>`
    CData,
    /// Comment: `<!--...-->`
    Comment,
    /// Processing instruction: `<?target ...?>`
    ProcessingInstruction,
    /// XML declaration: `<?xml version="1.0"?>`
    XmlDeclaration,
    /// DOCTYPE declaration
    DocType,
    /// End of input
    Eof,
}

/// A parsed XML token
#[derive(Debug, Clone)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Raw span in input (start, end)
    pub span: (usize, usize),
    /// For tags and processing instructions: the name
    pub name: Option<Cow<'a, [u8]>>,
    /// For text/cdata/comment: the content (owned if entities were decoded)
    pub content: Option<Cow<'a, [u8]>>,
}

impl<'a> Token<'a> {
    fn new(kind: TokenKind, span: (usize, usize)) -> Self {
        Token {
            kind,
            span,
            name: None,
            content: None,
        }
    }

    fn with_name(mut self, name: &'a [u8]) -> Self {
        self.name = Some(Cow::Borrowed(name));
        self
    }

    fn with_content(mut self, content: Cow<'a, [u8]>) -> Self {
        self.content = Some(content);
        self
    }
}

/// Tokenization failure
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        ParseError {
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at byte {}", self.message, self.position)
    }
}

/// XML tokenizer implementing a pull-parser pattern
pub struct Tokenizer<'a> {
    scanner: Scanner<'a>,
    state: ParseState,
}

impl<'a> Tokenizer<'a> {
    /// Create a new tokenizer for the given input
    pub fn new(input: &'a [u8]) -> Self {
        Tokenizer {
            scanner: Scanner::new(input),
            state: ParseState::Init,
        }
    }

    /// Get the current position in the input
    pub fn position(&self) -> usize {
        self.scanner.position()
    }

    /// Get the next token, or None once the Eof token has been returned.
    ///
    /// Consumers are expected to stop pulling after the first `Err`.
    pub fn next_token(&mut self) -> Option<Result<Token<'a>, ParseError>> {
        if self.state == ParseState::Done {
            return None;
        }

        if self.state == ParseState::Init {
            self.scanner.skip_whitespace();
            self.state = ParseState::Content;
        }

        if self.scanner.is_eof() {
            self.state = ParseState::Done;
            let pos = self.scanner.position();
            return Some(Ok(Token::new(TokenKind::Eof, (pos, pos))));
        }

        let result = match self.scanner.peek() {
            Some(b'<') => self.parse_markup(),
            _ => self.parse_text(),
        };
        Some(result)
    }

    /// Parse markup starting with '<'
    fn parse_markup(&mut self) -> Result<Token<'a>, ParseError> {
        let start = self.scanner.position();
        self.scanner.advance(1); // Skip '<'

        match self.scanner.peek() {
            Some(b'/') => self.parse_end_tag(start),
            Some(b'!') => self.parse_bang_markup(start),
            Some(b'?') => self.parse_pi(start),
            Some(_) => self.parse_start_tag(start),
            None => Err(self.error("unexpected end of input after '<'", start)),
        }
    }

    /// Parse a start tag or empty element tag
    fn parse_start_tag(&mut self, start: usize) -> Result<Token<'a>, ParseError> {
        let name = self
            .scanner
            .read_name()
            .ok_or_else(|| self.error_here("invalid element name"))?;

        let end = self
            .scanner
            .find_tag_end_quoted()
            .ok_or_else(|| self.error("unterminated tag", start))?;

        // Empty element tag ends with '/>'
        let is_empty = end > start && self.scanner.slice(end - 1, end) == b"/";

        self.scanner.set_position(end + 1);

        let kind = if is_empty {
            TokenKind::EmptyTag
        } else {
            TokenKind::StartTag
        };
        Ok(Token::new(kind, (start, end + 1)).with_name(name))
    }

    /// Parse an end tag
    fn parse_end_tag(&mut self, start: usize) -> Result<Token<'a>, ParseError> {
        self.scanner.advance(1); // Skip '/'

        let name = self
            .scanner
            .read_name()
            .ok_or_else(|| self.error_here("invalid name in closing tag"))?;

        let end = self
            .scanner
            .find_tag_end()
            .ok_or_else(|| self.error("unterminated closing tag", start))?;

        self.scanner.set_position(end + 1);

        Ok(Token::new(TokenKind::EndTag, (start, end + 1)).with_name(name))
    }

    /// Parse markup starting with '<!' (comment, CDATA, DOCTYPE)
    fn parse_bang_markup(&mut self, start: usize) -> Result<Token<'a>, ParseError> {
        self.scanner.advance(1); // Skip '!'

        if self.scanner.starts_with(b"--") {
            self.parse_comment(start)
        } else if self.scanner.starts_with(b"[CDATA[") {
            self.parse_cdata(start)
        } else if self.scanner.starts_with(b"DOCTYPE") {
            self.parse_doctype(start)
        } else {
            Err(self.error("unrecognized markup declaration", start))
        }
    }

    /// Parse a comment `<!--...-->`
    fn parse_comment(&mut self, start: usize) -> Result<Token<'a>, ParseError> {
        self.scanner.advance(2); // Skip '--'
        let content_start = self.scanner.position();

        loop {
            let pos = self
                .scanner
                .find_byte(b'-')
                .ok_or_else(|| self.error("unterminated comment", start))?;
            self.scanner.set_position(pos);

            if self.scanner.starts_with(b"-->") {
                let content = self.scanner.slice(content_start, pos);
                self.scanner.advance(3);
                return Ok(Token::new(TokenKind::Comment, (start, self.scanner.position()))
                    .with_content(Cow::Borrowed(content)));
            }
            self.scanner.advance(1);
        }
    }

    /// Parse a CDATA section `<![CDATA[...]]>`
    ///
    /// Content is returned verbatim; entities are never decoded inside CDATA.
    fn parse_cdata(&mut self, start: usize) -> Result<Token<'a>, ParseError> {
        self.scanner.advance(7); // Skip '[CDATA['
        let content_start = self.scanner.position();

        loop {
            let pos = self
                .scanner
                .find_byte(b']')
                .ok_or_else(|| self.error("unterminated CDATA section", start))?;
            self.scanner.set_position(pos);

            if self.scanner.starts_with(b"]]>") {
                let content = self.scanner.slice(content_start, pos);
                self.scanner.advance(3);
                return Ok(Token::new(TokenKind::CData, (start, self.scanner.position()))
                    .with_content(Cow::Borrowed(content)));
            }
            self.scanner.advance(1);
        }
    }

    /// Parse a DOCTYPE declaration
    ///
    /// Scans to the closing '>', tracking quoted literals and the internal
    /// subset brackets so that '>' inside either does not end the token.
    fn parse_doctype(&mut self, start: usize) -> Result<Token<'a>, ParseError> {
        self.scanner.advance(7); // Skip 'DOCTYPE'

        let mut in_internal_subset = false;
        let mut in_string = false;
        let mut string_char: u8 = 0;

        while let Some(b) = self.scanner.peek() {
            if in_string {
                if b == string_char {
                    in_string = false;
                }
                self.scanner.advance(1);
                continue;
            }
            match b {
                b'"' | b'\'' => {
                    in_string = true;
                    string_char = b;
                }
                b'[' => in_internal_subset = true,
                b']' => in_internal_subset = false,
                b'>' if !in_internal_subset => {
                    self.scanner.advance(1);
                    return Ok(Token::new(TokenKind::DocType, (start, self.scanner.position())));
                }
                _ => {}
            }
            self.scanner.advance(1);
        }
        Err(self.error("unterminated DOCTYPE declaration", start))
    }

    /// Parse a processing instruction `<?target ...?>` or XML declaration
    fn parse_pi(&mut self, start: usize) -> Result<Token<'a>, ParseError> {
        self.scanner.advance(1); // Skip '?'

        let name = self
            .scanner
            .read_name()
            .ok_or_else(|| self.error_here("invalid processing instruction target"))?;

        loop {
            let pos = self
                .scanner
                .find_byte(b'?')
                .ok_or_else(|| self.error("unterminated processing instruction", start))?;
            self.scanner.set_position(pos);

            if self.scanner.starts_with(b"?>") {
                self.scanner.advance(2);
                let kind = if name.eq_ignore_ascii_case(b"xml") {
                    TokenKind::XmlDeclaration
                } else {
                    TokenKind::ProcessingInstruction
                };
                return Ok(Token::new(kind, (start, self.scanner.position())).with_name(name));
            }
            self.scanner.advance(1);
        }
    }

    /// Parse text content up to the next '<' (or end of input)
    fn parse_text(&mut self) -> Result<Token<'a>, ParseError> {
        let start = self.scanner.position();
        let end = self
            .scanner
            .find_tag_start()
            .unwrap_or(start + self.scanner.remaining().len());

        let content = self.scanner.slice(start, end);
        self.scanner.set_position(end);

        let decoded = super::entities::decode_text(content);
        Ok(Token::new(TokenKind::Text, (start, end)).with_content(decoded))
    }

    fn error(&self, message: &str, position: usize) -> ParseError {
        ParseError::new(message, position)
    }

    fn error_here(&self, message: &str) -> ParseError {
        ParseError::new(message, self.scanner.position())
    }
}

/// Iterator adapter for the tokenizer; stops after the Eof token
impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Token<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token()? {
            Ok(token) if token.kind == TokenKind::Eof => None,
            other => Some(other),
        }
    }
}
