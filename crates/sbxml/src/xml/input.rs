//! XML tokenizer feeding the node tree builder

use std::collections::VecDeque;

use tracing::debug;

use crate::error::{Error, ErrorKind, Pos, Result, Span};
use crate::lexer::Cursor;
use crate::xml::attributes::XmlAttributes;
use crate::xml::escape::decode_entities;
use crate::xml::namespaces::XmlNamespaces;
use crate::xml::token::XmlToken;
use crate::xml::triple::XmlTriple;

/// Namespace URI permanently bound to the `xml` prefix
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Configuration for the XML tokenizer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Maximum element nesting depth (0 means unlimited)
    pub max_depth: u16,
    /// Maximum input size in bytes (0 means unlimited)
    pub max_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_depth: 128,
            max_size: 10 * 1024 * 1024, // 10 MB default
        }
    }
}

impl ReaderConfig {
    /// Create a new config with unlimited depth and size
    ///
    /// Building, writing, comparing and dropping a node tree all recurse once
    /// per nesting level, so untrusted input read with this config can
    /// exhaust the stack. Keep a nonzero `max_depth` for such input.
    pub const fn unlimited() -> Self {
        Self {
            max_depth: 0,
            max_size: 0,
        }
    }

    pub const fn new(max_depth: u16, max_size: usize) -> Self {
        Self {
            max_depth,
            max_size,
        }
    }
}

/// A stream of XML tokens
///
/// The node builder only needs one token of lookahead. Sources report the end
/// of input, and any error, through an endless run of EOF tokens.
pub trait TokenSource {
    fn next_token(&mut self) -> XmlToken;

    fn peek_token(&mut self) -> &XmlToken;

    /// False after an error or once the end of input has been seen
    fn is_good(&self) -> bool;

    fn is_eof(&mut self) -> bool {
        self.peek_token().is_eof()
    }

    /// Discard text tokens up to the next element or EOF
    fn skip_text(&mut self) {
        while self.peek_token().is_text() {
            self.next_token();
        }
    }
}

/// In-memory token source
#[derive(Clone, Debug, Default)]
pub struct TokenBuffer {
    tokens: VecDeque<XmlToken>,
    eof: XmlToken,
}

impl TokenBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: XmlToken) {
        self.tokens.push_back(token);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl FromIterator<XmlToken> for TokenBuffer {
    fn from_iter<I: IntoIterator<Item = XmlToken>>(iter: I) -> Self {
        Self {
            tokens: iter.into_iter().collect(),
            eof: XmlToken::eof(),
        }
    }
}

impl TokenSource for TokenBuffer {
    fn next_token(&mut self) -> XmlToken {
        self.tokens.pop_front().unwrap_or_default()
    }

    fn peek_token(&mut self) -> &XmlToken {
        self.tokens.front().unwrap_or(&self.eof)
    }

    fn is_good(&self) -> bool {
        self.tokens.front().is_some_and(|token| !token.is_eof())
    }
}

#[derive(Debug)]
struct Scope {
    qname: String,
    namespaces: XmlNamespaces,
}

/// Tokenizer over XML text
///
/// Comments, processing instructions and DOCTYPE declarations are skipped;
/// CDATA sections become text tokens; `xmlns` attributes are moved into the
/// token's namespace list and every prefix is resolved to its URI.
/// Whitespace outside the root element is dropped.
#[derive(Debug)]
pub struct XmlInputStream<'a> {
    cursor: Cursor<'a>,
    config: ReaderConfig,
    lookahead: Option<XmlToken>,
    scopes: Vec<Scope>,
    errors: Vec<Error>,
    version: Option<String>,
    encoding: Option<String>,
    seen_element: bool,
    finished: bool,
}

impl<'a> XmlInputStream<'a> {
    /// Create a tokenizer with default limits
    pub fn new(input: &'a str) -> Self {
        Self::with_config(input, ReaderConfig::default())
    }

    pub fn with_config(input: &'a str, config: ReaderConfig) -> Self {
        let mut stream = Self {
            cursor: Cursor::new(input.as_bytes()),
            config,
            lookahead: None,
            scopes: Vec::new(),
            errors: Vec::new(),
            version: None,
            encoding: None,
            seen_element: false,
            finished: false,
        };
        if config.max_size > 0 && input.len() > config.max_size {
            stream.fail(Error::operation(ErrorKind::MaxSizeExceeded {
                max: config.max_size,
            }));
        }
        stream
    }

    /// Version from the XML declaration, if one was read
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Encoding from the XML declaration, if one was read
    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// First error encountered, if any
    pub fn error(&self) -> Option<&Error> {
        self.errors.first()
    }

    /// Current nesting depth of open elements
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn fail(&mut self, err: Error) {
        debug!("xml input error: {err}");
        self.errors.push(err);
        self.finished = true;
    }

    fn read_token(&mut self) -> XmlToken {
        let eof = XmlToken::eof().with_pos(self.cursor.position());
        if self.finished {
            return eof;
        }
        match self.scan() {
            Ok(Some(token)) => token,
            Ok(None) => {
                self.finished = true;
                if let Some(scope) = self.scopes.last() {
                    let message = format!("unexpected end of input inside <{}>", scope.qname);
                    self.fail(Error::with_message(
                        ErrorKind::UnexpectedEof,
                        Span::at(self.cursor.position()),
                        message,
                    ));
                }
                eof
            }
            Err(err) => {
                self.fail(err);
                eof
            }
        }
    }

    fn scan(&mut self) -> Result<Option<XmlToken>> {
        loop {
            if self.cursor.is_eof() {
                return Ok(None);
            }
            let pos = self.cursor.position();

            if self.cursor.starts_with(b"<?") {
                self.read_processing_instruction()?;
            } else if self.cursor.starts_with(b"<!--") {
                self.cursor.advance_by(4);
                self.skip_until(b"-->")?;
            } else if self.cursor.starts_with(b"<![CDATA[") {
                self.cursor.advance_by(9);
                let text = self.read_until(b"]]>")?;
                if self.scopes.is_empty() {
                    return Err(error_at(pos, "CDATA section outside the root element"));
                }
                return Ok(Some(XmlToken::text(text).with_pos(pos)));
            } else if self.cursor.starts_with(b"<!") {
                self.skip_doctype()?;
            } else if self.cursor.starts_with(b"</") {
                return self.read_end_tag(pos).map(Some);
            } else if self.cursor.current() == Some(b'<') {
                return self.read_start_tag(pos).map(Some);
            } else {
                let text = self.read_text()?;
                if !self.scopes.is_empty() {
                    return Ok(Some(XmlToken::text(text).with_pos(pos)));
                }
                if !text.trim().is_empty() {
                    return Err(error_at(pos, "character data outside the root element"));
                }
            }
        }
    }

    fn read_processing_instruction(&mut self) -> Result<()> {
        // cursor at '<?'
        self.cursor.advance_by(2);
        let target = self.read_name()?;
        if target != "xml" {
            return self.skip_until(b"?>");
        }
        if self.seen_element || self.version.is_some() {
            return Err(error_at(
                self.cursor.position(),
                "XML declaration must start the document",
            ));
        }

        for (name, value) in self.read_raw_attributes()? {
            match name.as_str() {
                "version" => self.version = Some(value),
                "encoding" => self.encoding = Some(value),
                _ => {}
            }
        }
        self.cursor.skip_whitespace();
        if !self.cursor.starts_with(b"?>") {
            return Err(error_at(self.cursor.position(), "unterminated XML declaration"));
        }
        self.cursor.advance_by(2);
        Ok(())
    }

    fn read_start_tag(&mut self, pos: Pos) -> Result<XmlToken> {
        self.cursor.advance();
        let qname = self.read_name()?;
        let raw = self.read_raw_attributes()?;
        let self_closing = self.cursor.consume(b'/');
        self.expect_byte(b'>')?;

        if self.config.max_depth > 0 && self.scopes.len() >= usize::from(self.config.max_depth) {
            return Err(Error::at(
                ErrorKind::MaxDepthExceeded {
                    max: self.config.max_depth,
                },
                pos,
            ));
        }

        let mut namespaces = XmlNamespaces::new();
        let mut plain = Vec::with_capacity(raw.len());
        for (name, value) in raw {
            if name == "xmlns" {
                namespaces.add(&value, "")?;
            } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                namespaces
                    .add(&value, prefix)
                    .map_err(|err| Error::with_message(err.kind().clone(), Span::at(pos), err.message()))?;
            } else {
                plain.push((name, value));
            }
        }

        self.seen_element = true;
        self.scopes.push(Scope {
            qname: qname.clone(),
            namespaces: namespaces.clone(),
        });

        let (prefix, local) = split_qname(&qname);
        let triple = XmlTriple::new(local, self.resolve(prefix, pos)?, prefix);

        let mut attributes = XmlAttributes::new();
        for (name, value) in plain {
            let (prefix, local) = split_qname(&name);
            // unprefixed attributes are in no namespace
            let uri = if prefix.is_empty() {
                String::new()
            } else {
                self.resolve(prefix, pos)?
            };
            if attributes.has_qualified(local, &uri) {
                return Err(Error::at(ErrorKind::DuplicateAttribute { name }, pos));
            }
            attributes
                .add_triple(XmlTriple::new(local, uri, prefix), value)
                .map_err(|err| Error::new(err.kind().clone(), Span::at(pos)))?;
        }

        if self_closing {
            self.scopes.pop();
            Ok(XmlToken::self_closing(triple, attributes, namespaces).with_pos(pos))
        } else {
            Ok(XmlToken::start(triple, attributes, namespaces).with_pos(pos))
        }
    }

    fn read_end_tag(&mut self, pos: Pos) -> Result<XmlToken> {
        self.cursor.advance_by(2);
        let qname = self.read_name()?;
        self.cursor.skip_whitespace();
        self.expect_byte(b'>')?;

        let Some(open) = self.scopes.last() else {
            return Err(error_at(pos, "closing tag without matching start tag"));
        };
        if open.qname != qname {
            return Err(Error::at(
                ErrorKind::MismatchedTag {
                    expected: open.qname.clone(),
                    found: qname,
                },
                pos,
            ));
        }

        let (prefix, local) = split_qname(&qname);
        let uri = self.resolve(prefix, pos)?;
        self.scopes.pop();
        Ok(XmlToken::end(XmlTriple::new(local, uri, prefix)).with_pos(pos))
    }

    fn resolve(&self, prefix: &str, pos: Pos) -> Result<String> {
        if prefix == "xml" {
            return Ok(XML_NAMESPACE.to_string());
        }
        let bound = self
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.namespaces.uri_for_prefix(prefix));
        match bound {
            Some(uri) => Ok(uri.to_string()),
            None if prefix.is_empty() => Ok(String::new()),
            None => Err(Error::at(
                ErrorKind::UnboundPrefix {
                    prefix: prefix.to_string(),
                },
                pos,
            )),
        }
    }

    fn read_raw_attributes(&mut self) -> Result<Vec<(String, String)>> {
        let mut attrs: Vec<(String, String)> = Vec::new();

        loop {
            self.cursor.skip_whitespace();
            match self.cursor.current() {
                Some(b'/' | b'>' | b'?') => break,
                Some(_) => {}
                None => return Err(Error::at(ErrorKind::UnexpectedEof, self.cursor.position())),
            }

            let pos = self.cursor.position();
            let name = self.read_name()?;
            self.cursor.skip_whitespace();
            self.expect_byte(b'=')?;
            self.cursor.skip_whitespace();
            let value = self.read_attribute_value()?;

            if attrs.iter().any(|(existing, _)| *existing == name) {
                return Err(Error::at(ErrorKind::DuplicateAttribute { name }, pos));
            }
            attrs.push((name, value));
        }

        Ok(attrs)
    }

    fn read_attribute_value(&mut self) -> Result<String> {
        let quote = match self.cursor.current() {
            Some(b'"') => b'"',
            Some(b'\'') => b'\'',
            _ => return Err(error_at(self.cursor.position(), "expected quoted attribute value")),
        };
        self.cursor.advance();

        let pos = self.cursor.position();
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == quote {
                let raw = bytes_to_str(self.cursor.slice_from(start), pos)?;
                self.cursor.advance();
                // attribute-value normalization: literal whitespace becomes a space
                let normalized = raw.replace(['\t', '\n', '\r'], " ");
                return decode(&normalized, pos);
            }
            if b == b'<' {
                return Err(error_at(self.cursor.position(), "'<' in attribute value"));
            }
            self.cursor.advance();
        }

        Err(Error::at(ErrorKind::UnexpectedEof, self.cursor.position()))
    }

    fn read_text(&mut self) -> Result<String> {
        let pos = self.cursor.position();
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == b'<' {
                break;
            }
            self.cursor.advance();
        }

        let raw = bytes_to_str(self.cursor.slice_from(start), pos)?;
        let raw = if raw.contains('\r') {
            raw.replace("\r\n", "\n").replace('\r', "\n")
        } else {
            raw.to_string()
        };
        decode(&raw, pos)
    }

    fn read_name(&mut self) -> Result<String> {
        let pos = self.cursor.position();
        let start = self.cursor.pos();

        match self.cursor.current() {
            Some(b) if is_name_start(b) => self.cursor.advance(),
            Some(_) => return Err(Error::at(ErrorKind::InvalidToken, pos)),
            None => return Err(Error::at(ErrorKind::UnexpectedEof, pos)),
        }
        while let Some(b) = self.cursor.current() {
            if is_name_char(b) {
                self.cursor.advance();
            } else {
                break;
            }
        }

        bytes_to_str(self.cursor.slice_from(start), pos).map(str::to_string)
    }

    fn skip_doctype(&mut self) -> Result<()> {
        // cursor at '<!'
        let mut brackets = 0_usize;
        self.cursor.advance_by(2);
        while let Some(b) = self.cursor.current() {
            self.cursor.advance();
            match b {
                b'[' => brackets += 1,
                b']' => brackets = brackets.saturating_sub(1),
                b'>' if brackets == 0 => return Ok(()),
                _ => {}
            }
        }
        Err(Error::at(ErrorKind::UnexpectedEof, self.cursor.position()))
    }

    fn skip_until(&mut self, pattern: &[u8]) -> Result<()> {
        self.read_until(pattern).map(|_| ())
    }

    fn read_until(&mut self, pattern: &[u8]) -> Result<String> {
        let pos = self.cursor.position();
        let start = self.cursor.pos();
        while !self.cursor.is_eof() {
            if self.cursor.starts_with(pattern) {
                let content = bytes_to_str(self.cursor.slice_from(start), pos)?.to_string();
                self.cursor.advance_by(pattern.len());
                return Ok(content);
            }
            self.cursor.advance();
        }
        Err(Error::with_message(
            ErrorKind::UnexpectedEof,
            Span::at(pos),
            "unterminated markup",
        ))
    }

    fn expect_byte(&mut self, expected: u8) -> Result<()> {
        if self.cursor.consume(expected) {
            Ok(())
        } else {
            Err(error_at(
                self.cursor.position(),
                &format!("expected '{}'", char::from(expected)),
            ))
        }
    }
}

impl TokenSource for XmlInputStream<'_> {
    fn next_token(&mut self) -> XmlToken {
        match self.lookahead.take() {
            Some(token) => token,
            None => self.read_token(),
        }
    }

    fn peek_token(&mut self) -> &XmlToken {
        let token = match self.lookahead.take() {
            Some(token) => token,
            None => self.read_token(),
        };
        self.lookahead.insert(token)
    }

    fn is_good(&self) -> bool {
        let pending_eof = self.lookahead.as_ref().is_some_and(XmlToken::is_eof);
        self.errors.is_empty() && !pending_eof && !(self.finished && self.lookahead.is_none())
    }
}

fn error_at(pos: Pos, message: &str) -> Error {
    Error::with_message(ErrorKind::InvalidToken, Span::at(pos), message)
}

fn decode(raw: &str, pos: Pos) -> Result<String> {
    decode_entities(raw)
        .map(|text| text.into_owned())
        .map_err(|entity| Error::at(ErrorKind::InvalidEntity { entity }, pos))
}

fn bytes_to_str(bytes: &[u8], pos: Pos) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| Error::at(ErrorKind::InvalidUtf8, pos))
}

fn split_qname(qname: &str) -> (&str, &str) {
    qname.split_once(':').unwrap_or(("", qname))
}

fn is_name_start(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':') || b >= 0x80
}

fn is_name_char(b: u8) -> bool {
    is_name_start(b) || matches!(b, b'0'..=b'9' | b'-' | b'.')
}
