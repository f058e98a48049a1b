//! XML lexical units

use std::fmt;
use std::io::Write;

use crate::error::{Error, ErrorKind, Pos, Result, Span};
use crate::xml::attributes::XmlAttributes;
use crate::xml::namespaces::XmlNamespaces;
use crate::xml::output::XmlOutputStream;
use crate::xml::triple::XmlTriple;

/// Kind of an XML token
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TokenKind {
    StartElement,
    EndElement,
    /// `<name/>`: both a start and an end
    SelfClosingElement,
    Text,
    /// End of stream, also used for name-less container nodes
    #[default]
    Eof,
}

impl TokenKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::StartElement => "start element",
            Self::EndElement => "end element",
            Self::SelfClosingElement => "self-closing element",
            Self::Text => "text",
            Self::Eof => "EOF",
        }
    }
}

/// One XML lexical unit with its source position
///
/// Element tokens carry a name, attributes and namespace declarations; text
/// tokens carry only characters. Mutators enforce this split and report
/// `InvalidXmlOperation` without touching the token.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct XmlToken {
    kind: TokenKind,
    triple: XmlTriple,
    attributes: XmlAttributes,
    namespaces: XmlNamespaces,
    chars: String,
    pos: Pos,
}

impl XmlToken {
    /// End-of-stream token
    pub fn eof() -> Self {
        Self::default()
    }

    pub fn start(triple: XmlTriple, attributes: XmlAttributes, namespaces: XmlNamespaces) -> Self {
        Self {
            kind: TokenKind::StartElement,
            triple,
            attributes,
            namespaces,
            ..Self::default()
        }
    }

    /// Start element without attributes or namespaces
    pub fn start_element(triple: XmlTriple) -> Self {
        Self::start(triple, XmlAttributes::new(), XmlNamespaces::new())
    }

    pub fn self_closing(
        triple: XmlTriple,
        attributes: XmlAttributes,
        namespaces: XmlNamespaces,
    ) -> Self {
        Self {
            kind: TokenKind::SelfClosingElement,
            ..Self::start(triple, attributes, namespaces)
        }
    }

    pub fn end(triple: XmlTriple) -> Self {
        Self {
            kind: TokenKind::EndElement,
            triple,
            ..Self::default()
        }
    }

    pub fn text(chars: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Text,
            chars: chars.into(),
            ..Self::default()
        }
    }

    /// Attach a source position
    pub fn with_pos(mut self, pos: Pos) -> Self {
        self.pos = pos;
        self
    }

    pub const fn kind(&self) -> TokenKind {
        self.kind
    }

    pub const fn is_start(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::StartElement | TokenKind::SelfClosingElement
        )
    }

    pub const fn is_end(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::EndElement | TokenKind::SelfClosingElement
        )
    }

    pub const fn is_self_closing(&self) -> bool {
        matches!(self.kind, TokenKind::SelfClosingElement)
    }

    pub const fn is_element(&self) -> bool {
        self.is_start() || self.is_end()
    }

    pub const fn is_text(&self) -> bool {
        matches!(self.kind, TokenKind::Text)
    }

    pub const fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    /// True for a text token containing only XML whitespace
    pub fn is_whitespace_text(&self) -> bool {
        self.is_text() && self.chars.trim().is_empty()
    }

    pub fn triple(&self) -> &XmlTriple {
        &self.triple
    }

    pub fn name(&self) -> &str {
        self.triple.name()
    }

    pub fn uri(&self) -> &str {
        self.triple.uri()
    }

    pub fn prefix(&self) -> &str {
        self.triple.prefix()
    }

    pub fn attributes(&self) -> &XmlAttributes {
        &self.attributes
    }

    pub fn namespaces(&self) -> &XmlNamespaces {
        &self.namespaces
    }

    pub fn characters(&self) -> &str {
        &self.chars
    }

    pub const fn pos(&self) -> Pos {
        self.pos
    }

    pub const fn line(&self) -> u32 {
        self.pos.line
    }

    pub const fn column(&self) -> u32 {
        self.pos.col
    }

    /// Value of the first attribute named `name`
    pub fn attr_value(&self, name: &str) -> Option<&str> {
        self.attributes.value_of(name)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.has(name)
    }

    fn require_element(&self) -> Result<()> {
        if self.is_element() {
            Ok(())
        } else {
            Err(invalid_operation(self.kind, "element"))
        }
    }

    fn require_start(&self) -> Result<()> {
        if self.is_start() {
            Ok(())
        } else {
            Err(invalid_operation(self.kind, "start element"))
        }
    }

    pub fn set_triple(&mut self, triple: XmlTriple) -> Result<()> {
        self.require_element()?;
        self.triple = triple;
        Ok(())
    }

    pub fn add_attr(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        self.require_start()?;
        self.attributes.add(name, value)
    }

    pub fn add_attr_qualified(
        &mut self,
        name: &str,
        value: impl Into<String>,
        uri: &str,
        prefix: &str,
    ) -> Result<()> {
        self.require_start()?;
        self.attributes.add_qualified(name, value, uri, prefix)
    }

    pub fn set_attributes(&mut self, attributes: XmlAttributes) -> Result<()> {
        self.require_start()?;
        self.attributes = attributes;
        Ok(())
    }

    /// Remove the first attribute named `name`; absent names are a no-op
    pub fn remove_attr(&mut self, name: &str) -> Result<()> {
        self.require_start()?;
        self.attributes.remove_named(name);
        Ok(())
    }

    pub fn clear_attributes(&mut self) -> Result<()> {
        self.require_start()?;
        self.attributes.clear();
        Ok(())
    }

    pub fn add_namespace(&mut self, uri: &str, prefix: &str) -> Result<()> {
        self.require_start()?;
        self.namespaces.add(uri, prefix)
    }

    pub fn set_namespaces(&mut self, namespaces: XmlNamespaces) -> Result<()> {
        self.require_start()?;
        self.namespaces = namespaces;
        Ok(())
    }

    pub fn remove_namespace(&mut self, prefix: &str) -> Result<()> {
        self.require_start()?;
        self.namespaces.remove_prefix(prefix);
        Ok(())
    }

    pub fn clear_namespaces(&mut self) -> Result<()> {
        self.require_start()?;
        self.namespaces.clear();
        Ok(())
    }

    /// Append characters to a text token
    pub fn append(&mut self, chars: &str) -> Result<()> {
        if !self.is_text() {
            return Err(invalid_operation(self.kind, "text"));
        }
        self.chars.push_str(chars);
        Ok(())
    }

    /// Mark a start element as also ending (self-closing)
    pub fn set_end(&mut self) -> Result<()> {
        match self.kind {
            TokenKind::StartElement => {
                self.kind = TokenKind::SelfClosingElement;
                Ok(())
            }
            TokenKind::EndElement | TokenKind::SelfClosingElement => Ok(()),
            kind => Err(invalid_operation(kind, "element")),
        }
    }

    /// Turn a self-closing element back into a plain start element
    pub fn unset_end(&mut self) -> Result<()> {
        match self.kind {
            TokenKind::SelfClosingElement => {
                self.kind = TokenKind::StartElement;
                Ok(())
            }
            TokenKind::StartElement => Ok(()),
            kind => Err(invalid_operation(kind, "start element")),
        }
    }

    /// Reset to an end-of-stream marker, dropping name, attributes and text
    pub fn set_eof(&mut self) {
        let pos = self.pos;
        *self = Self::eof().with_pos(pos);
    }

    /// Write this token alone; start elements are left open
    pub fn write<W: Write>(&self, stream: &mut XmlOutputStream<W>) {
        match self.kind {
            TokenKind::Eof => {}
            TokenKind::Text => stream.write_chars(&self.chars),
            TokenKind::EndElement => stream.end_element(&self.triple),
            TokenKind::StartElement | TokenKind::SelfClosingElement => {
                stream.start_element(&self.triple);
                stream.write_namespaces(&self.namespaces);
                stream.write_attributes(&self.attributes);
                if self.is_self_closing() {
                    stream.end_element(&self.triple);
                }
            }
        }
    }
}

fn invalid_operation(kind: TokenKind, required: &str) -> Error {
    Error::with_message(
        ErrorKind::InvalidXmlOperation,
        Span::empty(),
        format!("operation requires a {required} token, found {}", kind.name()),
    )
}

impl fmt::Display for XmlToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::StartElement => write!(f, "<{}>", self.triple),
            TokenKind::EndElement => write!(f, "</{}>", self.triple),
            TokenKind::SelfClosingElement => write!(f, "<{}/>", self.triple),
            TokenKind::Text => f.write_str(&self.chars),
            TokenKind::Eof => Ok(()),
        }
    }
}
