//! Streaming XML writer
//!
//! [`XmlOutputStream`] owns its sink and the session state needed to produce
//! well-indented markup: whether a start tag is still open, whether the last
//! output was character data, and the current nesting depth. The type is
//! deliberately not `Clone`; pass `&mut sink` as the sink type to write into
//! a buffer owned elsewhere.
//!
//! Writes never return errors. The first I/O failure is recorded and all
//! later output is discarded; check [`XmlOutputStream::is_good`] or
//! [`XmlOutputStream::into_inner`] once writing is done.

use std::borrow::Cow;
use std::io::{self, Write};

use time::macros::format_description;
use time::OffsetDateTime;
use tracing::warn;

use crate::error::Result;
use crate::xml::attributes::XmlAttributes;
use crate::xml::escape::{escape, escape_attribute, format_double};
use crate::xml::namespaces::XmlNamespaces;
use crate::xml::triple::XmlTriple;

const INDENT: &str = "  ";

/// Identification of the program writing a document
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgramInfo {
    pub name: String,
    pub version: String,
}

impl ProgramInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Configuration for the XML writer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriterConfig {
    /// Break lines and indent nested elements
    pub indent: bool,
    /// Emit `<?xml ...?>` when writing a document
    pub xml_declaration: bool,
    /// Encoding name declared in the XML declaration
    pub encoding: String,
    /// Emit a "Created by" comment after the declaration
    pub program: Option<ProgramInfo>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            indent: true,
            xml_declaration: false,
            encoding: "UTF-8".to_string(),
            program: None,
        }
    }
}

impl WriterConfig {
    /// Single-line output with no declaration
    pub fn compact() -> Self {
        Self {
            indent: false,
            ..Self::default()
        }
    }

    pub fn with_indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_declaration(mut self, encoding: impl Into<String>) -> Self {
        self.xml_declaration = true;
        self.encoding = encoding.into();
        self
    }

    pub fn with_program(mut self, program: ProgramInfo) -> Self {
        self.program = Some(program);
        self
    }
}

/// Values accepted by [`XmlOutputStream::write_attribute`]
///
/// Returning `None` suppresses the attribute entirely.
pub trait AttributeValue {
    fn render(&self) -> Option<Cow<'_, str>>;
}

impl AttributeValue for &str {
    fn render(&self) -> Option<Cow<'_, str>> {
        (!self.is_empty()).then_some(Cow::Borrowed(*self))
    }
}

impl AttributeValue for String {
    fn render(&self) -> Option<Cow<'_, str>> {
        (!self.is_empty()).then_some(Cow::Borrowed(self.as_str()))
    }
}

impl AttributeValue for &String {
    fn render(&self) -> Option<Cow<'_, str>> {
        (!self.is_empty()).then_some(Cow::Borrowed(self.as_str()))
    }
}

impl AttributeValue for Option<&str> {
    fn render(&self) -> Option<Cow<'_, str>> {
        self.and_then(|s| (!s.is_empty()).then_some(Cow::Borrowed(s)))
    }
}

impl AttributeValue for bool {
    fn render(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if *self { "true" } else { "false" }))
    }
}

impl AttributeValue for f64 {
    fn render(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(format_double(*self)))
    }
}

macro_rules! integer_attribute_value {
    ($($ty:ty),*) => {
        $(
            impl AttributeValue for $ty {
                fn render(&self) -> Option<Cow<'_, str>> {
                    Some(Cow::Owned(self.to_string()))
                }
            }
        )*
    };
}

integer_attribute_value!(i32, i64, u32);

/// Stateful XML writer over an [`io::Write`] sink
#[derive(Debug)]
pub struct XmlOutputStream<W: Write> {
    sink: W,
    config: WriterConfig,
    in_start: bool,
    in_text: bool,
    skip_next_indent: bool,
    at_line_start: bool,
    depth: usize,
    error: Option<io::Error>,
}

impl<W: Write> XmlOutputStream<W> {
    /// Writer with the default configuration
    pub fn new(sink: W) -> Self {
        Self::with_config(sink, WriterConfig::default())
    }

    pub fn with_config(sink: W, config: WriterConfig) -> Self {
        Self {
            sink,
            config,
            in_start: false,
            in_text: false,
            skip_next_indent: false,
            at_line_start: true,
            depth: 0,
            error: None,
        }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub const fn depth(&self) -> usize {
        self.depth
    }

    pub const fn in_start(&self) -> bool {
        self.in_start
    }

    pub const fn in_text(&self) -> bool {
        self.in_text
    }

    /// False once any write to the sink has failed
    pub const fn is_good(&self) -> bool {
        self.error.is_none()
    }

    pub fn io_error(&self) -> Option<&io::Error> {
        self.error.as_ref()
    }

    /// Flush and return the sink, or the first I/O error encountered
    pub fn into_inner(mut self) -> Result<W> {
        self.flush();
        match self.error.take() {
            Some(err) => Err(err.into()),
            None => Ok(self.sink),
        }
    }

    pub fn flush(&mut self) {
        if self.error.is_none() {
            if let Err(err) = self.sink.flush() {
                warn!("xml sink flush failed: {err}");
                self.error = Some(err);
            }
        }
    }

    fn emit(&mut self, text: &str) {
        if self.error.is_some() || text.is_empty() {
            return;
        }
        match self.sink.write_all(text.as_bytes()) {
            Ok(()) => self.at_line_start = text.ends_with('\n'),
            Err(err) => {
                warn!("xml sink write failed: {err}");
                self.error = Some(err);
            }
        }
    }

    fn close_start_tag(&mut self) {
        if self.in_start {
            self.in_start = false;
            self.emit(">");
        }
    }

    fn write_indent(&mut self) {
        if !self.config.indent {
            return;
        }
        if !self.at_line_start {
            self.emit("\n");
        }
        for _ in 0..self.depth {
            self.emit(INDENT);
        }
    }

    /// Write `<?xml version="1.0" encoding="..."?>` on its own line
    pub fn write_xml_decl(&mut self) {
        let decl = format!(
            "<?xml version=\"1.0\" encoding=\"{}\"?>\n",
            escape(&self.config.encoding)
        );
        self.emit(&decl);
    }

    /// Write the "Created by" comment stamped with the current UTC time
    pub fn write_comment(&mut self, program: &ProgramInfo) {
        self.write_comment_at(program, OffsetDateTime::now_utc());
    }

    /// Write the "Created by" comment with an explicit timestamp
    ///
    /// Nothing is written when the program name is empty.
    pub fn write_comment_at(&mut self, program: &ProgramInfo, at: OffsetDateTime) {
        if program.name.is_empty() {
            return;
        }
        let stamp = at
            .format(&format_description!("[year]-[month]-[day] [hour]:[minute]"))
            .unwrap_or_default();
        let mut comment = format!("<!-- Created by {}", program.name);
        if !program.version.is_empty() {
            comment.push_str(" version ");
            comment.push_str(&program.version);
        }
        comment.push_str(&format!(
            " on {stamp} with sbxml version {}. -->\n",
            env!("CARGO_PKG_VERSION")
        ));
        self.emit(&comment);
    }

    /// Write the declaration and program comment requested by the config
    pub fn write_prologue(&mut self) {
        if self.config.xml_declaration {
            self.write_xml_decl();
        }
        if let Some(program) = self.config.program.clone() {
            self.write_comment(&program);
        }
    }

    /// Open `<name`; attributes may follow until the next content
    pub fn start_element(&mut self, triple: &XmlTriple) {
        self.close_start_tag();
        if self.in_text {
            // keep markup inline with the preceding character data
            self.in_text = false;
        } else {
            self.write_indent();
        }
        self.emit("<");
        self.emit(&triple.prefixed_name());
        self.in_start = true;
        self.depth += 1;
    }

    /// Close an element, as `/>` when nothing was written inside it
    pub fn end_element(&mut self, triple: &XmlTriple) {
        self.depth = self.depth.saturating_sub(1);
        if self.in_start {
            self.in_start = false;
            self.emit("/>");
            return;
        }
        if self.in_text || self.skip_next_indent {
            self.in_text = false;
            self.skip_next_indent = false;
        } else {
            self.write_indent();
        }
        self.emit("</");
        self.emit(&triple.prefixed_name());
        self.emit(">");
    }

    /// Write `<name/>`
    pub fn start_end_element(&mut self, triple: &XmlTriple) {
        self.start_element(triple);
        self.end_element(triple);
    }

    /// Keep the next closing tag on the current line
    pub fn skip_next_indent(&mut self) {
        self.skip_next_indent = true;
    }

    /// Write an unqualified attribute into the open start tag
    pub fn write_attribute<V: AttributeValue>(&mut self, name: &str, value: V) {
        self.write_attribute_raw(name, value.render());
    }

    pub fn write_attribute_prefixed<V: AttributeValue>(&mut self, name: &str, prefix: &str, value: V) {
        if prefix.is_empty() {
            self.write_attribute_raw(name, value.render());
        } else {
            self.write_attribute_raw(&format!("{prefix}:{name}"), value.render());
        }
    }

    pub fn write_attribute_triple<V: AttributeValue>(&mut self, triple: &XmlTriple, value: V) {
        self.write_attribute_raw(&triple.prefixed_name(), value.render());
    }

    fn write_attribute_raw(&mut self, qname: &str, value: Option<Cow<'_, str>>) {
        let Some(value) = value else {
            return;
        };
        if !self.in_start {
            warn!("attribute {qname} written outside a start tag, ignored");
            return;
        }
        let text = format!(" {qname}=\"{}\"", escape_attribute(&value));
        self.emit(&text);
    }

    /// Write `xmlns` declarations into the open start tag
    pub fn write_namespaces(&mut self, namespaces: &XmlNamespaces) {
        for (uri, prefix) in namespaces.iter() {
            let qname = if prefix.is_empty() {
                Cow::Borrowed("xmlns")
            } else {
                Cow::Owned(format!("xmlns:{prefix}"))
            };
            // an empty default-namespace URI is meaningful, so bypass suppression
            self.write_attribute_raw(&qname, Some(Cow::Borrowed(uri)));
        }
    }

    pub fn write_attributes(&mut self, attributes: &XmlAttributes) {
        for attr in attributes {
            self.write_attribute_raw(&attr.triple.prefixed_name(), Some(Cow::Borrowed(&attr.value)));
        }
    }

    /// Write escaped character data
    pub fn write_chars(&mut self, chars: &str) {
        self.close_start_tag();
        if chars.is_empty() {
            return;
        }
        let escaped = escape(chars);
        self.emit(&escaped);
        self.in_text = true;
    }

    /// Terminate the document with a newline when indenting, then flush
    pub fn end_document(&mut self) {
        self.close_start_tag();
        if self.config.indent && !self.at_line_start {
            self.emit("\n");
        }
        self.flush();
    }
}

impl XmlOutputStream<Vec<u8>> {
    /// Writer into an owned in-memory buffer
    pub fn buffer(config: WriterConfig) -> Self {
        Self::with_config(Vec::new(), config)
    }

    /// Consume the writer and return the text written so far
    pub fn into_string(self) -> String {
        match String::from_utf8(self.sink) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        }
    }
}
