//! Whole-document parsing and writing

use std::io::Write;

use tracing::instrument;

use crate::error::{Error, ErrorKind, Result, Span};
use crate::xml::input::{ReaderConfig, TokenSource, XmlInputStream};
use crate::xml::node::XmlNode;
use crate::xml::output::{WriterConfig, XmlOutputStream};

/// A parsed XML document: prologue details plus the root element
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct XmlDocument {
    pub version: Option<String>,
    pub encoding: Option<String>,
    pub root: XmlNode,
}

impl XmlDocument {
    pub fn new(root: XmlNode) -> Self {
        Self {
            version: None,
            encoding: None,
            root,
        }
    }

    /// Write prologue, root element and a final newline
    pub fn write<W: Write>(&self, stream: &mut XmlOutputStream<W>) {
        stream.write_prologue();
        self.root.write(stream);
        stream.end_document();
    }

    pub fn to_xml_string(&self, config: WriterConfig) -> String {
        let mut stream = XmlOutputStream::buffer(config);
        self.write(&mut stream);
        stream.into_string()
    }
}

/// Parse a complete document with default limits
pub fn parse_document(input: &str) -> Result<XmlDocument> {
    parse_document_with(input, ReaderConfig::default())
}

#[instrument(skip(input), fields(len = input.len()))]
pub fn parse_document_with(input: &str, config: ReaderConfig) -> Result<XmlDocument> {
    let mut stream = XmlInputStream::with_config(input, config);
    let root = XmlNode::from_stream(&mut stream);
    if let Some(err) = stream.error() {
        return Err(err.clone());
    }
    if !root.is_start() {
        return Err(Error::with_message(
            ErrorKind::UnexpectedEof,
            Span::at(root.pos()),
            "document has no root element",
        ));
    }

    let next = stream.next_token();
    if let Some(err) = stream.error() {
        return Err(err.clone());
    }
    if !next.is_eof() {
        return Err(Error::with_message(
            ErrorKind::InvalidToken,
            Span::at(next.pos()),
            "content after the root element",
        ));
    }

    Ok(XmlDocument {
        version: stream.version().map(str::to_string),
        encoding: stream.encoding().map(str::to_string),
        root,
    })
}

/// Write `root` as a document into `sink`, returning the sink
pub fn write_document<W: Write>(root: &XmlNode, sink: W, config: WriterConfig) -> Result<W> {
    let mut stream = XmlOutputStream::with_config(sink, config);
    stream.write_prologue();
    root.write(&mut stream);
    stream.end_document();
    stream.into_inner()
}
