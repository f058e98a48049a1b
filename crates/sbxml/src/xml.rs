//! XML tree, tokenizer and streaming writer

pub mod attributes;
pub mod document;
pub mod escape;
pub mod input;
pub mod namespaces;
pub mod node;
pub mod output;
pub mod token;
pub mod triple;

pub use attributes::{XmlAttribute, XmlAttributes};
pub use document::{parse_document, parse_document_with, write_document, XmlDocument};
pub use input::{ReaderConfig, TokenBuffer, TokenSource, XmlInputStream, XML_NAMESPACE};
pub use namespaces::XmlNamespaces;
pub use node::{convert_node_to_string, convert_string_to_node, EqualityOptions, XmlNode};
pub use output::{AttributeValue, ProgramInfo, WriterConfig, XmlOutputStream};
pub use token::{TokenKind, XmlToken};
pub use triple::XmlTriple;
