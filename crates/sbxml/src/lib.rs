//! sbxml - XML node tree, streaming writer and MathML evaluator for SBML-style documents
//!
//! # Quick Start
//!
//! ```
//! use sbxml::{XmlNode, XmlTriple};
//! # fn main() -> Result<(), sbxml::Error> {
//! let mut model = XmlNode::start_element(XmlTriple::local("model"));
//! model.add_attr("id", "m1")?;
//! model.add_child(XmlNode::text("x"))?;
//! assert_eq!(model.to_xml_string(), r#"<model id="m1">x</model>"#);
//!
//! let node = sbxml::parse_xml_str("<a><b/></a>")?;
//! assert_eq!(node.num_children(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! Evaluating MathML:
//!
//! ```
//! use sbxml::math::{evaluate, parse_math, Environment};
//! # fn main() -> Result<(), sbxml::Error> {
//! let expr = parse_math("<math><apply><times/><ci>k</ci><cn>2</cn></apply></math>")?;
//! let mut env = Environment::new();
//! env.set("k", 1.5);
//! assert_eq!(evaluate(&expr, &mut env, None), 3.0);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub use error::{Error, ErrorKind, Pos, Result, Span};

pub mod lexer;

pub mod xml;
pub use xml::{
    convert_node_to_string, convert_string_to_node, parse_document, parse_document_with,
    write_document, EqualityOptions, ProgramInfo, ReaderConfig, TokenBuffer, TokenKind,
    TokenSource, WriterConfig, XmlAttribute, XmlAttributes, XmlDocument, XmlInputStream,
    XmlNamespaces, XmlNode, XmlOutputStream, XmlToken, XmlTriple,
};

pub mod math;
pub use math::{evaluate, Environment, FunctionDefinition, MathNode};

/// Parse XML text into its root element
pub fn parse_xml_str(s: &str) -> Result<XmlNode> {
    parse_document(s).map(|doc| doc.root)
}

/// Parse XML text with custom reader limits
pub fn parse_xml_str_with_config(s: &str, config: ReaderConfig) -> Result<XmlNode> {
    parse_document_with(s, config).map(|doc| doc.root)
}

/// Serialize a node with the default writer settings
pub fn to_xml_string(node: &XmlNode) -> String {
    node.to_xml_string()
}
