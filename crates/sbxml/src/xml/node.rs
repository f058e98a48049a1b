//! XML node tree

use std::fmt;
use std::io::Write;
use std::ops::{Deref, DerefMut};

use tracing::{debug, warn};

use crate::error::{Error, ErrorKind, Result, Span};
use crate::xml::attributes::{XmlAttribute, XmlAttributes};
use crate::xml::escape::escape;
use crate::xml::input::{TokenSource, XmlInputStream};
use crate::xml::namespaces::XmlNamespaces;
use crate::xml::output::{WriterConfig, XmlOutputStream};
use crate::xml::token::{TokenKind, XmlToken};
use crate::xml::triple::XmlTriple;

/// Knobs for [`XmlNode::equals_with`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EqualityOptions {
    pub ignore_uri: bool,
    pub ignore_attribute_values: bool,
}

/// An XML token owning an ordered list of children
///
/// Dereferences to [`XmlToken`], so every token accessor and mutator is
/// available on a node.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct XmlNode {
    token: XmlToken,
    children: Vec<XmlNode>,
}

impl XmlNode {
    /// Empty node, usable as a name-less container
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_token(token: XmlToken) -> Self {
        Self {
            token,
            children: Vec::new(),
        }
    }

    pub fn start(triple: XmlTriple, attributes: XmlAttributes, namespaces: XmlNamespaces) -> Self {
        Self::from_token(XmlToken::start(triple, attributes, namespaces))
    }

    pub fn start_element(triple: XmlTriple) -> Self {
        Self::from_token(XmlToken::start_element(triple))
    }

    pub fn end(triple: XmlTriple) -> Self {
        Self::from_token(XmlToken::end(triple))
    }

    pub fn text(chars: impl Into<String>) -> Self {
        Self::from_token(XmlToken::text(chars))
    }

    pub fn token(&self) -> &XmlToken {
        &self.token
    }

    pub fn into_token(self) -> XmlToken {
        self.token
    }

    /// Build a subtree from a token stream
    ///
    /// Reads one token. Element starts collect children until the matching
    /// end token; whitespace-only text between them is dropped, any other
    /// text is kept verbatim. Consecutive text tokens join into one child.
    pub fn from_stream<S: TokenSource + ?Sized>(stream: &mut S) -> Self {
        let mut node = Self::from_token(stream.next_token());
        if node.is_end() || node.is_text() || node.is_eof() {
            return node;
        }

        let mut closed = false;
        while stream.is_good() {
            match stream.peek_token().kind() {
                TokenKind::StartElement | TokenKind::SelfClosingElement => {
                    let child = Self::from_stream(stream);
                    node.children.push(child);
                }
                TokenKind::Text => {
                    let text = stream.next_token();
                    // comments and CDATA sections split one run of character data
                    let merged = node
                        .children
                        .last_mut()
                        .filter(|last| last.is_text())
                        .is_some_and(|last| last.append(text.characters()).is_ok());
                    if !merged && !text.is_whitespace_text() {
                        node.children.push(Self::from_token(text));
                    }
                }
                TokenKind::EndElement => {
                    stream.next_token();
                    closed = true;
                    break;
                }
                TokenKind::Eof => break,
            }
        }

        if !closed {
            debug!(element = node.name(), "token stream ended before closing tag");
        }
        node
    }

    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&XmlNode> {
        self.children.get(index)
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut XmlNode> {
        self.children.get_mut(index)
    }

    /// First child element named `name`
    pub fn child_by_name(&self, name: &str) -> Option<&XmlNode> {
        self.index_of_child(name).and_then(|index| self.children.get(index))
    }

    pub fn child_by_name_mut(&mut self, name: &str) -> Option<&mut XmlNode> {
        self.index_of_child(name)
            .and_then(|index| self.children.get_mut(index))
    }

    pub fn index_of_child(&self, name: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|child| !child.is_text() && child.name() == name)
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.index_of_child(name).is_some()
    }

    fn require_container(&self) -> Result<()> {
        if self.is_start() || self.is_eof() {
            Ok(())
        } else {
            Err(Error::with_message(
                ErrorKind::InvalidXmlOperation,
                Span::empty(),
                format!("cannot add children to a {} node", self.kind().name()),
            ))
        }
    }

    /// Append a child; a self-closing node becomes a plain start element
    pub fn add_child(&mut self, child: XmlNode) -> Result<()> {
        self.require_container()?;
        if self.is_self_closing() {
            self.token.unset_end()?;
        }
        self.children.push(child);
        Ok(())
    }

    /// Insert a child at `index`, appending when `index` is past the end
    pub fn insert_child(&mut self, index: usize, child: XmlNode) -> Result<()> {
        self.require_container()?;
        if self.is_self_closing() {
            self.token.unset_end()?;
        }
        let index = index.min(self.children.len());
        self.children.insert(index, child);
        Ok(())
    }

    /// Detach child `index` and hand it to the caller
    pub fn remove_child(&mut self, index: usize) -> Option<XmlNode> {
        (index < self.children.len()).then(|| self.children.remove(index))
    }

    pub fn remove_children(&mut self) {
        self.children.clear();
    }

    /// Deep structural equality
    pub fn equals(&self, other: &Self, ignore_uri: bool) -> bool {
        self.equals_with(
            other,
            EqualityOptions {
                ignore_uri,
                ignore_attribute_values: false,
            },
        )
    }

    pub fn equals_with(&self, other: &Self, options: EqualityOptions) -> bool {
        if self.is_text() != other.is_text() || self.is_eof() != other.is_eof() {
            return false;
        }
        if self.name() != other.name() {
            return false;
        }
        if !options.ignore_uri && self.uri() != other.uri() {
            return false;
        }
        if !self.attributes_match(other, options) {
            return false;
        }
        if self.is_text() && self.characters() != other.characters() {
            return false;
        }

        self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(mine, theirs)| mine.equals_with(theirs, options))
    }

    fn attributes_match(&self, other: &Self, options: EqualityOptions) -> bool {
        let mine = self.attributes();
        let theirs = other.attributes();
        if mine.len() != theirs.len() {
            return false;
        }

        mine.iter().all(|attr| {
            let uri = self.effective_uri(attr);
            theirs.iter().any(|candidate| {
                candidate.triple.name() == attr.triple.name()
                    && (options.ignore_uri || other.effective_uri(candidate) == uri)
                    && (options.ignore_attribute_values || candidate.value == attr.value)
            })
        })
    }

    // unqualified attributes fall back to the element's namespace
    fn effective_uri<'a>(&'a self, attr: &'a XmlAttribute) -> &'a str {
        if attr.triple.uri().is_empty() && attr.triple.prefix().is_empty() {
            self.uri()
        } else {
            attr.triple.uri()
        }
    }

    /// Write this node and its subtree
    pub fn write<W: Write>(&self, stream: &mut XmlOutputStream<W>) {
        match self.kind() {
            TokenKind::Eof => {
                for child in &self.children {
                    child.write(stream);
                }
            }
            TokenKind::Text | TokenKind::EndElement => self.token.write(stream),
            TokenKind::StartElement | TokenKind::SelfClosingElement => {
                stream.start_element(self.triple());
                stream.write_namespaces(self.namespaces());
                stream.write_attributes(self.attributes());

                let mut saw_text = false;
                for child in &self.children {
                    saw_text |= child.is_text();
                    child.write(stream);
                }
                // a trailing element after mixed content would otherwise push the close tag onto a new line
                let ends_with_text = self.children.last().is_some_and(|child| child.is_text());
                if saw_text && !ends_with_text {
                    stream.skip_next_indent();
                }
                stream.end_element(self.triple());
            }
        }
    }

    /// Serialize with the default writer settings
    pub fn to_xml_string(&self) -> String {
        self.to_xml_string_with(WriterConfig::default())
    }

    pub fn to_xml_string_with(&self, config: WriterConfig) -> String {
        let mut stream = XmlOutputStream::buffer(config);
        self.write(&mut stream);
        stream.into_string()
    }
}

impl Deref for XmlNode {
    type Target = XmlToken;

    fn deref(&self) -> &Self::Target {
        &self.token
    }
}

impl DerefMut for XmlNode {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.token
    }
}

impl From<XmlToken> for XmlNode {
    fn from(token: XmlToken) -> Self {
        Self::from_token(token)
    }
}

impl PartialEq for XmlNode {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other, false)
    }
}

impl fmt::Display for XmlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml_string())
    }
}

const WRAPPER: &str = "sbxml-fragment";

/// Parse an XML fragment into a node
///
/// The fragment is wrapped in a synthetic root carrying `namespaces`. A single
/// top-level child is returned as is; several are returned inside a name-less
/// container node. Empty or malformed fragments yield `None`.
pub fn convert_string_to_node(xml: &str, namespaces: Option<&XmlNamespaces>) -> Option<XmlNode> {
    let mut wrapped = format!("<{WRAPPER}");
    for (uri, prefix) in namespaces.into_iter().flat_map(XmlNamespaces::iter) {
        if prefix.is_empty() {
            wrapped.push_str(&format!(" xmlns=\"{}\"", escape(uri)));
        } else {
            wrapped.push_str(&format!(" xmlns:{prefix}=\"{}\"", escape(uri)));
        }
    }
    wrapped.push('>');
    wrapped.push_str(xml);
    wrapped.push_str(&format!("</{WRAPPER}>"));

    let mut stream = XmlInputStream::new(&wrapped);
    let root = XmlNode::from_stream(&mut stream);
    let trailing = !stream.next_token().is_eof();
    if let Some(err) = stream.error() {
        warn!("cannot convert xml fragment: {err}");
        return None;
    }
    if trailing || root.name() != WRAPPER {
        warn!("cannot convert xml fragment: content outside the fragment");
        return None;
    }

    let mut children = root.children;
    match children.len() {
        0 => None,
        1 => children.pop(),
        _ => Some(XmlNode {
            token: XmlToken::eof(),
            children,
        }),
    }
}

/// Serialize a node and its subtree
pub fn convert_node_to_string(node: &XmlNode) -> String {
    node.to_xml_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::input::TokenBuffer;

    fn element(name: &str) -> XmlNode {
        XmlNode::start_element(XmlTriple::local(name))
    }

    #[test]
    fn test_add_child_rules() -> Result<()> {
        let mut parent = element("listOfSpecies");
        parent.add_child(element("species"))?;
        assert_eq!(parent.num_children(), 1);

        let mut container = XmlNode::new();
        container.add_child(XmlNode::text("x"))?;
        assert_eq!(container.num_children(), 1);

        let mut text = XmlNode::text("x");
        assert!(text.add_child(element("a")).is_err());
        assert_eq!(text.num_children(), 0);

        let mut end = XmlNode::end(XmlTriple::local("a"));
        let err = end.add_child(element("b"));
        assert!(matches!(
            err.as_ref().map_err(Error::kind),
            Err(ErrorKind::InvalidXmlOperation)
        ));
        Ok(())
    }

    #[test]
    fn test_consecutive_text_tokens_join() {
        let mut tokens: TokenBuffer = [
            XmlToken::start_element(XmlTriple::local("p")),
            XmlToken::text("  "),
            XmlToken::text("one"),
            XmlToken::text(" "),
            XmlToken::start_element(XmlTriple::local("b")),
            XmlToken::end(XmlTriple::local("b")),
            XmlToken::text("two"),
            XmlToken::end(XmlTriple::local("p")),
        ]
        .into_iter()
        .collect();

        let node = XmlNode::from_stream(&mut tokens);
        let texts: Vec<&str> = node
            .children()
            .iter()
            .filter(|child| child.is_text())
            .map(|child| child.characters())
            .collect();
        assert_eq!(texts, ["one ", "two"]);
        assert_eq!(node.num_children(), 3);
    }

    #[test]
    fn test_add_child_clears_self_closing() -> Result<()> {
        let mut node = XmlNode::from_token(XmlToken::self_closing(
            XmlTriple::local("notes"),
            XmlAttributes::new(),
            XmlNamespaces::new(),
        ));
        assert!(node.is_end());
        node.add_child(XmlNode::text("hi"))?;
        assert!(node.is_start());
        assert!(!node.is_end());
        assert_eq!(node.to_xml_string(), "<notes>hi</notes>");
        Ok(())
    }

    #[test]
    fn test_insert_clamps_and_remove_moves() -> Result<()> {
        let mut parent = element("p");
        parent.add_child(element("a"))?;
        parent.insert_child(0, element("b"))?;
        parent.insert_child(99, element("c"))?;
        let names: Vec<&str> = parent.children().iter().map(|c| c.name()).collect();
        assert_eq!(names, ["b", "a", "c"]);

        let removed = parent.remove_child(1);
        assert_eq!(removed.as_ref().map(|n| n.name()), Some("a"));
        assert!(parent.remove_child(5).is_none());
        assert_eq!(parent.num_children(), 2);
        Ok(())
    }

    #[test]
    fn test_child_lookup() -> Result<()> {
        let mut parent = element("p");
        parent.add_child(XmlNode::text("a"))?;
        let mut first = element("x");
        first.add_attr("n", "1")?;
        parent.add_child(first)?;
        let mut second = element("x");
        second.add_attr("n", "2")?;
        parent.add_child(second)?;

        assert_eq!(parent.index_of_child("x"), Some(1));
        assert_eq!(
            parent.child_by_name("x").and_then(|c| c.attr_value("n")),
            Some("1")
        );
        assert!(parent.child_by_name("missing").is_none());
        assert!(parent.child(10).is_none());
        assert!(!parent.has_child("a"));

        parent.remove_children();
        assert_eq!(parent.num_children(), 0);
        Ok(())
    }

    #[test]
    fn test_equality_ignores_attribute_order() -> Result<()> {
        let mut a = element("species");
        a.add_attr("id", "s1")?;
        a.add_attr("compartment", "c")?;
        let mut b = element("species");
        b.add_attr("compartment", "c")?;
        b.add_attr("id", "s1")?;
        assert_eq!(a, b);

        b.add_attr("id", "s2")?;
        assert_ne!(a, b);
        assert!(a.equals_with(
            &b,
            EqualityOptions {
                ignore_uri: false,
                ignore_attribute_values: true,
            }
        ));
        Ok(())
    }

    #[test]
    fn test_equality_uri_handling() -> Result<()> {
        let mut a = XmlNode::start_element(XmlTriple::new("p", "urn:a", ""));
        a.add_attr("id", "1")?;
        let mut b = XmlNode::start_element(XmlTriple::new("p", "urn:a", ""));
        b.add_attr_qualified("id", "1", "urn:a", "x")?;
        // unqualified attribute takes the element namespace
        assert!(a.equals(&b, false));

        let c = XmlNode::start_element(XmlTriple::new("p", "urn:b", ""));
        let d = XmlNode::start_element(XmlTriple::new("p", "urn:c", ""));
        assert!(!c.equals(&d, false));
        assert!(c.equals(&d, true));
        Ok(())
    }

    #[test]
    fn test_equality_compares_children() -> Result<()> {
        let mut a = element("p");
        a.add_child(XmlNode::text("x"))?;
        let mut b = element("p");
        b.add_child(XmlNode::text("y"))?;
        assert_ne!(a, b);

        let mut c = element("p");
        c.add_child(XmlNode::text("x"))?;
        c.add_child(element("q"))?;
        assert_ne!(a, c);
        Ok(())
    }

    #[test]
    fn test_write_text_child_inline() -> Result<()> {
        let mut model = element("model");
        model.add_attr("id", "m1")?;
        model.add_child(XmlNode::text("x"))?;
        assert_eq!(model.to_xml_string(), "<model id=\"m1\">x</model>");
        Ok(())
    }

    #[test]
    fn test_write_nested_indentation() -> Result<()> {
        let mut inner = element("b");
        inner.add_child(element("c"))?;
        let mut outer = element("a");
        outer.add_child(inner)?;
        outer.add_child(element("d"))?;
        assert_eq!(
            outer.to_xml_string(),
            "<a>\n  <b>\n    <c/>\n  </b>\n  <d/>\n</a>"
        );
        Ok(())
    }

    #[test]
    fn test_write_mixed_content_keeps_close_tag_inline() -> Result<()> {
        let mut p = element("p");
        p.add_child(XmlNode::text("see "))?;
        p.add_child(element("br"))?;
        assert_eq!(p.to_xml_string(), "<p>see <br/></p>");
        Ok(())
    }

    #[test]
    fn test_write_container_writes_children_only() -> Result<()> {
        let mut container = XmlNode::new();
        container.add_child(element("a"))?;
        container.add_child(element("b"))?;
        assert_eq!(
            container.to_xml_string_with(WriterConfig::compact()),
            "<a/><b/>"
        );
        Ok(())
    }

    #[test]
    fn test_whitespace_text_elided() {
        let mut tokens: TokenBuffer = [
            XmlToken::start_element(XmlTriple::local("a")),
            XmlToken::text("\n   "),
            XmlToken::start_element(XmlTriple::local("b")),
            XmlToken::text(" kept "),
            XmlToken::end(XmlTriple::local("b")),
            XmlToken::end(XmlTriple::local("a")),
        ]
        .into_iter()
        .collect();

        let node = XmlNode::from_stream(&mut tokens);
        assert_eq!(node.num_children(), 1);
        let b = node.child(0);
        assert_eq!(b.map(|b| b.name()), Some("b"));
        assert_eq!(
            b.and_then(|b| b.child(0)).map(|t| t.characters()),
            Some(" kept ")
        );
    }

    #[test]
    fn test_from_stream_end_token_is_leaf() {
        let mut tokens: TokenBuffer = [
            XmlToken::end(XmlTriple::local("a")),
            XmlToken::start_element(XmlTriple::local("b")),
        ]
        .into_iter()
        .collect();
        let node = XmlNode::from_stream(&mut tokens);
        assert!(node.is_end());
        assert_eq!(node.num_children(), 0);
    }

    #[test]
    fn test_convert_single_child() {
        let node = convert_string_to_node("<notes><p>hi</p></notes>", None);
        assert_eq!(node.as_ref().map(|n| n.name()), Some("notes"));
        assert_eq!(node.map(|n| n.num_children()), Some(1));
    }

    #[test]
    fn test_convert_multiple_children_wrapped() {
        let node = convert_string_to_node("<a/><b/>", None);
        assert!(node.as_ref().is_some_and(|n| n.is_eof()));
        assert_eq!(node.map(|n| n.num_children()), Some(2));
    }

    #[test]
    fn test_convert_with_namespaces() -> Result<()> {
        let mut ns = XmlNamespaces::new();
        ns.add("http://www.w3.org/1999/xhtml", "html")?;
        let node = convert_string_to_node("<html:p>x</html:p>", Some(&ns));
        assert_eq!(
            node.as_ref().map(|n| n.uri()),
            Some("http://www.w3.org/1999/xhtml")
        );

        assert!(convert_string_to_node("<html:p>x</html:p>", None).is_none());
        Ok(())
    }

    #[test]
    fn test_convert_malformed_or_empty() {
        assert!(convert_string_to_node("<a><b></a>", None).is_none());
        assert!(convert_string_to_node("   ", None).is_none());
    }

    #[test]
    fn test_node_to_string() -> Result<()> {
        let mut node = element("annotation");
        node.add_child(element("x"))?;
        assert_eq!(convert_node_to_string(&node), "<annotation>\n  <x/>\n</annotation>");
        Ok(())
    }
}
