//! Namespace declarations scoped to one element

use indexmap::IndexMap;

use crate::error::{Error, ErrorKind, Result, Span};

/// Ordered `{URI, prefix}` declarations
///
/// A prefix is bound at most once: re-declaring a prefix rebinds it, and
/// re-adding an identical pair is a no-op. One URI may appear under several
/// prefixes. The empty prefix is the default namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct XmlNamespaces {
    by_prefix: IndexMap<String, String>,
}

impl XmlNamespaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_prefix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_prefix.is_empty()
    }

    /// Declare `uri` under `prefix` (empty prefix for the default namespace)
    pub fn add(&mut self, uri: &str, prefix: &str) -> Result<()> {
        if prefix == "xmlns" {
            return Err(Error::with_message(
                ErrorKind::InvalidXmlOperation,
                Span::empty(),
                "the xmlns prefix cannot be declared",
            ));
        }
        self.by_prefix.insert(prefix.to_string(), uri.to_string());
        Ok(())
    }

    pub fn uri(&self, index: usize) -> Option<&str> {
        self.by_prefix.get_index(index).map(|(_, uri)| uri.as_str())
    }

    pub fn prefix(&self, index: usize) -> Option<&str> {
        self.by_prefix.get_index(index).map(|(prefix, _)| prefix.as_str())
    }

    /// URI bound to `prefix`
    pub fn uri_for_prefix(&self, prefix: &str) -> Option<&str> {
        self.by_prefix.get(prefix).map(String::as_str)
    }

    /// First prefix under which `uri` is declared
    pub fn prefix_for_uri(&self, uri: &str) -> Option<&str> {
        self.iter()
            .find(|(declared, _)| *declared == uri)
            .map(|(_, prefix)| prefix)
    }

    pub fn index_of_uri(&self, uri: &str) -> Option<usize> {
        self.by_prefix.values().position(|declared| declared == uri)
    }

    pub fn index_of_prefix(&self, prefix: &str) -> Option<usize> {
        self.by_prefix.get_index_of(prefix)
    }

    pub fn has_uri(&self, uri: &str) -> bool {
        self.index_of_uri(uri).is_some()
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.by_prefix.contains_key(prefix)
    }

    pub fn has_ns(&self, uri: &str, prefix: &str) -> bool {
        self.uri_for_prefix(prefix) == Some(uri)
    }

    pub fn remove(&mut self, index: usize) -> Option<(String, String)> {
        self.by_prefix
            .shift_remove_index(index)
            .map(|(prefix, uri)| (uri, prefix))
    }

    /// Remove the declaration of `prefix`, returning its URI
    pub fn remove_prefix(&mut self, prefix: &str) -> Option<String> {
        self.by_prefix.shift_remove(prefix)
    }

    pub fn clear(&mut self) {
        self.by_prefix.clear();
    }

    /// Iterate `(uri, prefix)` pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_prefix
            .iter()
            .map(|(prefix, uri)| (uri.as_str(), prefix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SBML_L3: &str = "http://www.sbml.org/sbml/level3/version1/core";
    const XHTML: &str = "http://www.w3.org/1999/xhtml";

    #[test]
    fn test_add_and_lookup() -> Result<()> {
        let mut ns = XmlNamespaces::new();
        ns.add(SBML_L3, "")?;
        ns.add(XHTML, "html")?;

        assert_eq!(ns.len(), 2);
        assert_eq!(ns.uri_for_prefix(""), Some(SBML_L3));
        assert_eq!(ns.prefix_for_uri(XHTML), Some("html"));
        assert!(ns.has_ns(XHTML, "html"));
        assert!(!ns.has_ns(XHTML, ""));
        assert_eq!(ns.index_of_uri(XHTML), Some(1));
        Ok(())
    }

    #[test]
    fn test_duplicate_pair_is_noop() -> Result<()> {
        let mut ns = XmlNamespaces::new();
        ns.add(XHTML, "html")?;
        ns.add(XHTML, "html")?;
        assert_eq!(ns.len(), 1);
        Ok(())
    }

    #[test]
    fn test_uri_under_several_prefixes() -> Result<()> {
        let mut ns = XmlNamespaces::new();
        ns.add(XHTML, "html")?;
        ns.add(XHTML, "h")?;
        assert_eq!(ns.len(), 2);
        assert_eq!(ns.prefix_for_uri(XHTML), Some("html"));
        Ok(())
    }

    #[test]
    fn test_rebinding_prefix() -> Result<()> {
        let mut ns = XmlNamespaces::new();
        ns.add("urn:a", "p")?;
        ns.add("urn:b", "p")?;
        assert_eq!(ns.len(), 1);
        assert_eq!(ns.uri_for_prefix("p"), Some("urn:b"));
        Ok(())
    }

    #[test]
    fn test_xmlns_prefix_rejected() {
        let mut ns = XmlNamespaces::new();
        assert!(ns.add("urn:a", "xmlns").is_err());
        assert!(ns.is_empty());
    }

    #[test]
    fn test_remove() -> Result<()> {
        let mut ns = XmlNamespaces::new();
        ns.add("urn:a", "a")?;
        ns.add("urn:b", "b")?;
        assert_eq!(ns.remove_prefix("a"), Some("urn:a".to_string()));
        assert_eq!(ns.remove(5), None);
        assert_eq!(ns.prefix(0), Some("b"));
        Ok(())
    }
}
