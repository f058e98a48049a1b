//! Qualified names: local name, namespace URI and prefix

use std::fmt;

/// A qualified XML name
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct XmlTriple {
    name: String,
    uri: String,
    prefix: String,
}

impl XmlTriple {
    pub fn new(name: impl Into<String>, uri: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
            prefix: prefix.into(),
        }
    }

    /// Unqualified name with no namespace
    pub fn local(name: impl Into<String>) -> Self {
        Self::new(name, "", "")
    }

    /// Split `prefix:name` into a triple with the given URI
    pub fn from_qualified(qname: &str, uri: impl Into<String>) -> Self {
        match qname.split_once(':') {
            Some((prefix, name)) => Self::new(name, uri, prefix),
            None => Self::new(qname, uri, ""),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn set_uri(&mut self, uri: impl Into<String>) {
        self.uri = uri.into();
    }

    /// `prefix:name`, or just `name` when unprefixed
    pub fn prefixed_name(&self) -> String {
        if self.prefix.is_empty() {
            self.name.clone()
        } else {
            format!("{}:{}", self.prefix, self.name)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.uri.is_empty() && self.prefix.is_empty()
    }
}

impl fmt::Display for XmlTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.prefix.is_empty() {
            write!(f, "{}:", self.prefix)?;
        }
        f.write_str(&self.name)
    }
}

impl From<&str> for XmlTriple {
    fn from(name: &str) -> Self {
        Self::local(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_name() {
        let triple = XmlTriple::new("p", "http://www.w3.org/1999/xhtml", "html");
        assert_eq!(triple.prefixed_name(), "html:p");
        assert_eq!(XmlTriple::local("model").prefixed_name(), "model");
    }

    #[test]
    fn test_from_qualified() {
        let triple = XmlTriple::from_qualified("xhtml:body", "urn:x");
        assert_eq!(triple.name(), "body");
        assert_eq!(triple.prefix(), "xhtml");
        assert_eq!(triple.uri(), "urn:x");
    }

    #[test]
    fn test_empty() {
        assert!(XmlTriple::default().is_empty());
        assert!(!XmlTriple::local("a").is_empty());
    }
}
