//! Ordered attribute lists

use indexmap::IndexMap;

use crate::error::{Error, ErrorKind, Result};
use crate::xml::triple::XmlTriple;

/// A single attribute: qualified name plus value
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct XmlAttribute {
    pub triple: XmlTriple,
    pub value: String,
}

/// Ordered attribute list, unique on (local name, URI)
///
/// Re-adding an existing (name, URI) pair overwrites the value in place and
/// keeps the original position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "Vec<XmlAttribute>", into = "Vec<XmlAttribute>")
)]
pub struct XmlAttributes {
    entries: IndexMap<(String, String), XmlAttribute>,
}

impl XmlAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add an unqualified attribute
    pub fn add(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        self.add_triple(XmlTriple::local(name), value)
    }

    /// Add an attribute with namespace URI and prefix
    pub fn add_qualified(
        &mut self,
        name: &str,
        value: impl Into<String>,
        uri: &str,
        prefix: &str,
    ) -> Result<()> {
        self.add_triple(XmlTriple::new(name, uri, prefix), value)
    }

    pub fn add_triple(&mut self, triple: XmlTriple, value: impl Into<String>) -> Result<()> {
        if triple.name().is_empty() {
            return Err(Error::operation(ErrorKind::EmptyName));
        }
        let key = (triple.name().to_string(), triple.uri().to_string());
        self.entries.insert(
            key,
            XmlAttribute {
                triple,
                value: value.into(),
            },
        );
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&XmlAttribute> {
        self.entries.get_index(index).map(|(_, attr)| attr)
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.get(index).map(|attr| attr.triple.name())
    }

    pub fn prefix(&self, index: usize) -> Option<&str> {
        self.get(index).map(|attr| attr.triple.prefix())
    }

    pub fn uri(&self, index: usize) -> Option<&str> {
        self.get(index).map(|attr| attr.triple.uri())
    }

    pub fn value(&self, index: usize) -> Option<&str> {
        self.get(index).map(|attr| attr.value.as_str())
    }

    /// Index of the first attribute with this local name, in any namespace
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries
            .values()
            .position(|attr| attr.triple.name() == name)
    }

    pub fn index_of_qualified(&self, name: &str, uri: &str) -> Option<usize> {
        self.entries
            .get_index_of(&(name.to_string(), uri.to_string()))
    }

    pub fn index_of_triple(&self, triple: &XmlTriple) -> Option<usize> {
        self.index_of_qualified(triple.name(), triple.uri())
            .filter(|&i| self.prefix(i) == Some(triple.prefix()))
    }

    /// Value of the first attribute with this local name
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.index_of(name).and_then(|i| self.value(i))
    }

    pub fn value_of_qualified(&self, name: &str, uri: &str) -> Option<&str> {
        self.index_of_qualified(name, uri).and_then(|i| self.value(i))
    }

    pub fn has(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn has_qualified(&self, name: &str, uri: &str) -> bool {
        self.index_of_qualified(name, uri).is_some()
    }

    /// Remove the attribute at `index`, preserving the order of the rest
    pub fn remove(&mut self, index: usize) -> Option<XmlAttribute> {
        self.entries.shift_remove_index(index).map(|(_, attr)| attr)
    }

    pub fn remove_named(&mut self, name: &str) -> Option<XmlAttribute> {
        self.index_of(name).and_then(|i| self.remove(i))
    }

    pub fn remove_qualified(&mut self, name: &str, uri: &str) -> Option<XmlAttribute> {
        self.index_of_qualified(name, uri).and_then(|i| self.remove(i))
    }

    pub fn remove_triple(&mut self, triple: &XmlTriple) -> Option<XmlAttribute> {
        self.index_of_triple(triple).and_then(|i| self.remove(i))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &XmlAttribute> {
        self.entries.values()
    }

    /// Read a boolean attribute (`true`/`false`/`1`/`0`)
    pub fn read_bool(&self, name: &str) -> Option<bool> {
        match self.value_of(name)?.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }

    /// Read a double attribute, accepting `NaN`, `INF` and `-INF`
    pub fn read_f64(&self, name: &str) -> Option<f64> {
        match self.value_of(name)?.trim() {
            "NaN" => Some(f64::NAN),
            "INF" => Some(f64::INFINITY),
            "-INF" => Some(f64::NEG_INFINITY),
            text => text.parse().ok().filter(|v: &f64| v.is_finite()),
        }
    }

    pub fn read_i64(&self, name: &str) -> Option<i64> {
        self.value_of(name)?.trim().parse().ok()
    }
}

impl<'a> IntoIterator for &'a XmlAttributes {
    type Item = &'a XmlAttribute;
    type IntoIter = indexmap::map::Values<'a, (String, String), XmlAttribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

impl From<XmlAttributes> for Vec<XmlAttribute> {
    fn from(attributes: XmlAttributes) -> Self {
        attributes.entries.into_values().collect()
    }
}

/// Rebuild a list in order; a later duplicate (name, URI) overwrites the
/// earlier value
impl TryFrom<Vec<XmlAttribute>> for XmlAttributes {
    type Error = Error;

    fn try_from(list: Vec<XmlAttribute>) -> Result<Self> {
        let mut attributes = Self::new();
        for attr in list {
            attributes.add_triple(attr.triple, attr.value)?;
        }
        Ok(attributes)
    }
}
