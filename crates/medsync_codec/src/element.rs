//! XML element tree.

use crate::error::{CodecError, CodecResult};

/// A node inside an element's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Nested element.
    Element(Element),
    /// Character data (already unescaped).
    Text(String),
}

/// An XML element.
///
/// Attributes keep their insertion order so that writing an element is
/// deterministic: the same tree always produces the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Qualified element name (may carry a namespace prefix).
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Child nodes in document order.
    pub children: Vec<Node>,
}

impl Element {
    /// Create an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create an element holding a single text node.
    pub fn text_element(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name).with_text(text)
    }

    /// Add an attribute (builder style).
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Add a child element (builder style).
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Add a text node (builder style).
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Add a child `<name>text</name>` when `text` is present.
    pub fn with_optional_text(self, name: &str, text: Option<&str>) -> Self {
        match text {
            Some(t) => self.with_child(Element::text_element(name, t)),
            None => self,
        }
    }

    /// Set or replace an attribute.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Append a child element.
    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Name without namespace prefix.
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Returns the value of an attribute, matched by local name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| local_part(k) == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the value of a required attribute.
    pub fn required_attr(&self, name: &str) -> CodecResult<&str> {
        self.attr(name).ok_or_else(|| CodecError::missing(name))
    }

    /// Iterates over child elements.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Returns the first child element with the given local name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.local_name() == name)
    }

    /// Returns a required child element.
    pub fn required_child(&self, name: &str) -> CodecResult<&Element> {
        self.child(name).ok_or_else(|| CodecError::missing(name))
    }

    /// Iterates over child elements with the given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |e| e.local_name() == name)
    }

    /// Concatenated text content of this element's direct text nodes.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Text of a child element, if the child exists. Whitespace is kept.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).map(Element::text)
    }

    /// Text of a child element that must exist and hold more than whitespace.
    ///
    /// The text is returned as written, surrounding whitespace included.
    pub fn required_text(&self, name: &str) -> CodecResult<String> {
        match self.child_text(name) {
            Some(t) if !t.trim().is_empty() => Ok(t),
            _ => Err(CodecError::missing(name)),
        }
    }
}

fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Element {
        Element::new("ns:record")
            .with_attr("recordId", "REC-1")
            .with_child(Element::text_element("name", "  Jane "))
            .with_child(Element::text_element("item", "a"))
            .with_child(Element::text_element("item", "b"))
    }

    #[test]
    fn lookup_by_local_name() {
        let e = sample();
        assert_eq!(e.local_name(), "record");
        assert_eq!(e.attr("recordId"), Some("REC-1"));
        assert_eq!(e.child_text("name").as_deref(), Some("  Jane "));
        assert_eq!(e.children_named("item").count(), 2);
    }

    #[test]
    fn required_accessors_report_field() {
        let e = sample();
        let err = e.required_text("missing").unwrap_err();
        assert!(err.to_string().contains("missing"));
        assert!(e.required_attr("creationDate").is_err());
    }

    #[test]
    fn empty_text_counts_as_missing() {
        let e = Element::new("p").with_child(Element::text_element("id", "   "));
        assert!(e.required_text("id").is_err());
    }

    #[test]
    fn required_text_keeps_surrounding_whitespace() {
        let e = Element::new("p").with_child(Element::text_element("phone", "555 "));
        assert_eq!(e.required_text("phone").unwrap(), "555 ");
    }

    #[test]
    fn set_attr_replaces() {
        let mut e = Element::new("a").with_attr("k", "1");
        e.set_attr("k", "2");
        assert_eq!(e.attributes, vec![("k".to_string(), "2".to_string())]);
    }
}
