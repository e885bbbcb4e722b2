//! Deterministic XML writer.

use crate::element::{Element, Node};

/// XML declaration emitted by [`to_xml_document`].
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Write an element as compact XML.
///
/// Output is deterministic and never contains a raw line break: newlines,
/// carriage returns and tabs in text or attribute values are written as
/// character references. This keeps every document on a single line, which
/// line-framed transports rely on.
pub fn to_xml(element: &Element) -> String {
    let mut writer = XmlWriter::new();
    writer.write(element);
    writer.into_string()
}

/// Write an element as a standalone document with an XML declaration.
pub fn to_xml_document(element: &Element) -> String {
    let mut writer = XmlWriter::with_capacity(256);
    writer.buffer.push_str(XML_DECLARATION);
    writer.write(element);
    writer.into_string()
}

/// A compact XML writer.
pub struct XmlWriter {
    buffer: String,
}

impl XmlWriter {
    /// Create a new writer.
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    /// Create a new writer with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: String::with_capacity(capacity),
        }
    }

    /// Write an element and its subtree.
    pub fn write(&mut self, element: &Element) {
        self.buffer.push('<');
        self.buffer.push_str(&element.name);
        for (name, value) in &element.attributes {
            self.buffer.push(' ');
            self.buffer.push_str(name);
            self.buffer.push_str("=\"");
            escape_into(&mut self.buffer, value, true);
            self.buffer.push('"');
        }

        if element.children.is_empty() {
            self.buffer.push_str("/>");
            return;
        }

        self.buffer.push('>');
        for child in &element.children {
            match child {
                Node::Element(e) => self.write(e),
                Node::Text(t) => escape_into(&mut self.buffer, t, false),
            }
        }
        self.buffer.push_str("</");
        self.buffer.push_str(&element.name);
        self.buffer.push('>');
    }

    /// Consume this writer and return the XML text.
    pub fn into_string(self) -> String {
        self.buffer
    }

    /// Get a reference to the XML written so far.
    pub fn as_str(&self) -> &str {
        &self.buffer
    }
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_into(out: &mut String, text: &str, in_attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attribute => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' if in_attribute => out.push_str("&#9;"),
            _ => out.push(c),
        }
    }
}
