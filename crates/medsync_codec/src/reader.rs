//! Strict XML reader.
//!
//! Supports the subset of XML that wire documents use: a prolog with an
//! optional declaration and comments, elements, attributes, character data,
//! CDATA sections and the predefined and numeric character references.
//! Document type declarations are rejected.

use crate::element::{Element, Node};
use crate::error::{CodecError, CodecResult};

/// Maximum element nesting accepted by default.
///
/// Wire documents are shallow; the limit bounds recursion on untrusted input.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Parse a complete XML document and return its root element.
///
/// # Errors
///
/// Returns an error if the input is not a single well-formed element,
/// optionally surrounded by a prolog, comments and whitespace.
pub fn from_xml(input: &str) -> CodecResult<Element> {
    let mut reader = XmlReader::new(input);
    reader.read_document()
}

/// A cursor over XML text.
pub struct XmlReader<'a> {
    data: &'a str,
    pos: usize,
    max_depth: usize,
}

impl<'a> XmlReader<'a> {
    /// Create a reader for the given text.
    pub fn new(data: &'a str) -> Self {
        Self {
            data,
            pos: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Override the maximum nesting depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Read the root element, rejecting anything but comments and whitespace after it.
    pub fn read_document(&mut self) -> CodecResult<Element> {
        if self.rest().starts_with('\u{feff}') {
            self.pos += '\u{feff}'.len_utf8();
        }
        self.skip_misc()?;
        if self.is_eof() {
            return Err(CodecError::UnexpectedEof);
        }
        if self.peek() != Some(b'<') {
            return Err(CodecError::malformed(self.pos, "expected root element"));
        }
        let root = self.read_element(0)?;
        self.skip_misc()?;
        if !self.is_eof() {
            return Err(CodecError::TrailingContent);
        }
        Ok(root)
    }

    /// Current byte offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn rest(&self) -> &'a str {
        &self.data[self.pos..]
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn peek(&self) -> Option<u8> {
        self.data.as_bytes().get(self.pos).copied()
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    fn expect(&mut self, byte: u8) -> CodecResult<()> {
        match self.peek() {
            Some(b) if b == byte => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(CodecError::malformed(
                self.pos,
                format!("expected '{}'", byte as char),
            )),
            None => Err(CodecError::UnexpectedEof),
        }
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
        self.pos > start
    }

    /// Advance past `terminator`, returning the text before it.
    fn take_until(&mut self, terminator: &str) -> CodecResult<&'a str> {
        let rest = self.rest();
        let end = rest.find(terminator).ok_or(CodecError::UnexpectedEof)?;
        self.pos += end + terminator.len();
        Ok(&rest[..end])
    }

    fn skip_misc(&mut self) -> CodecResult<()> {
        loop {
            self.skip_ws();
            if self.starts_with("<?") {
                self.take_until("?>")?;
            } else if self.starts_with("<!--") {
                self.pos += 4;
                self.take_until("-->")?;
            } else if self.starts_with("<!") {
                return Err(CodecError::malformed(
                    self.pos,
                    "document type declarations are not supported",
                ));
            } else {
                return Ok(());
            }
        }
    }

    fn read_name(&mut self) -> CodecResult<String> {
        let rest = self.rest();
        let mut end = 0;
        for (i, c) in rest.char_indices() {
            let valid = if i == 0 {
                c.is_alphabetic() || c == '_' || c == ':'
            } else {
                c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')
            };
            if !valid {
                break;
            }
            end = i + c.len_utf8();
        }
        if end == 0 {
            return Err(if rest.is_empty() {
                CodecError::UnexpectedEof
            } else {
                CodecError::malformed(self.pos, "expected a name")
            });
        }
        self.pos += end;
        Ok(rest[..end].to_string())
    }

    fn read_reference(&mut self) -> CodecResult<char> {
        // Caller guarantees the cursor is on '&'.
        self.pos += 1;
        let rest = self.rest();
        let end = rest
            .char_indices()
            .take(12)
            .find(|(_, c)| *c == ';')
            .map(|(i, _)| i)
            .ok_or_else(|| CodecError::malformed(self.pos, "unterminated reference"))?;
        let name = &rest[..end];
        self.pos += end + 1;

        let resolved = match name {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => {
                let code = if let Some(hex) = name.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = name.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32)
            }
        };
        resolved.ok_or_else(|| CodecError::InvalidEntity(name.to_string()))
    }

    fn read_attribute_value(&mut self) -> CodecResult<String> {
        let quote = match self.peek() {
            Some(q @ (b'"' | b'\'')) => q as char,
            Some(_) => {
                return Err(CodecError::malformed(self.pos, "expected quoted value"));
            }
            None => return Err(CodecError::UnexpectedEof),
        };
        self.pos += 1;

        let mut value = String::new();
        loop {
            let c = self.rest().chars().next().ok_or(CodecError::UnexpectedEof)?;
            match c {
                c if c == quote => {
                    self.pos += 1;
                    return Ok(value);
                }
                '<' => {
                    return Err(CodecError::malformed(
                        self.pos,
                        "'<' is not allowed in attribute values",
                    ));
                }
                '&' => value.push(self.read_reference()?),
                '\t' | '\n' | '\r' => {
                    value.push(' ');
                    self.pos += 1;
                }
                c => {
                    value.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn read_element(&mut self, depth: usize) -> CodecResult<Element> {
        if depth >= self.max_depth {
            return Err(CodecError::DepthExceeded(self.max_depth));
        }
        self.expect(b'<')?;
        let mut element = Element::new(self.read_name()?);

        loop {
            let separated = self.skip_ws();
            match self.peek() {
                None => return Err(CodecError::UnexpectedEof),
                Some(b'/') => {
                    self.pos += 1;
                    self.expect(b'>')?;
                    return Ok(element);
                }
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(_) if !separated => {
                    return Err(CodecError::malformed(
                        self.pos,
                        "expected whitespace before attribute",
                    ));
                }
                Some(_) => {
                    let name = self.read_name()?;
                    self.skip_ws();
                    self.expect(b'=')?;
                    self.skip_ws();
                    let value = self.read_attribute_value()?;
                    if element.attributes.iter().any(|(k, _)| *k == name) {
                        return Err(CodecError::malformed(
                            self.pos,
                            format!("duplicate attribute '{name}'"),
                        ));
                    }
                    element.attributes.push((name, value));
                }
            }
        }

        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(CodecError::UnexpectedEof),
                Some(b'<') if self.starts_with("</") => {
                    flush_text(&mut element, &mut text);
                    self.pos += 2;
                    let closing = self.read_name()?;
                    self.skip_ws();
                    self.expect(b'>')?;
                    if closing != element.name {
                        return Err(CodecError::MismatchedTag {
                            expected: element.name,
                            found: closing,
                        });
                    }
                    if element.elements().next().is_some() {
                        element
                            .children
                            .retain(|n| !matches!(n, Node::Text(t) if t.trim().is_empty()));
                    }
                    return Ok(element);
                }
                Some(b'<') if self.starts_with("<!--") => {
                    self.pos += 4;
                    self.take_until("-->")?;
                }
                Some(b'<') if self.starts_with("<![CDATA[") => {
                    self.pos += 9;
                    let data = self.take_until("]]>")?;
                    text.push_str(data);
                }
                Some(b'<') if self.starts_with("<?") => {
                    self.take_until("?>")?;
                }
                Some(b'<') => {
                    flush_text(&mut element, &mut text);
                    let child = self.read_element(depth + 1)?;
                    element.push(child);
                }
                Some(b'&') => text.push(self.read_reference()?),
                Some(_) => {
                    let rest = self.rest();
                    let end = rest.find(|c: char| c == '<' || c == '&').unwrap_or(rest.len());
                    text.push_str(&rest[..end]);
                    self.pos += end;
                }
            }
        }
    }
}

fn flush_text(element: &mut Element, text: &mut String) {
    if !text.is_empty() {
        element.children.push(Node::Text(std::mem::take(text)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{to_xml, to_xml_document};

    #[test]
    fn parses_declaration_and_nested_elements() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <!-- exported -->
            <record recordId="REC-1">
                <patient>
                    <patientId>PAT001</patientId>
                </patient>
                <consultations/>
            </record>"#;
        let root = from_xml(xml).unwrap();
        assert_eq!(root.name, "record");
        assert_eq!(root.attr("recordId"), Some("REC-1"));
        let patient = root.child("patient").unwrap();
        assert_eq!(patient.child_text("patientId").as_deref(), Some("PAT001"));
        // Indentation between elements is not content.
        assert_eq!(root.children.len(), 2);
    }

    #[test]
    fn resolves_references() {
        let root = from_xml("<t a='x &amp; &#65;&#x42;'>&lt;&gt;&quot;&apos;</t>").unwrap();
        assert_eq!(root.attr("a"), Some("x & AB"));
        assert_eq!(root.text(), "<>\"'");
    }

    #[test]
    fn keeps_cdata_verbatim() {
        let root = from_xml("<t><![CDATA[a < b && c]]></t>").unwrap();
        assert_eq!(root.text(), "a < b && c");
    }

    #[test]
    fn rejects_mismatched_tags() {
        let err = from_xml("<a><b></a></b>").unwrap_err();
        assert!(matches!(err, CodecError::MismatchedTag { .. }));
    }

    #[test]
    fn rejects_truncated_input() {
        assert_eq!(from_xml("<a><b>text").unwrap_err(), CodecError::UnexpectedEof);
        assert_eq!(from_xml("").unwrap_err(), CodecError::UnexpectedEof);
        assert_eq!(from_xml("   ").unwrap_err(), CodecError::UnexpectedEof);
    }

    #[test]
    fn rejects_trailing_content() {
        assert_eq!(from_xml("<a/><b/>").unwrap_err(), CodecError::TrailingContent);
        assert_eq!(from_xml("<a/>junk").unwrap_err(), CodecError::TrailingContent);
    }

    #[test]
    fn rejects_unknown_entities_and_doctype() {
        assert!(matches!(
            from_xml("<a>&bogus;</a>").unwrap_err(),
            CodecError::InvalidEntity(_)
        ));
        assert!(from_xml("<!DOCTYPE a><a/>").is_err());
    }

    #[test]
    fn rejects_duplicate_attributes() {
        assert!(from_xml(r#"<a k="1" k="2"/>"#).is_err());
        assert!(from_xml(r#"<a k="1"j="2"/>"#).is_err());
    }

    #[test]
    fn enforces_depth_limit() {
        let xml = "<a><a><a><a/></a></a></a>";
        let mut reader = XmlReader::new(xml).with_max_depth(3);
        assert_eq!(
            reader.read_document().unwrap_err(),
            CodecError::DepthExceeded(3)
        );
        assert!(from_xml(xml).is_ok());
    }

    #[test]
    fn writer_output_reads_back() {
        let element = Element::new("m:record")
            .with_attr("note", "line1\nline2\t\"q\"")
            .with_child(Element::text_element("text", " spaced\r\nout <& "))
            .with_child(Element::new("empty"));
        assert_eq!(from_xml(&to_xml(&element)).unwrap(), element);
        assert_eq!(from_xml(&to_xml_document(&element)).unwrap(), element);
    }
}
