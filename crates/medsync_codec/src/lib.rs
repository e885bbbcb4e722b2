//! # MedSync Codec
//!
//! Deterministic XML encoding/decoding for MedSync wire documents.
//!
//! This crate provides:
//! - An owned [`Element`] tree
//! - A compact, deterministic writer: identical trees produce identical text,
//!   and output never contains a raw line break
//! - A strict reader that rejects malformed input instead of guessing
//!
//! ## Usage
//!
//! ```
//! use medsync_codec::{from_xml, to_xml, Element};
//!
//! let element = Element::new("patient")
//!     .with_attr("version", "1")
//!     .with_child(Element::text_element("patientId", "PAT001"));
//! let xml = to_xml(&element);
//! assert_eq!(xml, r#"<patient version="1"><patientId>PAT001</patientId></patient>"#);
//!
//! let decoded = from_xml(&xml).unwrap();
//! assert_eq!(decoded, element);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod element;
mod error;
mod reader;
mod writer;

pub use element::{Element, Node};
pub use error::{CodecError, CodecResult};
pub use reader::{from_xml, XmlReader, DEFAULT_MAX_DEPTH};
pub use writer::{to_xml, to_xml_document, XmlWriter, XML_DECLARATION};

/// Types that map onto an XML element.
pub trait ToElement {
    /// Build the element for this value.
    fn to_element(&self) -> Element;

    /// Encode this value as compact XML text.
    fn to_xml(&self) -> String {
        to_xml(&self.to_element())
    }
}

/// Types that can be rebuilt from an XML element.
pub trait FromElement: Sized {
    /// Interpret an element, validating its shape.
    fn from_element(element: &Element) -> CodecResult<Self>;

    /// Parse XML text and interpret its root element.
    fn from_xml(xml: &str) -> CodecResult<Self> {
        Self::from_element(&from_xml(xml)?)
    }
}

impl ToElement for Element {
    fn to_element(&self) -> Element {
        self.clone()
    }
}

impl FromElement for Element {
    fn from_element(element: &Element) -> CodecResult<Self> {
        Ok(element.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn name_strategy() -> impl Strategy<Value = String> {
        "[a-zA-Z_][a-zA-Z0-9_.-]{0,12}"
    }

    fn element_strategy() -> impl Strategy<Value = Element> {
        let leaf = (
            name_strategy(),
            prop::collection::vec((name_strategy(), any::<String>()), 0..3),
            "[^\\x00-\\x08\\x0B\\x0C\\x0E-\\x1F]{1,24}",
        )
            .prop_map(|(name, attrs, text)| {
                let mut e = Element::new(name);
                for (k, v) in attrs {
                    e.set_attr(k, v.replace(|c: char| c.is_control(), ""));
                }
                if !text.trim().is_empty() {
                    e = e.with_text(text);
                }
                e
            });
        leaf.prop_recursive(3, 24, 4, |inner| {
            (name_strategy(), prop::collection::vec(inner, 0..4)).prop_map(|(name, kids)| {
                kids.into_iter()
                    .fold(Element::new(name), |e, k| e.with_child(k))
            })
        })
    }

    proptest! {
        #[test]
        fn written_trees_read_back(element in element_strategy()) {
            let xml = to_xml(&element);
            prop_assert!(!xml.contains('\n'));
            prop_assert_eq!(from_xml(&xml).unwrap(), element);
        }

        #[test]
        fn reader_never_panics(input in any::<String>()) {
            let _ = from_xml(&input);
        }

        #[test]
        fn reader_never_panics_on_markup_soup(input in "[<>/a-c=\"'&;#x!?\\[\\] -]{0,64}") {
            let _ = from_xml(&input);
        }
    }

    #[test]
    fn element_trait_roundtrip() {
        let e = Element::new("a").with_child(Element::text_element("b", "c"));
        assert_eq!(Element::from_xml(&e.to_xml()).unwrap(), e);
    }
}
