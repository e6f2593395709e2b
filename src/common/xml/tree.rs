//! Owned, mutable XML element tree.
//!
//! Parts that the document model edits in place (the main body, styles,
//! numbering, notes, headers and footers) are parsed once into this tree and
//! serialized back when the package is saved. The tree keeps everything it
//! does not understand: unknown elements and attributes, text with its
//! original whitespace, comments and CDATA sections.
//!
//! Names are stored qualified (`w:p`), exactly as they appeared in the source.
//! Namespace prefixes are resolved against the declarations on the document
//! root, which is where OOXML producers place them.

use super::escape::{escape_text, escape_xml, resolve_entity, unescape_xml};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

/// Errors raised while parsing a part into an [`XmlDocument`].
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("XML syntax error at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    #[error("Unknown entity reference: &{0};")]
    UnknownEntity(String),

    #[error("Invalid UTF-8 in XML: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Malformed UTF-16 XML content")]
    Encoding,

    #[error("Document has no root element")]
    NoRoot,

    #[error("Unbalanced element: {0}")]
    Unbalanced(String),
}

/// Character encoding a part was stored with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XmlEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
}

/// A node in the element tree.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
    Comment(String),
}

impl XmlNode {
    /// Get the element if this node is one.
    #[inline]
    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            XmlNode::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get the element mutably if this node is one.
    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut XmlElement> {
        match self {
            XmlNode::Element(e) => Some(e),
            _ => None,
        }
    }
}

/// An XML element with qualified name, ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create an element with a qualified name such as `w:p`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder-style child appender.
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Qualified name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without prefix.
    #[inline]
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Namespace prefix, or `""` for unprefixed names.
    #[inline]
    pub fn prefix(&self) -> &str {
        prefix_part(&self.name)
    }

    /// Check prefix and local name together.
    #[inline]
    pub fn is(&self, prefix: &str, local: &str) -> bool {
        self.local_name() == local && self.prefix() == prefix
    }

    /// Get an attribute by qualified name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get an attribute by prefix and local name.
    #[inline]
    pub fn attr_ns(&self, prefix: &str, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| local_part(k) == local && prefix_part(k) == prefix)
            .map(|(_, v)| v.as_str())
    }

    /// Set (or replace) an attribute, keeping its original position.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Remove an attribute, returning its value.
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == name)?;
        Some(self.attributes.remove(pos).1)
    }

    /// All attributes in document order.
    #[inline]
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Mutable access to the attribute list.
    #[inline]
    pub fn attributes_mut(&mut self) -> &mut Vec<(String, String)> {
        &mut self.attributes
    }

    /// All child nodes.
    #[inline]
    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    /// Mutable access to the child nodes.
    #[inline]
    pub fn children_mut(&mut self) -> &mut Vec<XmlNode> {
        &mut self.children
    }

    /// Child elements, skipping text and comments.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(XmlNode::as_element)
    }

    /// Mutable child elements.
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(XmlNode::as_element_mut)
    }

    /// First child element with the given qualified name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.name == name)
    }

    /// First child element with the given qualified name, mutably.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|e| e.name == name)
    }

    /// Get the named child, appending an empty one if it does not exist.
    pub fn get_or_create_child(&mut self, name: &str) -> &mut XmlElement {
        let pos = match self
            .children
            .iter()
            .position(|n| n.as_element().is_some_and(|e| e.name == name))
        {
            Some(pos) => pos,
            None => {
                self.children.push(XmlNode::Element(XmlElement::new(name)));
                self.children.len() - 1
            },
        };
        match &mut self.children[pos] {
            XmlNode::Element(e) => e,
            _ => unreachable!("position() only matches elements"),
        }
    }

    /// Append a child element.
    #[inline]
    pub fn push(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Append a text node.
    #[inline]
    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(XmlNode::Text(text.into()));
    }

    /// Insert a child element before the first child element matching `pred`,
    /// or append it when none matches.
    pub fn insert_before_first<F: Fn(&XmlElement) -> bool>(&mut self, pred: F, child: XmlElement) {
        let pos = self
            .children
            .iter()
            .position(|n| n.as_element().is_some_and(&pred))
            .unwrap_or(self.children.len());
        self.children.insert(pos, XmlNode::Element(child));
    }

    /// Insert a child element after the last child element matching `pred`,
    /// or at the front when none matches.
    pub fn insert_after_last<F: Fn(&XmlElement) -> bool>(&mut self, pred: F, child: XmlElement) {
        let pos = self
            .children
            .iter()
            .rposition(|n| n.as_element().is_some_and(&pred))
            .map_or(0, |p| p + 1);
        self.children.insert(pos, XmlNode::Element(child));
    }

    /// Rewrite the namespace prefix of this element, its descendants and
    /// their attributes. Names with other prefixes are left alone.
    pub fn rename_prefix(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        self.visit_mut(&mut |e: &mut XmlElement| {
            if e.prefix() == from {
                e.name = qualify(to, e.local_name());
            }
            for (key, _) in e.attributes.iter_mut() {
                if prefix_part(key) == from && !from.is_empty() {
                    *key = qualify(to, local_part(key));
                }
            }
        });
    }

    /// Iterate over this element and all descendant elements in document order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Visit this element and every descendant element, parents first.
    pub fn visit_mut<F: FnMut(&mut XmlElement)>(&mut self, f: &mut F) {
        f(self);
        for child in self.elements_mut() {
            child.visit_mut(f);
        }
    }

    /// Remove every descendant element matching `pred`, returning how many
    /// were removed. Matching elements are dropped with their subtree.
    pub fn remove_descendants<F: FnMut(&XmlElement) -> bool>(&mut self, pred: &mut F) -> usize {
        let mut removed = 0;
        self.children.retain(|node| match node {
            XmlNode::Element(e) if pred(e) => {
                removed += 1;
                false
            },
            _ => true,
        });
        for child in self.elements_mut() {
            removed += child.remove_descendants(pred);
        }
        removed
    }

    /// Concatenated character data of this element and its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlNode::Text(t) | XmlNode::CData(t) => out.push_str(t),
                XmlNode::Element(e) => e.collect_text(out),
                XmlNode::Comment(_) => {},
            }
        }
    }

    /// Serialize this element (without XML declaration).
    pub fn to_xml(&self) -> String {
        let mut out = String::with_capacity(256);
        self.write_xml(&mut out);
        out
    }

    /// Append the serialized element to `out`.
    pub fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape_xml(value));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                XmlNode::Element(e) => e.write_xml(out),
                XmlNode::Text(t) => out.push_str(&escape_text(t)),
                XmlNode::CData(t) => {
                    out.push_str("<![CDATA[");
                    out.push_str(t);
                    out.push_str("]]>");
                },
                XmlNode::Comment(t) => {
                    out.push_str("<!--");
                    out.push_str(t);
                    out.push_str("-->");
                },
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }

    fn from_start(e: &BytesStart<'_>, position: u64) -> Result<Self, XmlError> {
        let name = std::str::from_utf8(e.name().as_ref())?.to_string();
        let mut element = XmlElement::new(name);
        for attr in e.attributes() {
            let attr = attr.map_err(|err| XmlError::Syntax {
                position,
                message: err.to_string(),
            })?;
            let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
            let value = attr
                .unescape_value()
                .map_err(|err| XmlError::Syntax {
                    position,
                    message: err.to_string(),
                })?
                .into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }

    fn append_text(&mut self, text: &str) {
        if let Some(XmlNode::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }
}

/// Pre-order iterator returned by [`XmlElement::descendants`].
pub struct Descendants<'a> {
    stack: Vec<&'a XmlElement>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        let before = self.stack.len();
        self.stack.extend(next.elements());
        self.stack[before..].reverse();
        Some(next)
    }
}

/// A parsed XML part: the root element plus the encoding it was stored with.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    root: XmlElement,
    encoding: XmlEncoding,
}

impl XmlDocument {
    /// Wrap a root element as a UTF-8 document.
    pub fn new(root: XmlElement) -> Self {
        Self {
            root,
            encoding: XmlEncoding::Utf8,
        }
    }

    /// Parse a part's bytes. UTF-16 content (with or without BOM) is detected
    /// and remembered so [`to_bytes`](Self::to_bytes) writes it back the same way.
    pub fn parse(bytes: &[u8]) -> Result<Self, XmlError> {
        let (text, encoding) = decode(bytes)?;
        let root = parse_root(&text)?;
        Ok(Self { root, encoding })
    }

    #[inline]
    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    #[inline]
    pub fn root_mut(&mut self) -> &mut XmlElement {
        &mut self.root
    }

    #[inline]
    pub fn encoding(&self) -> XmlEncoding {
        self.encoding
    }

    #[inline]
    pub fn set_encoding(&mut self, encoding: XmlEncoding) {
        self.encoding = encoding;
    }

    /// Find the prefix bound to a namespace URI on the root element.
    ///
    /// Returns `Some("")` when the URI is the default namespace.
    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.root.attributes.iter().find_map(|(k, v)| {
            if v != uri {
                return None;
            }
            if k == "xmlns" {
                Some("")
            } else {
                k.strip_prefix("xmlns:")
            }
        })
    }

    /// Serialize with an XML declaration in the stored encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        let label = match self.encoding {
            XmlEncoding::Utf8 => "UTF-8",
            XmlEncoding::Utf16Le | XmlEncoding::Utf16Be => "UTF-16",
        };
        let mut xml = String::with_capacity(4096);
        xml.push_str(r#"<?xml version="1.0" encoding=""#);
        xml.push_str(label);
        xml.push_str(r#"" standalone="yes"?>"#);
        xml.push('\n');
        self.root.write_xml(&mut xml);

        match self.encoding {
            XmlEncoding::Utf8 => xml.into_bytes(),
            XmlEncoding::Utf16Le => {
                let mut out = vec![0xFF, 0xFE];
                out.extend(xml.encode_utf16().flat_map(u16::to_le_bytes));
                out
            },
            XmlEncoding::Utf16Be => {
                let mut out = vec![0xFE, 0xFF];
                out.extend(xml.encode_utf16().flat_map(u16::to_be_bytes));
                out
            },
        }
    }
}

/// Qualify a local name with a prefix (`""` yields the bare local name).
#[inline]
pub fn qualify(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_string()
    } else {
        format!("{prefix}:{local}")
    }
}

/// Local part of a qualified name.
#[inline]
pub fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, l)| l)
}

/// Prefix of a qualified name, or `""`.
#[inline]
pub fn prefix_part(name: &str) -> &str {
    name.rsplit_once(':').map_or("", |(p, _)| p)
}

fn decode(bytes: &[u8]) -> Result<(String, XmlEncoding), XmlError> {
    let encoding = match bytes {
        [0xFF, 0xFE, ..] | [b'<', 0x00, ..] => XmlEncoding::Utf16Le,
        [0xFE, 0xFF, ..] | [0x00, b'<', ..] => XmlEncoding::Utf16Be,
        _ => XmlEncoding::Utf8,
    };
    let text = match encoding {
        XmlEncoding::Utf8 => {
            let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
            std::str::from_utf8(body)?.to_string()
        },
        XmlEncoding::Utf16Le | XmlEncoding::Utf16Be => {
            let codec = if encoding == XmlEncoding::Utf16Le {
                encoding_rs::UTF_16LE
            } else {
                encoding_rs::UTF_16BE
            };
            let (text, had_errors) = codec.decode_with_bom_removal(bytes);
            if had_errors {
                return Err(XmlError::Encoding);
            }
            text.into_owned()
        },
    };
    Ok((text, encoding))
}

fn parse_root(xml: &str) -> Result<XmlElement, XmlError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<XmlElement> = Vec::with_capacity(32);
    let mut root = None;

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader.read_event().map_err(|e| XmlError::Syntax {
            position,
            message: e.to_string(),
        })?;
        match event {
            Event::Start(e) => stack.push(XmlElement::from_start(&e, position)?),
            Event::Empty(e) => {
                let element = XmlElement::from_start(&e, position)?;
                match stack.last_mut() {
                    Some(parent) => parent.push(element),
                    None => root = Some(element),
                }
            },
            Event::End(e) => {
                let element = stack.pop().ok_or_else(|| {
                    XmlError::Unbalanced(String::from_utf8_lossy(e.name().as_ref()).into_owned())
                })?;
                match stack.last_mut() {
                    Some(parent) => parent.push(element),
                    None => root = Some(element),
                }
            },
            Event::Text(e) => {
                if let Some(parent) = stack.last_mut() {
                    let raw = std::str::from_utf8(e.as_ref())?;
                    parent.append_text(&unescape_xml(raw));
                }
            },
            Event::GeneralRef(e) => {
                if let Some(parent) = stack.last_mut() {
                    let name = std::str::from_utf8(e.as_ref())?;
                    let resolved =
                        resolve_entity(name).ok_or_else(|| XmlError::UnknownEntity(name.into()))?;
                    parent.append_text(&resolved);
                }
            },
            Event::CData(e) => {
                if let Some(parent) = stack.last_mut() {
                    let raw = std::str::from_utf8(e.as_ref())?;
                    parent.children.push(XmlNode::CData(raw.to_string()));
                }
            },
            Event::Comment(e) => {
                if let Some(parent) = stack.last_mut() {
                    let raw = std::str::from_utf8(e.as_ref())?;
                    parent.children.push(XmlNode::Comment(raw.to_string()));
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }

    if let Some(open) = stack.pop() {
        return Err(XmlError::Unbalanced(open.name));
    }
    root.ok_or(XmlError::NoRoot)
}
