//! XML helpers shared by every part parser.

mod escape;
mod tree;

pub use escape::{escape_text, escape_xml, resolve_entity, unescape_xml};
pub use tree::{
    Descendants, XmlDocument, XmlElement, XmlEncoding, XmlError, XmlNode, local_part, prefix_part, qualify,
};
