//! Types and utilities shared across the package and document layers.

pub mod id;
pub mod xml;

pub use id::{format_guid, generate_rsid, guid_from_content};
pub use xml::{XmlDocument, XmlElement, XmlNode};
