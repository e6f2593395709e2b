use crate::common::xml::XmlDocument;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::PackURI;
use crate::ooxml::opc::rel::Relationships;
use memchr::memmem;
/// Open Packaging Convention (OPC) objects related to package parts.
///
/// This module provides the Part trait and its implementations for representing
/// parts within an OPC package. Parts are the fundamental units of content in an
/// OPC package, each with a unique partname, content type, and optional relationships.
use std::fmt::Debug;

/// Trait representing a part in an OPC package.
///
/// Parts are the fundamental units of content in an OPC package. Each part
/// has a unique partname (PackURI), a content type, and may have relationships
/// to other parts.
pub trait Part: Debug {
    /// Get the partname of this part.
    fn partname(&self) -> &PackURI;

    /// Get the content type of this part.
    fn content_type(&self) -> &str;

    /// Get the binary content of this part.
    fn blob(&self) -> &[u8];

    /// Replace the binary content of this part.
    fn set_blob(&mut self, blob: Vec<u8>);

    /// Get the relationships for this part.
    fn rels(&self) -> &Relationships;

    /// Get mutable access to the relationships for this part.
    fn rels_mut(&mut self) -> &mut Relationships;

    /// Clone into a new boxed part.
    fn clone_box(&self) -> Box<dyn Part>;

    /// Parse the content into an owned tree.
    fn tree(&self) -> Result<XmlDocument> {
        XmlDocument::parse(self.blob()).map_err(|e| OpcError::tree(self.partname().as_str(), e))
    }

    /// Replace the content with a serialized tree.
    fn set_tree(&mut self, tree: &XmlDocument) {
        self.set_blob(tree.to_bytes());
    }

    /// Whether the payload is XML.
    fn is_xml(&self) -> bool {
        PartFactory::is_xml_content_type(self.content_type())
    }

    /// Add or get a relationship to another part.
    ///
    /// If a relationship of the given type to the target already exists,
    /// returns its rId. Otherwise, creates a new relationship and returns
    /// the new rId.
    fn relate_to(&mut self, target_ref: &str, reltype: &str) -> String {
        let rel = self.rels_mut().get_or_add(reltype, target_ref);
        rel.r_id().to_string()
    }

    /// Add or get an external relationship.
    fn relate_to_ext(&mut self, target_url: &str, reltype: &str) -> String {
        self.rels_mut().get_or_add_ext_rel(reltype, target_url)
    }

    /// Get the target reference for a relationship ID.
    fn target_ref(&self, r_id: &str) -> Result<&str> {
        self.rels()
            .get(r_id)
            .map(|rel| rel.target_ref())
            .ok_or_else(|| {
                OpcError::RelationshipNotFound(format!("{} in {}", r_id, self.partname()))
            })
    }

    /// Count attribute references (`="rIdN"`) to a relationship ID in the part content.
    ///
    /// Byte-level scan; binary parts return 0.
    fn rel_ref_count(&self, r_id: &str) -> usize {
        if !self.is_xml() {
            return 0;
        }
        let pattern = format!(r#"="{}""#, r_id);
        memmem::find_iter(self.blob(), pattern.as_bytes()).count()
    }
}

impl Clone for Box<dyn Part> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A part holding opaque binary content (images, embedded objects).
#[derive(Debug, Clone)]
pub struct BlobPart {
    /// The partname (URI) of this part
    partname: PackURI,

    /// The content type of this part
    content_type: String,

    /// The binary content of this part
    blob: Vec<u8>,

    /// Relationships from this part to other parts
    rels: Relationships,
}

impl BlobPart {
    /// Create a new BlobPart.
    ///
    /// # Arguments
    /// * `partname` - The partname (URI) of this part
    /// * `content_type` - The content type of this part
    /// * `blob` - The binary content of this part
    pub fn new(partname: PackURI, content_type: String, blob: Vec<u8>) -> Self {
        let rels = Relationships::new(partname.base_uri().to_string());
        Self {
            partname,
            content_type,
            blob,
            rels,
        }
    }
}

impl Part for BlobPart {
    fn partname(&self) -> &PackURI {
        &self.partname
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn blob(&self) -> &[u8] {
        &self.blob
    }

    fn set_blob(&mut self, blob: Vec<u8>) {
        self.blob = blob;
    }

    fn rels(&self) -> &Relationships {
        &self.rels
    }

    fn rels_mut(&mut self) -> &mut Relationships {
        &mut self.rels
    }

    fn clone_box(&self) -> Box<dyn Part> {
        Box::new(self.clone())
    }
}

/// An XML part.
///
/// The raw bytes stay authoritative; callers parse them into an [`XmlDocument`]
/// with [`Part::tree`] and write edits back with [`Part::set_tree`].
#[derive(Debug, Clone)]
pub struct XmlPart {
    /// The partname (URI) of this part
    partname: PackURI,

    /// The content type of this part
    content_type: String,

    /// The XML content as raw bytes, in whatever encoding the producer used
    xml_bytes: Vec<u8>,

    /// Relationships from this part to other parts
    rels: Relationships,
}

impl XmlPart {
    /// Create a new XmlPart.
    ///
    /// # Arguments
    /// * `partname` - The partname (URI) of this part
    /// * `content_type` - The content type of this part
    /// * `xml_bytes` - The XML content as raw bytes
    pub fn new(partname: PackURI, content_type: String, xml_bytes: Vec<u8>) -> Self {
        let rels = Relationships::new(partname.base_uri().to_string());
        Self {
            partname,
            content_type,
            xml_bytes,
            rels,
        }
    }

    /// Create an XmlPart from a parsed tree.
    pub fn from_tree(partname: PackURI, content_type: String, tree: &XmlDocument) -> Self {
        Self::new(partname, content_type, tree.to_bytes())
    }
}

impl Part for XmlPart {
    fn partname(&self) -> &PackURI {
        &self.partname
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn blob(&self) -> &[u8] {
        &self.xml_bytes
    }

    fn set_blob(&mut self, blob: Vec<u8>) {
        self.xml_bytes = blob;
    }

    fn rels(&self) -> &Relationships {
        &self.rels
    }

    fn rels_mut(&mut self) -> &mut Relationships {
        &mut self.rels
    }

    fn clone_box(&self) -> Box<dyn Part> {
        Box::new(self.clone())
    }
}

/// Factory for creating Part instances based on content type.
///
/// Dispatches to [`XmlPart`] for XML content and [`BlobPart`] for everything else.
pub struct PartFactory;

impl PartFactory {
    /// Load a part from raw data, selecting the appropriate Part type based on content type.
    ///
    /// # Arguments
    /// * `partname` - The partname (URI) of the part
    /// * `content_type` - The content type of the part
    /// * `blob` - The raw binary content (consumed by this function)
    ///
    /// # Returns
    /// A boxed Part trait object
    pub fn load(partname: PackURI, content_type: String, blob: Vec<u8>) -> Box<dyn Part> {
        if Self::is_xml_content_type(&content_type) {
            Box::new(XmlPart::new(partname, content_type, blob))
        } else {
            Box::new(BlobPart::new(partname, content_type, blob))
        }
    }

    /// Check if a content type represents XML content.
    #[inline]
    pub fn is_xml_content_type(content_type: &str) -> bool {
        content_type.ends_with("+xml") || content_type.ends_with("/xml")
    }
}
