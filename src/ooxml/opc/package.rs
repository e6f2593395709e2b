/// Objects that implement reading and writing OPC packages.
///
/// This module provides the main OpcPackage type, which represents an Open Packaging
/// Convention package in memory. It owns the parts, the package-level relationships
/// and the content types table, and keeps the three consistent.
use crate::ooxml::opc::constants::relationship_type;
use crate::ooxml::opc::content_types::ContentTypes;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::{PACKAGE_URI, PackURI};
use crate::ooxml::opc::part::{Part, PartFactory};
use crate::ooxml::opc::phys_pkg::PhysPkgReader;
use crate::ooxml::opc::pkgreader::PackageReader;
use crate::ooxml::opc::pkgwriter::PackageWriter;
use crate::ooxml::opc::rel::{Relationship, Relationships};
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::debug;

/// Main API class for working with OPC packages.
///
/// OpcPackage represents an Open Packaging Convention package in memory,
/// providing access to parts, relationships, and package-level operations.
#[derive(Debug, Clone)]
pub struct OpcPackage {
    /// Package-level relationships
    rels: Relationships,

    /// All parts in the package, indexed by partname
    parts: HashMap<PackURI, Box<dyn Part>>,

    /// Default and override content type declarations
    content_types: ContentTypes,
}

impl OpcPackage {
    /// Create a new empty OPC package.
    pub fn new() -> Self {
        Self {
            rels: Relationships::new(PACKAGE_URI.to_string()),
            parts: HashMap::new(),
            content_types: ContentTypes::new(),
        }
    }

    /// Open an OPC package from a file.
    ///
    /// # Example
    /// ```no_run
    /// use quire::ooxml::opc::package::OpcPackage;
    ///
    /// let pkg = OpcPackage::open("document.docx").unwrap();
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let phys_reader = PhysPkgReader::open(path)?;
        Self::from_phys_reader(phys_reader)
    }

    /// Load an OPC package from an in-memory buffer.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let phys_reader = PhysPkgReader::from_bytes(data)?;
        Self::from_phys_reader(phys_reader)
    }

    /// Load an OPC package from a reader.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let phys_reader = PhysPkgReader::new(reader)?;
        Self::from_phys_reader(phys_reader)
    }

    /// Load an OPC package from a physical package reader.
    fn from_phys_reader(phys_reader: PhysPkgReader) -> Result<Self> {
        let pkg_reader = PackageReader::from_phys_reader(phys_reader)?;
        let package = Self::unmarshal(pkg_reader);
        debug!(
            parts = package.parts.len(),
            rels = package.rels.len(),
            "loaded OPC package"
        );
        Ok(package)
    }

    /// Convert serialized parts and relationships into the in-memory object graph.
    fn unmarshal(mut pkg_reader: PackageReader) -> Self {
        let mut package = Self::new();
        package.content_types = pkg_reader.take_content_types();

        for srel in pkg_reader.take_pkg_srels() {
            package
                .rels
                .add_relationship(srel.reltype, srel.target_ref, srel.r_id, srel.target_mode);
        }

        for spart in pkg_reader.take_sparts() {
            let mut part = PartFactory::load(spart.partname, spart.content_type, spart.blob);
            for srel in spart.srels {
                part.rels_mut().add_relationship(
                    srel.reltype,
                    srel.target_ref,
                    srel.r_id,
                    srel.target_mode,
                );
            }
            package.parts.insert(part.partname().clone(), part);
        }

        package
    }

    /// Serialize the package to ZIP bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        PackageWriter::to_bytes(self)
    }

    /// Write the package to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        PackageWriter::write(path, self)
    }

    /// Get a reference to the main document part (the `officeDocument` target).
    pub fn main_document_part(&self) -> Result<&dyn Part> {
        self.part_by_reltype(relationship_type::OFFICE_DOCUMENT)
    }

    /// Get a part by its partname.
    pub fn get_part(&self, partname: &PackURI) -> Result<&dyn Part> {
        self.parts
            .get(partname)
            .map(|b| &**b as &dyn Part)
            .ok_or_else(|| OpcError::PartNotFound(partname.to_string()))
    }

    /// Get a mutable reference to a part by its partname.
    pub fn get_part_mut(&mut self, partname: &PackURI) -> Result<&mut dyn Part> {
        match self.parts.get_mut(partname) {
            Some(part) => Ok(part.as_mut()),
            None => Err(OpcError::PartNotFound(partname.to_string())),
        }
    }

    /// Get a part by relationship type from the package level.
    pub fn part_by_reltype(&self, reltype: &str) -> Result<&dyn Part> {
        let rel = self.rels.part_with_reltype(reltype)?;
        self.get_part(&rel.target_partname()?)
    }

    /// Resolve a relationship of `source` (a part, or the package when
    /// `source` is "/") to its target part.
    pub fn related_part(&self, source: &PackURI, r_id: &str) -> Result<&dyn Part> {
        let rel = self.relationship(source, r_id)?;
        self.get_part(&rel.target_partname()?)
    }

    /// Look up a relationship by owning source and id.
    pub fn relationship(&self, source: &PackURI, r_id: &str) -> Result<&Relationship> {
        let rels = if source.as_str() == PACKAGE_URI {
            &self.rels
        } else {
            self.get_part(source)?.rels()
        };
        rels.get(r_id)
            .ok_or_else(|| OpcError::RelationshipNotFound(format!("{} in {}", r_id, source)))
    }

    /// Add a part, registering its content type. A part already stored under
    /// the same partname is replaced.
    pub fn add_part(&mut self, part: Box<dyn Part>) {
        self.content_types
            .add_part(part.partname(), part.content_type());
        self.parts.insert(part.partname().clone(), part);
    }

    /// Remove a part.
    ///
    /// Its content type override goes with it, as does every internal
    /// relationship (package-level or from another part) that targets it.
    pub fn drop_part(&mut self, partname: &PackURI) -> Result<Box<dyn Part>> {
        let part = self
            .parts
            .remove(partname)
            .ok_or_else(|| OpcError::PartNotFound(partname.to_string()))?;
        self.content_types.remove_part(partname);

        let mut dropped = self.rels.remove_targeting(partname).len();
        for other in self.parts.values_mut() {
            dropped += other.rels_mut().remove_targeting(partname).len();
        }
        debug!(part = %partname, inbound_rels = dropped, "dropped part");

        Ok(part)
    }

    /// Check if a part exists in the package.
    #[inline]
    pub fn contains_part(&self, partname: &PackURI) -> bool {
        self.parts.contains_key(partname)
    }

    /// Get an iterator over all parts in the package.
    pub fn iter_parts(&self) -> impl Iterator<Item = &dyn Part> {
        self.parts.values().map(|b| &**b as &dyn Part)
    }

    /// All partnames, sorted.
    pub fn partnames(&self) -> Vec<PackURI> {
        let mut names: Vec<PackURI> = self.parts.keys().cloned().collect();
        names.sort();
        names
    }

    /// Parts carrying a given content type, in partname order.
    pub fn parts_with_content_type<'a>(&'a self, content_type: &'a str) -> Vec<&'a dyn Part> {
        let mut parts: Vec<&dyn Part> = self
            .iter_parts()
            .filter(|p| p.content_type() == content_type)
            .collect();
        parts.sort_by(|a, b| a.partname().cmp(b.partname()));
        parts
    }

    /// Get the number of parts in the package.
    #[inline]
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Get a reference to the package-level relationships.
    #[inline]
    pub fn rels(&self) -> &Relationships {
        &self.rels
    }

    /// Get a mutable reference to the package-level relationships.
    #[inline]
    pub fn rels_mut(&mut self) -> &mut Relationships {
        &mut self.rels
    }

    /// The content types table.
    #[inline]
    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    /// Relate the package to a part, returning the relationship ID.
    ///
    /// Reuses an existing relationship of the same type to the same part.
    pub fn relate_to(&mut self, partname: &PackURI, reltype: &str) -> String {
        let target_ref = partname.relative_ref(PACKAGE_URI);
        self.rels.get_or_add(reltype, &target_ref).r_id().to_string()
    }

    /// Find the next available partname for a numbered template.
    ///
    /// The template carries a `%d` placeholder, e.g. `/word/media/image%d.png`;
    /// the first number from 1 whose name is unused wins.
    pub fn next_partname(&self, template: &str) -> Result<PackURI> {
        if !template.contains("%d") {
            return Err(OpcError::InvalidPackUri(format!(
                "partname template '{}' has no %d placeholder",
                template
            )));
        }
        // At most parts.len() numbers can be taken
        let limit = self.parts.len() as u32 + 1;
        for n in 1..=limit {
            let candidate = PackURI::new(template.replace("%d", &n.to_string()))
                .map_err(OpcError::InvalidPackUri)?;
            if !self.parts.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        Err(OpcError::InvalidPackUri(format!(
            "no free partname for template '{}'",
            template
        )))
    }
}

impl Default for OpcPackage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::constants::content_type as ct;
    use crate::ooxml::opc::part::{BlobPart, XmlPart};
    use proptest::prelude::*;
    use std::io::{Cursor, Write};
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn create_minimal_docx() -> Vec<u8> {
        let mut zip_data = Vec::new();
        {
            let cursor = Cursor::new(&mut zip_data);
            let mut writer = ZipWriter::new(cursor);
            let options = SimpleFileOptions::default();

            writer.start_file("[Content_Types].xml", options).unwrap();
            writer.write_all(br#"<?xml version="1.0"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
    <Default Extension="png" ContentType="image/png"/>
    <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>"#).unwrap();

            writer.start_file("_rels/.rels", options).unwrap();
            writer.write_all(br#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#).unwrap();

            writer.start_file("word/_rels/document.xml.rels", options).unwrap();
            writer.write_all(br#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/>
</Relationships>"#).unwrap();

            writer.start_file("word/document.xml", options).unwrap();
            writer.write_all(br#"<?xml version="1.0"?>
<document xmlns="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
    <body><p><t>Test</t></p></body>
</document>"#).unwrap();

            writer.start_file("word/media/image1.png", options).unwrap();
            writer.write_all(&[0x89, b'P', b'N', b'G']).unwrap();

            writer.finish().unwrap();
        }
        zip_data
    }

    fn uri(s: &str) -> PackURI {
        PackURI::new(s).unwrap()
    }

    #[test]
    fn test_open_package() {
        let pkg = OpcPackage::from_reader(Cursor::new(create_minimal_docx())).unwrap();

        assert_eq!(pkg.part_count(), 2);
        let main_part = pkg.main_document_part().unwrap();
        assert_eq!(main_part.content_type(), ct::WML_DOCUMENT_MAIN);
        assert_eq!(
            pkg.related_part(&uri("/word/document.xml"), "rId4")
                .unwrap()
                .content_type(),
            ct::PNG
        );
        assert!(matches!(
            pkg.related_part(&uri("/word/document.xml"), "rId9"),
            Err(OpcError::RelationshipNotFound(_))
        ));
        assert!(matches!(
            pkg.get_part(&uri("/word/styles.xml")),
            Err(OpcError::PartNotFound(_))
        ));
    }

    #[test]
    fn test_save_and_reload_preserves_ids() {
        let pkg = OpcPackage::from_bytes(&create_minimal_docx()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.docx");
        pkg.save(&path).unwrap();

        let reopened = OpcPackage::open(&path).unwrap();
        assert_eq!(reopened.partnames(), pkg.partnames());
        let main = reopened.main_document_part().unwrap();
        assert_eq!(main.rels().get("rId4").unwrap().target_ref(), "media/image1.png");
        assert_eq!(main.blob(), pkg.main_document_part().unwrap().blob());
    }

    #[test]
    fn test_drop_part_removes_inbound_rels() {
        let mut pkg = OpcPackage::from_bytes(&create_minimal_docx()).unwrap();
        let image = uri("/word/media/image1.png");

        pkg.drop_part(&image).unwrap();
        assert!(!pkg.contains_part(&image));
        assert!(pkg.main_document_part().unwrap().rels().is_empty());
        assert!(pkg.drop_part(&image).is_err());
    }

    #[test]
    fn test_add_part_registers_content_type() {
        let mut pkg = OpcPackage::new();
        let styles = uri("/word/styles.xml");
        pkg.add_part(Box::new(XmlPart::new(styles.clone(), ct::WML_STYLES.to_string(), b"<s/>".to_vec())));
        assert_eq!(pkg.content_types().get(&styles).unwrap(), ct::WML_STYLES);
        assert_eq!(pkg.parts_with_content_type(ct::WML_STYLES).len(), 1);

        pkg.drop_part(&styles).unwrap();
        assert!(!pkg.content_types().has_override(&styles));
    }

    #[test]
    fn test_next_partname() {
        let mut pkg = OpcPackage::new();
        assert!(pkg.next_partname("/word/media/image.png").is_err());

        for n in [1, 2, 4] {
            pkg.add_part(Box::new(BlobPart::new(
                uri(&format!("/word/media/image{n}.png")),
                ct::PNG.to_string(),
                vec![n as u8],
            )));
        }
        assert_eq!(
            pkg.next_partname("/word/media/image%d.png").unwrap().as_str(),
            "/word/media/image3.png"
        );
    }

    proptest! {
        #[test]
        fn prop_next_partname_is_free(taken in proptest::collection::btree_set(1u32..40, 0..30)) {
            let mut pkg = OpcPackage::new();
            for n in &taken {
                pkg.add_part(Box::new(BlobPart::new(
                    uri(&format!("/word/media/image{n}.png")),
                    ct::PNG.to_string(),
                    Vec::new(),
                )));
            }
            let next = pkg.next_partname("/word/media/image%d.png").unwrap();
            prop_assert!(!pkg.contains_part(&next));
            let n = next.idx().unwrap();
            prop_assert!((1..n).all(|k| taken.contains(&k)));
        }
    }
}
