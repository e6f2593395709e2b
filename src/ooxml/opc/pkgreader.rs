//! Low-level, read-only API to a serialized Open Packaging Convention (OPC) package.
//!
//! This module provides the PackageReader for parsing OPC packages: content type
//! mapping, relationship parsing and part loading.

use crate::ooxml::opc::content_types::ContentTypes;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::{CONTENT_TYPES_URI, PACKAGE_URI, PackURI};
use crate::ooxml::opc::phys_pkg::PhysPkgReader;
use crate::ooxml::opc::rel::TargetMode;
use quick_xml::Reader;
use quick_xml::events::Event;
use smallvec::SmallVec;

/// Serialized part with its content and relationships.
///
/// Represents a part as loaded from the physical package, before
/// being converted into a Part object.
#[derive(Debug)]
pub struct SerializedPart {
    /// The partname (URI) of this part
    pub partname: PackURI,

    /// The content type of this part
    pub content_type: String,

    /// The binary content of this part
    pub blob: Vec<u8>,

    /// Serialized relationships from this part
    pub srels: SmallVec<[SerializedRelationship; 8]>,
}

/// Serialized relationship as read from a .rels file.
#[derive(Debug, Clone)]
pub struct SerializedRelationship {
    /// Relationship ID (e.g., "rId1")
    pub r_id: String,

    /// Relationship type URI
    pub reltype: String,

    /// Target reference (relative URI or external URL)
    pub target_ref: String,

    /// Target mode (Internal or External)
    pub target_mode: TargetMode,
}

/// Package reader that provides access to serialized parts and relationships.
pub struct PackageReader {
    /// Parsed [Content_Types].xml
    content_types: ContentTypes,

    /// Package-level relationships
    pkg_srels: SmallVec<[SerializedRelationship; 8]>,

    /// All serialized parts in the package
    sparts: Vec<SerializedPart>,
}

impl PackageReader {
    /// Parse an OPC package from a physical reader.
    ///
    /// Every member other than `[Content_Types].xml` and the `.rels` files
    /// becomes a part, whether or not a relationship reaches it.
    pub fn from_phys_reader(mut phys_reader: PhysPkgReader) -> Result<Self> {
        let content_types = ContentTypes::from_xml(phys_reader.content_types_xml()?)?;

        let package_uri = PackURI::new(PACKAGE_URI).map_err(OpcError::InvalidPackUri)?;
        let pkg_srels = Self::load_rels(&phys_reader, &package_uri)?;

        let mut partnames = Vec::with_capacity(phys_reader.len());
        for name in phys_reader.member_names() {
            let partname = PackURI::new(format!("/{}", name)).map_err(OpcError::InvalidPackUri)?;
            if partname.as_str() == CONTENT_TYPES_URI || partname.is_rels_part() {
                continue;
            }
            partnames.push(partname);
        }

        let mut sparts = Vec::with_capacity(partnames.len());
        for partname in partnames {
            let srels = Self::load_rels(&phys_reader, &partname)?;
            let content_type = content_types.get(&partname)?.to_string();
            let blob = phys_reader
                .take(partname.membername())
                .ok_or_else(|| OpcError::PartNotFound(partname.to_string()))?;

            sparts.push(SerializedPart {
                partname,
                content_type,
                blob,
                srels,
            });
        }

        Ok(Self {
            content_types,
            pkg_srels,
            sparts,
        })
    }

    /// Load the relationships of a source, empty if it has no .rels member.
    fn load_rels(
        phys_reader: &PhysPkgReader,
        source_uri: &PackURI,
    ) -> Result<SmallVec<[SerializedRelationship; 8]>> {
        match phys_reader.rels_xml_for(source_uri)? {
            Some(xml) => Self::parse_rels_xml(xml),
            None => Ok(SmallVec::new()),
        }
    }

    /// Parse relationships XML into SerializedRelationship structs.
    pub fn parse_rels_xml(rels_xml: &[u8]) -> Result<SmallVec<[SerializedRelationship; 8]>> {
        let mut srels = SmallVec::new();
        let mut reader = Reader::from_reader(rels_xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    if e.local_name().as_ref() == b"Relationship" {
                        let mut r_id = None;
                        let mut reltype = None;
                        let mut target_ref = None;
                        let mut target_mode = TargetMode::Internal;

                        for attr in e.attributes() {
                            let attr = attr?;
                            match attr.key.as_ref() {
                                b"Id" => r_id = Some(attr.unescape_value()?.to_string()),
                                b"Type" => reltype = Some(attr.unescape_value()?.to_string()),
                                b"Target" => target_ref = Some(attr.unescape_value()?.to_string()),
                                b"TargetMode" => {
                                    target_mode = TargetMode::from_xml(&attr.unescape_value()?)
                                },
                                _ => {},
                            }
                        }

                        match (r_id, reltype, target_ref) {
                            (Some(r_id), Some(reltype), Some(target_ref)) => {
                                srels.push(SerializedRelationship {
                                    r_id,
                                    reltype,
                                    target_ref,
                                    target_mode,
                                });
                            },
                            (r_id, _, _) => {
                                return Err(OpcError::InvalidRelationship(format!(
                                    "Relationship {} lacks Id, Type or Target",
                                    r_id.as_deref().unwrap_or("<no id>")
                                )));
                            },
                        }
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(OpcError::XmlError(format!("Rels parse error: {}", e))),
                _ => {},
            }
            buf.clear();
        }

        Ok(srels)
    }

    /// Take ownership of the content types table.
    pub fn take_content_types(&mut self) -> ContentTypes {
        std::mem::take(&mut self.content_types)
    }

    /// Take ownership of package-level relationships.
    pub fn take_pkg_srels(&mut self) -> SmallVec<[SerializedRelationship; 8]> {
        std::mem::take(&mut self.pkg_srels)
    }

    /// Take ownership of all serialized parts.
    pub fn take_sparts(&mut self) -> Vec<SerializedPart> {
        std::mem::take(&mut self.sparts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::phys_pkg::PhysPkgWriter;

    #[test]
    fn test_parse_rels_xml() {
        let xml = br#"<?xml version="1.0"?>
            <Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
                <Relationship Id="rId1" Type="t/styles" Target="styles.xml"/>
                <Relationship Id="rId2" Type="t/hyperlink" Target="https://a.b/?q=1&amp;r=2" TargetMode="External"/>
            </Relationships>"#;

        let srels = PackageReader::parse_rels_xml(xml).unwrap();
        assert_eq!(srels.len(), 2);
        assert_eq!(srels[0].target_mode, TargetMode::Internal);
        assert_eq!(srels[1].target_mode, TargetMode::External);
        assert_eq!(srels[1].target_ref, "https://a.b/?q=1&r=2");

        let broken = br#"<Relationships><Relationship Id="rId1" Type="t"/></Relationships>"#;
        assert!(matches!(
            PackageReader::parse_rels_xml(broken),
            Err(OpcError::InvalidRelationship(_))
        ));
    }

    #[test]
    fn test_loads_unreachable_parts() {
        let mut writer = PhysPkgWriter::new();
        let put = |w: &mut PhysPkgWriter, name: &str, data: &[u8]| {
            w.write(&PackURI::new(name).unwrap(), data).unwrap();
        };
        put(
            &mut writer,
            "/[Content_Types].xml",
            br#"<Types><Default Extension="xml" ContentType="application/xml"/><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/></Types>"#,
        );
        put(
            &mut writer,
            "/_rels/.rels",
            br#"<Relationships><Relationship Id="rId1" Type="t" Target="a.xml"/></Relationships>"#,
        );
        put(&mut writer, "/a.xml", b"<a/>");
        put(&mut writer, "/orphan/b.xml", b"<b/>");
        let bytes = writer.finish().unwrap();

        let mut reader =
            PackageReader::from_phys_reader(PhysPkgReader::from_bytes(&bytes).unwrap()).unwrap();
        assert_eq!(reader.take_pkg_srels().len(), 1);
        let mut names: Vec<String> = reader
            .take_sparts()
            .into_iter()
            .map(|p| p.partname.to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["/a.xml", "/orphan/b.xml"]);
    }
}
