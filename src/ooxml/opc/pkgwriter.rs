//! Package writer for OPC packages.
//!
//! This module serializes an in-memory package: the [Content_Types].xml table,
//! the package relationships, and every part with its relationships.

use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::package::OpcPackage;
use crate::ooxml::opc::packuri::{CONTENT_TYPES_URI, PACKAGE_URI, PackURI};
use crate::ooxml::opc::phys_pkg::PhysPkgWriter;
use std::path::Path;

/// Package writer that serializes an OPC package to a ZIP file.
///
/// Members are written in a fixed order ([Content_Types].xml, `_rels/.rels`,
/// then parts by name) so equal packages produce equal archives.
pub struct PackageWriter;

impl PackageWriter {
    /// Write an OPC package to a file.
    ///
    /// # Arguments
    /// * `path` - Path where the package should be written
    /// * `package` - The OPC package to write
    pub fn write<P: AsRef<Path>>(path: P, package: &OpcPackage) -> Result<()> {
        let bytes = Self::to_bytes(package)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Write an OPC package to a stream.
    pub fn write_to_stream<W: std::io::Write>(mut writer: W, package: &OpcPackage) -> Result<()> {
        let bytes = Self::to_bytes(package)?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    /// Serialize an OPC package to bytes.
    pub fn to_bytes(package: &OpcPackage) -> Result<Vec<u8>> {
        let mut phys_writer = PhysPkgWriter::new();

        Self::write_content_types(&mut phys_writer, package)?;
        Self::write_pkg_rels(&mut phys_writer, package)?;
        Self::write_parts(&mut phys_writer, package)?;

        phys_writer.finish()
    }

    /// Write the [Content_Types].xml part.
    fn write_content_types(phys_writer: &mut PhysPkgWriter, package: &OpcPackage) -> Result<()> {
        let content_types_uri = PackURI::new(CONTENT_TYPES_URI).map_err(OpcError::InvalidPackUri)?;
        phys_writer.write(&content_types_uri, package.content_types().to_xml().as_bytes())
    }

    /// Write package-level relationships.
    fn write_pkg_rels(phys_writer: &mut PhysPkgWriter, package: &OpcPackage) -> Result<()> {
        let package_uri = PackURI::new(PACKAGE_URI).map_err(OpcError::InvalidPackUri)?;
        let rels_uri = package_uri.rels_uri().map_err(OpcError::InvalidPackUri)?;
        phys_writer.write(&rels_uri, package.rels().to_xml().as_bytes())
    }

    /// Write all parts and their relationships.
    fn write_parts(phys_writer: &mut PhysPkgWriter, package: &OpcPackage) -> Result<()> {
        let mut parts: Vec<_> = package.iter_parts().collect();
        parts.sort_by(|a, b| a.partname().cmp(b.partname()));

        for part in parts {
            phys_writer.write(part.partname(), part.blob())?;

            if !part.rels().is_empty() {
                let rels_uri = part
                    .partname()
                    .rels_uri()
                    .map_err(OpcError::InvalidPackUri)?;
                phys_writer.write(&rels_uri, part.rels().to_xml().as_bytes())?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::constants::{content_type as ct, relationship_type as rt};
    use crate::ooxml::opc::part::{Part, XmlPart};
    use crate::ooxml::opc::phys_pkg::PhysPkgReader;

    #[test]
    fn test_writes_all_members() {
        let mut pkg = OpcPackage::new();
        let partname = PackURI::new("/word/document.xml").unwrap();
        let mut part = XmlPart::new(partname.clone(), ct::WML_DOCUMENT_MAIN.to_string(), b"<w:document/>".to_vec());
        part.relate_to("styles.xml", rt::STYLES);
        pkg.add_part(Box::new(part));
        pkg.add_part(Box::new(XmlPart::new(
            PackURI::new("/word/styles.xml").unwrap(),
            ct::WML_STYLES.to_string(),
            b"<w:styles/>".to_vec(),
        )));
        pkg.relate_to(&partname, rt::OFFICE_DOCUMENT);

        let bytes = PackageWriter::to_bytes(&pkg).unwrap();
        let reader = PhysPkgReader::from_bytes(&bytes).unwrap();
        assert_eq!(
            reader.member_names(),
            vec![
                "[Content_Types].xml",
                "_rels/.rels",
                "word/_rels/document.xml.rels",
                "word/document.xml",
                "word/styles.xml",
            ]
        );

        let types = String::from_utf8(reader.content_types_xml().unwrap().to_vec()).unwrap();
        assert!(types.contains(r#"<Override PartName="/word/styles.xml""#));

        let mut out = Vec::new();
        PackageWriter::write_to_stream(&mut out, &pkg).unwrap();
        assert!(PhysPkgReader::from_bytes(&out).unwrap().contains(&partname));
    }
}
