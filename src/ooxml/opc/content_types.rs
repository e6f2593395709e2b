//! The `[Content_Types].xml` table.
//!
//! Implements the OPC content type discovery algorithm using `Default`
//! (by extension) and `Override` (by partname) entries, and keeps the table in
//! step with the package as parts are added and removed.

use crate::common::xml::escape_xml;
use crate::ooxml::opc::constants::{content_type as ct, namespace};
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::PackURI;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;

/// Content type map for looking up content types by part name or extension.
#[derive(Debug, Clone)]
pub struct ContentTypes {
    /// Maps lowercase file extensions to default content types
    defaults: HashMap<String, String>,

    /// Maps specific partnames to override content types
    overrides: HashMap<PackURI, String>,
}

impl ContentTypes {
    /// Create a table holding the two defaults every package carries.
    pub fn new() -> Self {
        let mut defaults = HashMap::new();
        defaults.insert("rels".to_string(), ct::OPC_RELATIONSHIPS.to_string());
        defaults.insert("xml".to_string(), ct::XML.to_string());
        Self {
            defaults,
            overrides: HashMap::new(),
        }
    }

    /// Parse content types from [Content_Types].xml.
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut map = Self {
            defaults: HashMap::new(),
            overrides: HashMap::new(),
        };
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    match e.local_name().as_ref() {
                        b"Default" => {
                            // <Default Extension="xml" ContentType="application/xml"/>
                            let mut extension = None;
                            let mut content_type = None;

                            for attr in e.attributes() {
                                let attr = attr?;
                                match attr.key.as_ref() {
                                    b"Extension" => {
                                        extension = Some(attr.unescape_value()?.to_string());
                                    },
                                    b"ContentType" => {
                                        content_type = Some(attr.unescape_value()?.to_string());
                                    },
                                    _ => {},
                                }
                            }

                            if let (Some(ext), Some(ct)) = (extension, content_type) {
                                map.add_default(&ext, ct);
                            }
                        },
                        b"Override" => {
                            // <Override PartName="/word/document.xml" ContentType="..."/>
                            let mut partname = None;
                            let mut content_type = None;

                            for attr in e.attributes() {
                                let attr = attr?;
                                match attr.key.as_ref() {
                                    b"PartName" => {
                                        partname = Some(attr.unescape_value()?.to_string());
                                    },
                                    b"ContentType" => {
                                        content_type = Some(attr.unescape_value()?.to_string());
                                    },
                                    _ => {},
                                }
                            }

                            if let (Some(pn), Some(ct)) = (partname, content_type) {
                                let partname = PackURI::new(pn).map_err(OpcError::InvalidPackUri)?;
                                map.overrides.insert(partname, ct);
                            }
                        },
                        _ => {},
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(OpcError::XmlError(format!(
                        "Content types parse error: {}",
                        e
                    )));
                },
                _ => {},
            }
            buf.clear();
        }

        Ok(map)
    }

    /// Add a default content type mapping for a file extension.
    pub fn add_default(&mut self, extension: &str, content_type: String) {
        self.defaults.insert(extension.to_lowercase(), content_type);
    }

    /// Get the content type for a partname.
    ///
    /// First checks for an override, then falls back to the default
    /// based on file extension.
    pub fn get(&self, partname: &PackURI) -> Result<&str> {
        if let Some(ct) = self.overrides.get(partname) {
            return Ok(ct);
        }

        self.defaults
            .get(&partname.ext().to_lowercase())
            .map(String::as_str)
            .ok_or_else(|| OpcError::ContentTypeNotFound(partname.to_string()))
    }

    /// Register a part.
    ///
    /// Media and other well-known extensions become (or reuse) a `Default`
    /// entry; everything else gets an `Override` for the specific partname.
    pub fn add_part(&mut self, partname: &PackURI, content_type: &str) {
        let ext = partname.ext().to_lowercase();
        let default_matches = self.defaults.get(&ext).is_some_and(|d| d == content_type);

        if default_matches {
            self.overrides.remove(partname);
        } else if Self::is_default_content_type(&ext, content_type) && !self.defaults.contains_key(&ext) {
            self.defaults.insert(ext, content_type.to_string());
            self.overrides.remove(partname);
        } else {
            self.overrides
                .insert(partname.clone(), content_type.to_string());
        }
    }

    /// Forget a removed part. Extension defaults are shared and stay.
    pub fn remove_part(&mut self, partname: &PackURI) -> Option<String> {
        self.overrides.remove(partname)
    }

    /// Check whether a partname has its own `Override` entry.
    #[inline]
    pub fn has_override(&self, partname: &PackURI) -> bool {
        self.overrides.contains_key(partname)
    }

    /// Check if an extension/content-type pair is a standard default.
    fn is_default_content_type(ext: &str, content_type: &str) -> bool {
        matches!(
            (ext, content_type),
            ("rels", ct::OPC_RELATIONSHIPS)
                | ("xml", ct::XML)
                | ("png", ct::PNG)
                | ("jpg", ct::JPEG)
                | ("jpeg", ct::JPEG)
                | ("gif", ct::GIF)
                | ("bmp", ct::BMP)
                | ("tif", ct::TIFF)
                | ("tiff", ct::TIFF)
                | ("emf", ct::X_EMF)
                | ("wmf", ct::X_WMF)
                | ("svg", ct::SVG)
                | ("bin", ct::OFC_OLE_OBJECT)
        )
    }

    /// Generate the XML for [Content_Types].xml.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(4096);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(&format!(r#"<Types xmlns="{}">"#, namespace::OPC_CONTENT_TYPES));

        // Default elements, sorted by extension
        let mut exts: Vec<_> = self.defaults.iter().collect();
        exts.sort();
        for (ext, content_type) in exts {
            xml.push_str(&format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                escape_xml(ext),
                escape_xml(content_type)
            ));
        }

        // Override elements, sorted by partname
        let mut partnames: Vec<_> = self.overrides.iter().collect();
        partnames.sort();
        for (partname, content_type) in partnames {
            xml.push_str(&format!(
                r#"<Override PartName="{}" ContentType="{}"/>"#,
                escape_xml(partname.as_str()),
                escape_xml(content_type)
            ));
        }

        xml.push_str("</Types>");

        xml
    }
}

impl Default for ContentTypes {
    fn default() -> Self {
        Self::new()
    }
}
