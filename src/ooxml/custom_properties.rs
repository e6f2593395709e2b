//! OOXML custom document properties.
//!
//! Custom properties are stored in the `docProps/custom.xml` part, reached from
//! the package relationships, and attach typed name/value pairs to a document.
//! Each property carries a `pid`; ids start at 2 and must stay unique.
//!
//! # Supported Property Types
//!
//! - **String** (`lpwstr`)
//! - **Integer** (`i4`) - 32-bit signed integer
//! - **Long** (`i8`) - 64-bit signed integer
//! - **Float** (`r4`) / **Double** (`r8`)
//! - **Boolean** (`bool`)
//! - **DateTime** (`filetime`)
//!
//! Any other variant type is carried through untouched as [`PropertyValue::Other`].
//!
//! # Example Usage
//!
//! ```rust
//! use quire::ooxml::custom_properties::{CustomProperties, PropertyValue};
//!
//! let mut props = CustomProperties::new();
//! props.add_property("ProjectName", PropertyValue::String("MyProject".to_string()));
//! props.add_property("Version", PropertyValue::Integer(42));
//!
//! let mut other = CustomProperties::new();
//! other.add_property("Version", PropertyValue::Integer(7));
//! other.add_property("Reviewed", PropertyValue::Boolean(true));
//!
//! // Names already present keep their value
//! assert_eq!(props.merge_from(&other), 1);
//! assert_eq!(props.get_property("Version"), Some(&PropertyValue::Integer(42)));
//! ```

use crate::common::xml::{XmlDocument, XmlElement};
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::constants::{content_type as ct, namespace, relationship_type as rt};
use crate::ooxml::opc::OpcPackage;
use crate::ooxml::opc::part::Part;
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::collections::HashMap;
use std::io::Cursor;

/// Fixed GUID format ID every custom property uses.
const FORMAT_ID: &str = "{D5CDD505-2E9C-101B-9397-08002B2CF9AE}";

/// Lowest pid a custom property may carry.
const FIRST_PID: i32 = 2;

/// Windows FILETIME epoch (1601-01-01) offset from the Unix epoch, in 100ns ticks.
const WINDOWS_EPOCH_OFFSET: i64 = 116_444_736_000_000_000;

/// A custom document property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// String value (lpwstr)
    String(String),
    /// 32-bit signed integer (i4)
    Integer(i32),
    /// 64-bit signed integer (i8)
    Long(i64),
    /// 32-bit floating point (r4)
    Float(f32),
    /// 64-bit floating point (r8)
    Double(f64),
    /// Boolean value (bool)
    Boolean(bool),
    /// DateTime value (filetime)
    DateTime(DateTime<Utc>),
    /// Any other variant type, kept verbatim
    Other { kind: String, text: String },
}

impl PropertyValue {
    /// Get the variant element name (without `vt:` prefix) for this value.
    fn element_name(&self) -> &str {
        match self {
            PropertyValue::String(_) => "lpwstr",
            PropertyValue::Integer(_) => "i4",
            PropertyValue::Long(_) => "i8",
            PropertyValue::Float(_) => "r4",
            PropertyValue::Double(_) => "r8",
            PropertyValue::Boolean(_) => "bool",
            PropertyValue::DateTime(_) => "filetime",
            PropertyValue::Other { kind, .. } => kind,
        }
    }

    /// Convert the value to its string representation for XML.
    fn to_xml_string(&self) -> String {
        match self {
            PropertyValue::String(s) => s.clone(),
            PropertyValue::Integer(i) => i.to_string(),
            PropertyValue::Long(l) => l.to_string(),
            PropertyValue::Float(f) => f.to_string(),
            PropertyValue::Double(d) => d.to_string(),
            PropertyValue::Boolean(b) => b.to_string(),
            PropertyValue::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
            PropertyValue::Other { text, .. } => text.clone(),
        }
    }

    /// Parse a property value from its variant element name and text.
    fn from_xml_string(element: &str, text: &str) -> Result<Self> {
        let invalid = |e: &dyn std::fmt::Display| {
            OoxmlError::InvalidFormat(format!("Invalid {} value '{}': {}", element, text, e))
        };
        match element {
            "lpwstr" => Ok(PropertyValue::String(text.to_string())),
            "i4" => text
                .trim()
                .parse::<i32>()
                .map(PropertyValue::Integer)
                .map_err(|e| invalid(&e)),
            "i8" => text
                .trim()
                .parse::<i64>()
                .map(PropertyValue::Long)
                .map_err(|e| invalid(&e)),
            "r4" => text
                .trim()
                .parse::<f32>()
                .map(PropertyValue::Float)
                .map_err(|e| invalid(&e)),
            "r8" => text
                .trim()
                .parse::<f64>()
                .map(PropertyValue::Double)
                .map_err(|e| invalid(&e)),
            "bool" => match text.trim().to_lowercase().as_str() {
                "true" | "1" => Ok(PropertyValue::Boolean(true)),
                "false" | "0" => Ok(PropertyValue::Boolean(false)),
                _ => Err(invalid(&"expected true or false")),
            },
            "filetime" => Self::parse_filetime(text.trim())
                .map(PropertyValue::DateTime)
                .ok_or_else(|| invalid(&"not a timestamp")),
            other => Ok(PropertyValue::Other {
                kind: other.to_string(),
                text: text.to_string(),
            }),
        }
    }

    /// Accept both ISO 8601 text and a raw FILETIME tick count.
    fn parse_filetime(text: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(dt.with_timezone(&Utc));
        }
        let ticks = text.parse::<i64>().ok()?;
        let unix_nanos = (ticks - WINDOWS_EPOCH_OFFSET).checked_mul(100)?;
        DateTime::from_timestamp(
            unix_nanos.div_euclid(1_000_000_000),
            unix_nanos.rem_euclid(1_000_000_000) as u32,
        )
    }
}

/// A single custom property with name, value, and internal ID.
#[derive(Debug, Clone)]
struct CustomProperty {
    /// Property name
    name: String,
    /// Property value
    value: PropertyValue,
    /// Internal property ID (pid attribute)
    pid: i32,
}

/// Collection of custom document properties.
#[derive(Debug, Clone)]
pub struct CustomProperties {
    /// Map of property names to properties
    properties: HashMap<String, CustomProperty>,
    /// Next available property ID
    next_pid: i32,
}

impl CustomProperties {
    /// Create a new empty custom properties collection.
    pub fn new() -> Self {
        Self {
            properties: HashMap::new(),
            next_pid: FIRST_PID,
        }
    }

    /// Add a new custom property.
    ///
    /// If a property with the same name already exists, its value is replaced
    /// (keeping its pid) and the old value returned.
    pub fn add_property(
        &mut self,
        name: impl Into<String>,
        value: PropertyValue,
    ) -> Option<PropertyValue> {
        let name = name.into();

        let pid = match self.properties.get(&name) {
            Some(existing) => existing.pid,
            None => {
                let pid = self.next_pid;
                self.next_pid += 1;
                pid
            },
        };

        let property = CustomProperty {
            name: name.clone(),
            value,
            pid,
        };

        self.properties.insert(name, property).map(|p| p.value)
    }

    /// Get a property value by name.
    pub fn get_property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name).map(|p| &p.value)
    }

    /// Get the pid assigned to a property.
    pub fn pid(&self, name: &str) -> Option<i32> {
        self.properties.get(name).map(|p| p.pid)
    }

    /// Remove a property by name.
    pub fn remove_property(&mut self, name: &str) -> Option<PropertyValue> {
        self.properties.remove(name).map(|p| p.value)
    }

    /// Check if a property with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Get the number of custom properties.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Check if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Get an iterator over all properties in pid order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.sorted().into_iter().map(|p| (p.name.as_str(), &p.value))
    }

    fn sorted(&self) -> Vec<&CustomProperty> {
        let mut props: Vec<_> = self.properties.values().collect();
        props.sort_by_key(|p| p.pid);
        props
    }

    /// Import the properties of `other` whose names are not present here.
    ///
    /// Imported properties get sequential pids continuing from this set's
    /// maximum, in `other`'s pid order. On a name clash this set wins.
    /// Returns how many properties were added.
    pub fn merge_from(&mut self, other: &CustomProperties) -> usize {
        let mut added = 0;
        for prop in other.sorted() {
            if self.contains(&prop.name) {
                continue;
            }
            self.add_property(prop.name.clone(), prop.value.clone());
            added += 1;
        }
        added
    }

    /// Generate the XML for `docProps/custom.xml`.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

        let mut properties_elem = BytesStart::new("Properties");
        properties_elem.push_attribute(("xmlns", namespace::OFC_CUSTOM_PROPERTIES));
        properties_elem.push_attribute(("xmlns:vt", namespace::OFC_DOC_PROPS_VTYPES));
        writer.write_event(Event::Start(properties_elem))?;

        for prop in self.sorted() {
            let mut property_elem = BytesStart::new("property");
            property_elem.push_attribute(("fmtid", FORMAT_ID));
            property_elem.push_attribute(("pid", prop.pid.to_string().as_str()));
            property_elem.push_attribute(("name", prop.name.as_str()));
            writer.write_event(Event::Start(property_elem))?;

            let value_elem_name = format!("vt:{}", prop.value.element_name());
            writer.write_event(Event::Start(BytesStart::new(value_elem_name.as_str())))?;
            let value_text = prop.value.to_xml_string();
            writer.write_event(Event::Text(BytesText::new(&value_text)))?;
            writer.write_event(Event::End(BytesEnd::new(value_elem_name.as_str())))?;

            writer.write_event(Event::End(BytesEnd::new("property")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("Properties")))?;

        let result = writer.into_inner().into_inner();
        String::from_utf8(result)
            .map_err(|e| OoxmlError::Xml(format!("Invalid UTF-8 in generated XML: {}", e)))
    }

    /// Parse custom properties from the bytes of `docProps/custom.xml`.
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let doc = XmlDocument::parse(xml)?;
        Self::from_tree(&doc)
    }

    /// Build the collection from a parsed `Properties` element.
    pub fn from_tree(doc: &XmlDocument) -> Result<Self> {
        let mut props = Self::new();
        let mut max_pid = FIRST_PID - 1;

        for property in doc.root().elements().filter(|e| e.local_name() == "property") {
            let (Some(name), Some(pid)) = (property.attr("name"), property.attr("pid")) else {
                continue;
            };
            let pid = pid.trim().parse::<i32>().map_err(|e| {
                OoxmlError::InvalidFormat(format!("Invalid pid '{}' on {}: {}", pid, name, e))
            })?;
            let Some(value_elem) = property.elements().next() else {
                continue;
            };
            let value = Self::parse_value(value_elem)?;

            max_pid = max_pid.max(pid);
            props.properties.insert(
                name.to_string(),
                CustomProperty {
                    name: name.to_string(),
                    value,
                    pid,
                },
            );
        }

        props.next_pid = max_pid + 1;
        Ok(props)
    }

    fn parse_value(elem: &XmlElement) -> Result<PropertyValue> {
        PropertyValue::from_xml_string(elem.local_name(), &elem.text())
    }
}

impl Default for CustomProperties {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the custom properties part in an OOXML package.
pub(crate) fn find_custom_properties_part(package: &OpcPackage) -> Result<Option<&dyn Part>> {
    if let Some(rel) = package.rels().optional_with_reltype(rt::CUSTOM_PROPERTIES)? {
        return Ok(Some(package.get_part(&rel.target_partname()?)?));
    }

    Ok(package
        .parts_with_content_type(ct::OFC_CUSTOM_PROPERTIES)
        .into_iter()
        .next())
}
