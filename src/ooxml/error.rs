/// Error types for OOXML operations.
use crate::common::xml::XmlError;
use thiserror::Error;

/// Result type for OOXML operations.
pub type Result<T> = std::result::Result<T, OoxmlError>;

/// Error types for OOXML operations.
#[derive(Error, Debug)]
pub enum OoxmlError {
    /// OPC package error
    #[error("OPC error: {0}")]
    Opc(#[from] crate::ooxml::opc::error::OpcError),

    /// No part carries a main document content type
    #[error("No main document part found")]
    MainPartNotFound,

    /// More than one part carries a main document content type
    #[error("Duplicate main document parts: {0} and {1}")]
    DuplicateMainPart(String, String),

    /// A required element is absent from a part
    #[error("Missing element <{element}> in {part}")]
    MissingElement { element: String, part: String },

    /// A reference that cannot be resolved against its definitions
    #[error("Unresolved {category} reference '{id}' in {part}")]
    UnresolvedReference {
        category: &'static str,
        id: String,
        part: String,
    },

    /// Invalid format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// XML parsing error
    #[error("XML error: {0}")]
    Xml(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OoxmlError {
    /// Shorthand for [`OoxmlError::MissingElement`].
    pub fn missing(element: &str, part: impl ToString) -> Self {
        OoxmlError::MissingElement {
            element: element.to_string(),
            part: part.to_string(),
        }
    }

    /// Shorthand for [`OoxmlError::UnresolvedReference`].
    pub fn unresolved(category: &'static str, id: impl Into<String>, part: impl ToString) -> Self {
        OoxmlError::UnresolvedReference {
            category,
            id: id.into(),
            part: part.to_string(),
        }
    }
}

impl From<quick_xml::Error> for OoxmlError {
    fn from(err: quick_xml::Error) -> Self {
        OoxmlError::Xml(err.to_string())
    }
}

impl From<XmlError> for OoxmlError {
    fn from(err: XmlError) -> Self {
        OoxmlError::Xml(err.to_string())
    }
}
