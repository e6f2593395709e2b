/// Open Packaging Conventions (OPC) implementation.
///
/// This module provides the package layer underneath word-processing documents:
///
/// - Package structure (parts, relationships)
/// - Content type management
/// - ZIP-based physical packaging
///
/// Parts are held in memory once loaded; relationship ids are allocated as
/// `rId{max + 1}` so identifiers are never reused within a source part.
pub mod constants;
pub mod content_types;
pub mod error;
pub mod package;
pub mod packuri;
pub mod part;
pub mod phys_pkg;
pub mod pkgreader;
pub mod pkgwriter;
pub mod rel;

// Re-export commonly used types
pub use content_types::ContentTypes;
pub use error::{OpcError, Result};
pub use package::OpcPackage;
pub use packuri::PackURI;
pub use part::{BlobPart, Part, PartFactory, XmlPart};
pub use pkgwriter::PackageWriter;
pub use rel::{Relationship, Relationships, TargetMode};
