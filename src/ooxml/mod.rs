//! Office Open XML (OOXML) word-processing implementation.
//!
//! The implementation is based on the Open Packaging Conventions (OPC) and
//! follows the structure of the python-docx library, adapted for Rust.
//!
//! # Architecture
//!
//! The module is organized into several layers:
//!
//! 1. **OPC Layer** (`opc`): Low-level package handling (ZIP, parts, relationships)
//! 2. **Shared Types** (`custom_properties`, `error`): used by the document layer
//! 3. **Document Layer** (`docx`): the document aggregate and the merge engine
//!
//! # Example: Working with Word Documents
//!
//! ```rust,no_run
//! use quire::ooxml::docx::Package;
//!
//! // Open and read a document
//! let pkg = Package::open("document.docx")?;
//! let doc = pkg.document();
//!
//! // Extract text content
//! println!("Document contains {} paragraphs", doc.paragraph_texts()?.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub mod custom_properties;
pub mod docx;
pub mod error;
pub mod opc;

// Re-export commonly used types from OPC layer
pub use opc::{OpcPackage, PackURI};

// Re-export custom properties
pub use custom_properties::{CustomProperties, PropertyValue};

// Re-export error types
pub use error::{OoxmlError, Result};
