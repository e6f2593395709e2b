//! Quire - Office Open XML word-processing packages in Rust
//!
//! This library loads `.docx` / `.dotx` packages into an addressable part
//! graph, exposes the document aggregate built from it, and merges the
//! content of one document into another while keeping every reference
//! between parts resolvable.
//!
//! # Features
//!
//! - **OPC layer**: parts, typed relationships and the content-types table,
//!   read from and written to the ZIP container exactly
//! - **Document aggregate**: main body, header/footer slots, styles,
//!   numbering, font table, footnotes, endnotes, comments, settings and
//!   custom properties, parsed once and edited in place
//! - **Merge engine**: splices a source body into a target, remapping style,
//!   numbering, note and relationship ids and deduplicating identical styles
//!   and images
//!
//! # Example - Reading a DOCX file
//!
//! ```no_run
//! use quire::ooxml::docx::Package;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pkg = Package::open("document.docx")?;
//! let doc = pkg.document();
//!
//! // Extract all text
//! println!("Document text: {}", doc.text()?);
//!
//! // Inspect definitions
//! if let Some(styles) = doc.styles() {
//!     for style in styles.iter() {
//!         println!("{} ({})", style.style_id(), style.style_type());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Merging documents
//!
//! ```no_run
//! use quire::ooxml::docx::{MergeOptions, Package};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut target = Package::open("report.docx")?;
//! let source = Package::open("appendix.docx")?;
//!
//! let report = target.insert_document(&source, MergeOptions::append())?;
//! println!(
//!     "{} blocks, {} styles added, {} reused",
//!     report.blocks_inserted, report.styles_added, report.styles_reused
//! );
//! target.save("report-with-appendix.docx")?;
//! # Ok(())
//! # }
//! ```

/// Helpers shared by every part parser: the XML tree and identifier generation.
pub mod common;

/// OOXML (Office Open XML) package and word-processing support
///
/// This module provides the OPC package layer and the `.docx` document model
/// built on top of it.
pub mod ooxml;

// Re-export commonly used types for convenience
pub use ooxml::docx::{Document, MergeOptions, MergeReport, Package};
pub use ooxml::{OoxmlError, Result};
