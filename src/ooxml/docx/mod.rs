/// Word-processing (.docx / .dotx) document support.
///
/// This module loads a package into a document aggregate, lets callers edit
/// the parsed parts in place, and merges the content of one document into
/// another.
///
/// # Architecture
///
/// The module is organized around these key types:
/// - `Package`: the package on disk plus the assembled document
/// - `Document`: the aggregate over the main body, header/footer slots,
///   styles, numbering, font table, notes, settings and custom properties
/// - `Schema`: the content types, relationship types and namespaces of a
///   document or template profile
/// - `MergeOptions` / `MergeReport`: input and outcome of
///   [`Package::insert_document`]
///
/// # Example
///
/// ```rust,no_run
/// use quire::ooxml::docx::{MergeOptions, Package};
///
/// let mut contract = Package::open("contract.docx")?;
/// let schedule = Package::open("schedule.docx")?;
/// contract.insert_document(&schedule, MergeOptions::append())?;
///
/// for text in contract.document().paragraph_texts()? {
///     println!("{text}");
/// }
/// contract.save("contract-with-schedule.docx")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub mod document;
pub mod fonts;
pub mod format;
pub mod header_footer;
pub mod image;
pub mod merge;
pub mod notes;
pub mod numbering;
pub mod package;
pub mod parts;
pub mod schema;
pub mod settings;
pub mod styles;
pub mod template;

#[cfg(test)]
mod testing;

pub use document::Document;
pub use fonts::{Font, FontTable};
pub use format::ImageFormat;
pub use header_footer::{HeaderFooter, HeaderFooterKind, HeaderFooterType};
pub use merge::{InsertPosition, MergeOptions, MergeReport};
pub use notes::{Note, NoteKind, Notes};
pub use numbering::{AbstractNum, Num, Numbering};
pub use package::Package;
pub use schema::{Profile, Schema};
pub use settings::{DocumentProtection, PasswordHash, ProtectionType, Settings};
pub use styles::{Style, StyleType, Styles};
