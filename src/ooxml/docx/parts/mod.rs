/// Parsed part wrappers for word-processing packages.
///
/// Every part the document model edits in place is held as a [`TreePart`]:
/// its partname, its parsed tree and the namespace prefixes resolved from the
/// root. [`DocumentPart`] adds the main-document accessors on top.
pub mod document_part;
pub mod tree_part;

pub use document_part::DocumentPart;
pub use tree_part::TreePart;
