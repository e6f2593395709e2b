/// Header and footer slots of a Word document.
///
/// A section can reference up to three headers and three footers: one for
/// the first page, one for even pages and a default one for all other pages.
/// The assembler fills one slot per type from the `headerReference` and
/// `footerReference` elements found in the body; the first reference of a type
/// wins when several sections use different parts.
use crate::common::xml::XmlElement;
use crate::ooxml::docx::parts::TreePart;
use crate::ooxml::docx::parts::document_part::paragraph_text;
use crate::ooxml::docx::schema::{PartSpec, Schema};
use crate::ooxml::opc::PackURI;
use std::fmt;

/// Which pages a header or footer applies to.
///
/// # Examples
///
/// ```rust
/// use quire::ooxml::docx::HeaderFooterType;
///
/// assert_eq!(HeaderFooterType::Default.to_xml(), "default");
/// assert_eq!(HeaderFooterType::from_xml("even"), Some(HeaderFooterType::Even));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HeaderFooterType {
    /// Odd pages, or all pages when there is no even header/footer.
    #[default]
    Default,
    /// Even pages.
    Even,
    /// First page of the section.
    First,
}

impl HeaderFooterType {
    /// All slot types in storage order.
    pub const ALL: [HeaderFooterType; 3] = [Self::Default, Self::Even, Self::First];

    /// Convert to the `w:type` attribute value.
    #[inline]
    pub const fn to_xml(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Even => "even",
            Self::First => "first",
        }
    }

    /// Parse a `w:type` attribute value.
    ///
    /// Returns `None` if the value is not recognized.
    #[inline]
    pub fn from_xml(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Self::Default),
            "even" => Some(Self::Even),
            "first" => Some(Self::First),
            _ => None,
        }
    }

    #[inline]
    const fn index(self) -> usize {
        match self {
            Self::Default => 0,
            Self::Even => 1,
            Self::First => 2,
        }
    }
}

impl fmt::Display for HeaderFooterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "Default"),
            Self::Even => write!(f, "Even Page"),
            Self::First => write!(f, "First Page"),
        }
    }
}

/// Header or footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderFooterKind {
    Header,
    Footer,
}

impl HeaderFooterKind {
    /// Local name of the body element that references this kind.
    pub const fn reference_element(self) -> &'static str {
        match self {
            Self::Header => "headerReference",
            Self::Footer => "footerReference",
        }
    }

    /// Category name used in diagnostics.
    pub const fn category(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Footer => "footer",
        }
    }

    /// Part constants for this kind.
    pub fn spec(self, schema: &Schema) -> &PartSpec {
        match self {
            Self::Header => &schema.header,
            Self::Footer => &schema.footer,
        }
    }
}

/// A header or footer part bound to a slot.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderFooter {
    kind: HeaderFooterKind,
    slot: HeaderFooterType,
    part: TreePart,
}

impl HeaderFooter {
    pub fn new(kind: HeaderFooterKind, slot: HeaderFooterType, part: TreePart) -> Self {
        Self { kind, slot, part }
    }

    #[inline]
    pub fn kind(&self) -> HeaderFooterKind {
        self.kind
    }

    /// The slot this part fills.
    #[inline]
    pub fn header_footer_type(&self) -> HeaderFooterType {
        self.slot
    }

    #[inline]
    pub fn partname(&self) -> &PackURI {
        self.part.partname()
    }

    #[inline]
    pub fn part(&self) -> &TreePart {
        &self.part
    }

    /// The `w:hdr` / `w:ftr` root element.
    #[inline]
    pub fn root(&self) -> &XmlElement {
        self.part.root()
    }

    /// The root element, for formatting collaborators that edit in place.
    #[inline]
    pub fn root_mut(&mut self) -> &mut XmlElement {
        self.part.root_mut()
    }

    /// Plain text, one line per paragraph.
    pub fn text(&self) -> String {
        let w = self.part.w();
        self.part
            .root()
            .descendants()
            .filter(|e| e.is(w, "p"))
            .map(|p| paragraph_text(p, w))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The three slots of one kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderFooterSlots {
    slots: [Option<HeaderFooter>; 3],
}

impl HeaderFooterSlots {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, slot: HeaderFooterType) -> Option<&HeaderFooter> {
        self.slots[slot.index()].as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, slot: HeaderFooterType) -> Option<&mut HeaderFooter> {
        self.slots[slot.index()].as_mut()
    }

    #[inline]
    pub fn is_filled(&self, slot: HeaderFooterType) -> bool {
        self.slots[slot.index()].is_some()
    }

    /// Fill an empty slot. Returns `false` (and drops `part`) when the slot is
    /// already taken.
    pub fn fill(&mut self, part: HeaderFooter) -> bool {
        let slot = &mut self.slots[part.slot.index()];
        if slot.is_some() {
            return false;
        }
        *slot = Some(part);
        true
    }

    /// Filled slots in `Default`, `Even`, `First` order.
    pub fn iter(&self) -> impl Iterator<Item = &HeaderFooter> {
        self.slots.iter().flatten()
    }

    /// Filled slots, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut HeaderFooter> {
        self.slots.iter_mut().flatten()
    }

    /// Number of filled slots.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
