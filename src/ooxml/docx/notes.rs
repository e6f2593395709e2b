/// Footnotes, endnotes and comments.
///
/// The three collections share one shape: a part whose root holds note
/// elements keyed by a numeric `w:id`, referenced from the body by
/// dedicated reference elements. Footnotes and endnotes also carry separator
/// notes (`w:type="separator"` and friends, ids -1 and 0) that belong to the
/// part rather than to any content.
use crate::common::xml::XmlElement;
use crate::ooxml::docx::parts::TreePart;
use crate::ooxml::docx::parts::document_part::paragraph_text;
use crate::ooxml::docx::schema::{PartSpec, Schema};
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::PackURI;
use std::collections::HashSet;

/// Which note collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteKind {
    Footnote,
    Endnote,
    Comment,
}

impl NoteKind {
    pub const ALL: [NoteKind; 3] = [Self::Footnote, Self::Endnote, Self::Comment];

    /// Local name of a note element.
    pub const fn element(self) -> &'static str {
        match self {
            Self::Footnote => "footnote",
            Self::Endnote => "endnote",
            Self::Comment => "comment",
        }
    }

    /// Local names of the body elements whose `w:id` points at a note.
    pub const fn reference_elements(self) -> &'static [&'static str] {
        match self {
            Self::Footnote => &["footnoteReference"],
            Self::Endnote => &["endnoteReference"],
            Self::Comment => &["commentRangeStart", "commentRangeEnd", "commentReference"],
        }
    }

    /// Category name used in diagnostics.
    pub const fn category(self) -> &'static str {
        self.element()
    }

    /// Highest id that never names imported content. New ids start above it.
    pub const fn floor(self) -> i64 {
        match self {
            Self::Footnote | Self::Endnote => 0,
            Self::Comment => -1,
        }
    }

    /// Part constants for this kind.
    pub fn spec(self, schema: &Schema) -> &PartSpec {
        match self {
            Self::Footnote => &schema.footnotes,
            Self::Endnote => &schema.endnotes,
            Self::Comment => &schema.comments,
        }
    }
}

/// A footnote, endnote or comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    id: i64,
    kind: NoteKind,
    note_type: Option<String>,
    author: Option<String>,
    text: String,
}

impl Note {
    /// Parse a note element. Returns `None` when `w:id` is missing or not numeric.
    pub fn from_element(e: &XmlElement, kind: NoteKind, w: &str) -> Option<Self> {
        let text = e
            .descendants()
            .filter(|p| p.is(w, "p"))
            .map(|p| paragraph_text(p, w))
            .collect::<Vec<_>>()
            .join("\n");
        Some(Self {
            id: e.attr_ns(w, "id")?.trim().parse().ok()?,
            kind,
            note_type: e.attr_ns(w, "type").map(str::to_string),
            author: e.attr_ns(w, "author").map(str::to_string),
            text,
        })
    }

    #[inline]
    pub fn id(&self) -> i64 {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> NoteKind {
        self.kind
    }

    /// `w:type` (separator, continuationSeparator, continuationNotice).
    #[inline]
    pub fn note_type(&self) -> Option<&str> {
        self.note_type.as_deref()
    }

    /// Comment author.
    #[inline]
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Whether this note is part furniture rather than content.
    pub fn is_separator(&self) -> bool {
        self.kind != NoteKind::Comment && (self.id <= 0 || self.note_type.is_some())
    }

    /// Plain text, one line per paragraph.
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Separator test on a raw element, for callers that have not parsed it.
pub(crate) fn is_separator_element(e: &XmlElement, kind: NoteKind, w: &str) -> bool {
    if kind == NoteKind::Comment {
        return false;
    }
    let id = e.attr_ns(w, "id").and_then(|v| v.trim().parse::<i64>().ok());
    e.attr_ns(w, "type").is_some() || id.is_none_or(|id| id <= 0)
}

/// A note part with an index of its ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Notes {
    kind: NoteKind,
    part: TreePart,
    ids: HashSet<i64>,
}

impl Notes {
    /// Index a parsed notes part.
    pub fn from_part(kind: NoteKind, part: TreePart) -> Self {
        let w = part.w().to_string();
        let ids = part
            .root()
            .elements()
            .filter(|e| e.is(&w, kind.element()))
            .filter_map(|e| e.attr_ns(&w, "id"))
            .filter_map(|v| v.trim().parse().ok())
            .collect();
        Self { kind, part, ids }
    }

    #[inline]
    pub fn kind(&self) -> NoteKind {
        self.kind
    }

    #[inline]
    pub fn partname(&self) -> &PackURI {
        self.part.partname()
    }

    #[inline]
    pub fn part(&self) -> &TreePart {
        &self.part
    }

    #[inline]
    pub(crate) fn part_mut(&mut self) -> &mut TreePart {
        &mut self.part
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    /// Note elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        let w = self.part.w();
        let local = self.kind.element();
        self.part.root().elements().filter(move |e| e.is(w, local))
    }

    /// All notes, separators included.
    pub fn notes(&self) -> Vec<Note> {
        let w = self.part.w();
        self.elements()
            .filter_map(|e| Note::from_element(e, self.kind, w))
            .collect()
    }

    /// Get a note by id.
    pub fn get(&self, id: i64) -> Option<Note> {
        if !self.contains(id) {
            return None;
        }
        self.notes().into_iter().find(|n| n.id() == id)
    }

    /// Largest id in use, or the category floor for an empty collection.
    pub fn max_id(&self) -> i64 {
        self.ids
            .iter()
            .copied()
            .max()
            .unwrap_or(self.kind.floor())
            .max(self.kind.floor())
    }

    /// Append a note. Its id must be numeric and not taken.
    pub fn push(&mut self, note: XmlElement) -> Result<()> {
        let w = self.part.w();
        let id: i64 = note
            .attr_ns(w, "id")
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(|| {
                OoxmlError::InvalidFormat(format!("{} without numeric id", self.kind.element()))
            })?;
        if !self.ids.insert(id) {
            return Err(OoxmlError::InvalidFormat(format!(
                "{} {} already defined in {}",
                self.kind.element(),
                id,
                self.partname()
            )));
        }
        self.part.root_mut().push(note);
        Ok(())
    }
}
