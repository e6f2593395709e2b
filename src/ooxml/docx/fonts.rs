/// Font table: the fonts a document declares, keyed by name.
use crate::common::xml::XmlElement;
use crate::ooxml::docx::parts::TreePart;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::PackURI;
use std::collections::HashSet;

/// A `w:font` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Font {
    name: String,
    family: Option<String>,
    charset: Option<String>,
    pitch: Option<String>,
    alt_name: Option<String>,
}

impl Font {
    /// Parse a `w:font` element. Returns `None` without `w:name`.
    pub fn from_element(e: &XmlElement, w: &str) -> Option<Self> {
        let child_val = |local: &str| {
            e.elements()
                .find(|c| c.is(w, local))
                .and_then(|c| c.attr_ns(w, "val"))
                .map(str::to_string)
        };
        Some(Self {
            name: e.attr_ns(w, "name")?.to_string(),
            family: child_val("family"),
            charset: child_val("charset"),
            pitch: child_val("pitch"),
            alt_name: child_val("altName"),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    #[inline]
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    #[inline]
    pub fn pitch(&self) -> Option<&str> {
        self.pitch.as_deref()
    }

    #[inline]
    pub fn alt_name(&self) -> Option<&str> {
        self.alt_name.as_deref()
    }
}

/// The font table part with an index of declared names.
#[derive(Debug, Clone, PartialEq)]
pub struct FontTable {
    part: TreePart,
    names: HashSet<String>,
}

impl FontTable {
    pub fn from_part(part: TreePart) -> Self {
        let w = part.w().to_string();
        let names = part
            .root()
            .elements()
            .filter(|e| e.is(&w, "font"))
            .filter_map(|e| e.attr_ns(&w, "name"))
            .map(str::to_string)
            .collect();
        Self { part, names }
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
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// `w:font` elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        let w = self.part.w();
        self.part.root().elements().filter(move |e| e.is(w, "font"))
    }

    pub fn fonts(&self) -> Vec<Font> {
        let w = self.part.w();
        self.elements()
            .filter_map(|e| Font::from_element(e, w))
            .collect()
    }

    /// Add a font declaration unless its name is already declared.
    ///
    /// Returns whether the font was added.
    pub fn add(&mut self, font: XmlElement) -> Result<bool> {
        let name = font
            .attr_ns(self.part.w(), "name")
            .ok_or_else(|| OoxmlError::InvalidFormat("font without name".to_string()))?
            .to_string();
        if !self.names.insert(name) {
            return Ok(false);
        }
        self.part.root_mut().push(font);
        Ok(true)
    }
}
