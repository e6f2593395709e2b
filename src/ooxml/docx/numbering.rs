/// Numbering definitions: abstract numbering templates and the instances
/// that bind body paragraphs to them.
///
/// `w:abstractNum` elements are templates keyed by `w:abstractNumId`;
/// `w:num` elements are instances keyed by `w:numId` that point at a template
/// and may override individual levels. Body paragraphs reference instances
/// through `w:numPr/w:numId`. Picture bullets (`w:numPicBullet`, keyed by
/// `w:numPicBulletId`) come first and are referenced from template levels
/// through `w:lvlPicBulletId`. The part schema requires picture bullets,
/// then templates, then instances, so insertions keep that order.
use crate::common::xml::XmlElement;
use crate::ooxml::docx::parts::TreePart;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::PackURI;
use std::collections::HashSet;

/// An abstract numbering definition (template).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbstractNum {
    /// Abstract numbering ID
    id: String,
    /// Multi-level type (e.g., "hybridMultilevel")
    multi_level_type: Option<String>,
    /// Numbering style this template defines
    style_link: Option<String>,
    /// Numbering style whose template this one defers to
    num_style_link: Option<String>,
    /// Number of `w:lvl` children
    level_count: usize,
}

impl AbstractNum {
    /// Parse a `w:abstractNum` element.
    pub fn from_element(e: &XmlElement, w: &str) -> Option<Self> {
        let child_val = |local: &str| {
            e.elements()
                .find(|c| c.is(w, local))
                .and_then(|c| c.attr_ns(w, "val"))
                .map(str::to_string)
        };
        Some(Self {
            id: e.attr_ns(w, "abstractNumId")?.to_string(),
            multi_level_type: child_val("multiLevelType"),
            style_link: child_val("styleLink"),
            num_style_link: child_val("numStyleLink"),
            level_count: e.elements().filter(|c| c.is(w, "lvl")).count(),
        })
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn multi_level_type(&self) -> Option<&str> {
        self.multi_level_type.as_deref()
    }

    #[inline]
    pub fn style_link(&self) -> Option<&str> {
        self.style_link.as_deref()
    }

    #[inline]
    pub fn num_style_link(&self) -> Option<&str> {
        self.num_style_link.as_deref()
    }

    #[inline]
    pub fn level_count(&self) -> usize {
        self.level_count
    }
}

/// A numbering instance (concrete use of an abstract numbering).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Num {
    /// Numbering ID
    id: String,
    /// Reference to abstract numbering ID
    abstract_num_id: String,
    /// Levels overridden by `w:lvlOverride`
    overridden_levels: Vec<u8>,
}

impl Num {
    /// Parse a `w:num` element. Returns `None` without `numId` or `abstractNumId`.
    pub fn from_element(e: &XmlElement, w: &str) -> Option<Self> {
        let abstract_num_id = e
            .elements()
            .find(|c| c.is(w, "abstractNumId"))
            .and_then(|c| c.attr_ns(w, "val"))?
            .to_string();
        let overridden_levels = e
            .elements()
            .filter(|c| c.is(w, "lvlOverride"))
            .filter_map(|c| c.attr_ns(w, "ilvl"))
            .filter_map(|v| v.parse().ok())
            .collect();
        Some(Self {
            id: e.attr_ns(w, "numId")?.to_string(),
            abstract_num_id,
            overridden_levels,
        })
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn abstract_num_id(&self) -> &str {
        &self.abstract_num_id
    }

    #[inline]
    pub fn overridden_levels(&self) -> &[u8] {
        &self.overridden_levels
    }
}

/// The numbering part with indexes of its template and instance ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Numbering {
    part: TreePart,
    pic_bullet_ids: HashSet<String>,
    abstract_ids: HashSet<String>,
    num_ids: HashSet<String>,
}

impl Numbering {
    /// Index a parsed numbering part.
    pub fn from_part(part: TreePart) -> Self {
        let w = part.w().to_string();
        let mut pic_bullet_ids = HashSet::new();
        let mut abstract_ids = HashSet::new();
        let mut num_ids = HashSet::new();
        for e in part.root().elements() {
            if e.is(&w, "numPicBullet") {
                if let Some(id) = e.attr_ns(&w, "numPicBulletId") {
                    pic_bullet_ids.insert(id.to_string());
                }
            } else if e.is(&w, "abstractNum") {
                if let Some(id) = e.attr_ns(&w, "abstractNumId") {
                    abstract_ids.insert(id.to_string());
                }
            } else if e.is(&w, "num") {
                if let Some(id) = e.attr_ns(&w, "numId") {
                    num_ids.insert(id.to_string());
                }
            }
        }
        Self {
            part,
            pic_bullet_ids,
            abstract_ids,
            num_ids,
        }
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

    /// Number of abstract numbering definitions.
    #[inline]
    pub fn abstract_num_count(&self) -> usize {
        self.abstract_ids.len()
    }

    /// Number of numbering instances.
    #[inline]
    pub fn num_count(&self) -> usize {
        self.num_ids.len()
    }

    #[inline]
    pub fn contains_pic_bullet(&self, id: &str) -> bool {
        self.pic_bullet_ids.contains(id)
    }

    #[inline]
    pub fn contains_abstract_num(&self, id: &str) -> bool {
        self.abstract_ids.contains(id)
    }

    #[inline]
    pub fn contains_num(&self, id: &str) -> bool {
        self.num_ids.contains(id)
    }

    /// `w:numPicBullet` elements in document order.
    pub fn pic_bullet_elements(&self) -> impl Iterator<Item = &XmlElement> {
        let w = self.part.w();
        self.part.root().elements().filter(move |e| e.is(w, "numPicBullet"))
    }

    /// `w:abstractNum` elements in document order.
    pub fn abstract_num_elements(&self) -> impl Iterator<Item = &XmlElement> {
        let w = self.part.w();
        self.part.root().elements().filter(move |e| e.is(w, "abstractNum"))
    }

    /// `w:num` elements in document order.
    pub fn num_elements(&self) -> impl Iterator<Item = &XmlElement> {
        let w = self.part.w();
        self.part.root().elements().filter(move |e| e.is(w, "num"))
    }

    pub fn abstract_nums(&self) -> Vec<AbstractNum> {
        let w = self.part.w();
        self.abstract_num_elements()
            .filter_map(|e| AbstractNum::from_element(e, w))
            .collect()
    }

    pub fn nums(&self) -> Vec<Num> {
        let w = self.part.w();
        self.num_elements()
            .filter_map(|e| Num::from_element(e, w))
            .collect()
    }

    /// Look up an instance by id.
    pub fn num(&self, id: &str) -> Option<Num> {
        if !self.contains_num(id) {
            return None;
        }
        self.nums().into_iter().find(|n| n.id() == id)
    }

    /// Numeric picture bullet ids in use.
    pub fn used_pic_bullet_ids(&self) -> HashSet<i64> {
        self.pic_bullet_ids.iter().filter_map(|s| s.parse().ok()).collect()
    }

    /// Numeric abstract numbering ids in use.
    pub fn used_abstract_num_ids(&self) -> HashSet<i64> {
        self.abstract_ids.iter().filter_map(|s| s.parse().ok()).collect()
    }

    /// Numeric instance ids in use.
    pub fn used_num_ids(&self) -> HashSet<i64> {
        self.num_ids.iter().filter_map(|s| s.parse().ok()).collect()
    }

    /// Insert a picture bullet after the existing ones, ahead of every template.
    pub fn insert_pic_bullet(&mut self, element: XmlElement) -> Result<()> {
        let w = self.part.w().to_string();
        let id = required_id(&element, &w, "numPicBulletId")?;
        if !self.pic_bullet_ids.insert(id.clone()) {
            return Err(OoxmlError::InvalidFormat(format!(
                "numPicBullet '{}' already defined in {}",
                id,
                self.partname()
            )));
        }
        let root = self.part.root_mut();
        if root.elements().any(|e| e.is(&w, "numPicBullet")) {
            root.insert_after_last(|e| e.is(&w, "numPicBullet"), element);
        } else {
            root.insert_before_first(
                |e| e.is(&w, "abstractNum") || e.is(&w, "num") || e.is(&w, "numIdMacAtCleanup"),
                element,
            );
        }
        Ok(())
    }

    /// Insert a template after the existing templates.
    pub fn insert_abstract_num(&mut self, element: XmlElement) -> Result<()> {
        let w = self.part.w().to_string();
        let id = required_id(&element, &w, "abstractNumId")?;
        if !self.abstract_ids.insert(id.clone()) {
            return Err(OoxmlError::InvalidFormat(format!(
                "abstractNum '{}' already defined in {}",
                id,
                self.partname()
            )));
        }
        let root = self.part.root_mut();
        if root.elements().any(|e| e.is(&w, "abstractNum")) {
            root.insert_after_last(|e| e.is(&w, "abstractNum"), element);
        } else {
            root.insert_before_first(
                |e| e.is(&w, "num") || e.is(&w, "numIdMacAtCleanup"),
                element,
            );
        }
        Ok(())
    }

    /// Insert an instance after the existing instances.
    pub fn insert_num(&mut self, element: XmlElement) -> Result<()> {
        let w = self.part.w().to_string();
        let id = required_id(&element, &w, "numId")?;
        if !self.num_ids.insert(id.clone()) {
            return Err(OoxmlError::InvalidFormat(format!(
                "num '{}' already defined in {}",
                id,
                self.partname()
            )));
        }
        self.part
            .root_mut()
            .insert_before_first(|e| e.is(&w, "numIdMacAtCleanup"), element);
        Ok(())
    }
}

fn required_id(element: &XmlElement, w: &str, attr: &str) -> Result<String> {
    element
        .attr_ns(w, attr)
        .map(str::to_string)
        .ok_or_else(|| OoxmlError::InvalidFormat(format!("<{}> without {}", element.name(), attr)))
}
