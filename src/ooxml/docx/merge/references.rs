/// In-tree references: validation before a merge, rewriting during it.
///
/// A reference is an attribute value naming something defined elsewhere: a
/// style id, a numbering instance, a note id or a relationship id. The merge
/// validates every reference the source carries before touching the target,
/// then rewrites them with the id maps built while importing definitions.
use crate::common::xml::{XmlElement, prefix_part, qualify};
use crate::ooxml::docx::document::Document;
use crate::ooxml::docx::notes::{NoteKind, is_separator_element};
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::{OpcPackage, PackURI};
use std::collections::{HashMap, HashSet};

/// Elements whose `w:val` names a style.
const STYLE_REFERENCES: &[&str] = &[
    "pStyle",
    "rStyle",
    "tblStyle",
    "basedOn",
    "next",
    "link",
    "numStyleLink",
    "styleLink",
];

/// Elements that only style definitions carry; checked leniently.
const STYLE_CHAIN_LINKS: &[&str] = &["next", "link", "numStyleLink", "styleLink"];

/// Hands out integer ids above every id already taken.
///
/// Every allocation is recorded, so no id is handed out twice.
#[derive(Debug, Clone)]
pub(crate) struct IdAllocator {
    used: HashSet<i64>,
    next: i64,
}

impl IdAllocator {
    /// Start above `max(used ∪ {floor})`.
    pub(crate) fn new(used: HashSet<i64>, floor: i64) -> Self {
        let next = used.iter().copied().fold(floor, i64::max) + 1;
        Self { used, next }
    }

    pub(crate) fn allocate(&mut self) -> i64 {
        while self.used.contains(&self.next) {
            self.next += 1;
        }
        let id = self.next;
        self.used.insert(id);
        self.next += 1;
        id
    }
}

/// Old-id to new-id maps for every reference category.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReferenceMaps {
    pub(crate) styles: HashMap<String, String>,
    pub(crate) abstract_nums: HashMap<String, String>,
    pub(crate) nums: HashMap<String, String>,
    pub(crate) pic_bullets: HashMap<String, String>,
    pub(crate) notes: HashMap<NoteKind, HashMap<i64, i64>>,
}

impl ReferenceMaps {
    /// Rewrite style, numbering and note references under `root`.
    ///
    /// Values without a mapping are left alone.
    pub(crate) fn apply(&self, root: &mut XmlElement, w: &str) {
        let val = qualify(w, "val");
        let id = qualify(w, "id");
        root.visit_mut(&mut |e: &mut XmlElement| {
            if e.prefix() != w {
                return;
            }
            let local = e.local_name();
            let rewrite = if STYLE_REFERENCES.contains(&local) {
                e.attr(&val)
                    .and_then(|v| self.styles.get(v))
                    .map(|new| (&val, new.clone()))
            } else if local == "numId" {
                e.attr(&val)
                    .and_then(|v| self.nums.get(v))
                    .map(|new| (&val, new.clone()))
            } else if local == "abstractNumId" {
                e.attr(&val)
                    .and_then(|v| self.abstract_nums.get(v))
                    .map(|new| (&val, new.clone()))
            } else if local == "lvlPicBulletId" {
                e.attr(&val)
                    .and_then(|v| self.pic_bullets.get(v))
                    .map(|new| (&val, new.clone()))
            } else {
                NoteKind::ALL
                    .iter()
                    .find(|k| k.reference_elements().contains(&local))
                    .and_then(|k| self.notes.get(k))
                    .and_then(|map| {
                        let old: i64 = e.attr(&id)?.trim().parse().ok()?;
                        map.get(&old)
                    })
                    .map(|new| (&id, new.to_string()))
            };
            if let Some((attr, value)) = rewrite {
                e.set_attr(attr.as_str(), value);
            }
        });
    }
}

/// Relationship ids referenced by attributes in the `r` namespace, distinct,
/// in document order.
pub(crate) fn relationship_ids(root: &XmlElement, r: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for e in root.descendants() {
        for (key, value) in e.attributes() {
            if prefix_part(key) == r && seen.insert(value.as_str()) {
                ids.push(value.clone());
            }
        }
    }
    ids
}

/// Rewrite relationship-id attributes through `map`.
pub(crate) fn rewrite_relationship_ids(root: &mut XmlElement, r: &str, map: &HashMap<String, String>) {
    root.visit_mut(&mut |e: &mut XmlElement| {
        for (key, value) in e.attributes_mut().iter_mut() {
            if prefix_part(key) == r {
                if let Some(new) = map.get(value.as_str()) {
                    value.clone_from(new);
                }
            }
        }
    });
}

/// Largest drawing object id (`docPr/@id`) under `root`, or 0.
pub(crate) fn max_drawing_id(root: &XmlElement) -> i64 {
    root.descendants()
        .filter(|e| e.local_name() == "docPr")
        .filter_map(|e| e.attr("id"))
        .filter_map(|v| v.trim().parse::<i64>().ok())
        .fold(0, i64::max)
}

/// Give every drawing object under `root` the next id from `next`.
pub(crate) fn renumber_drawings(root: &mut XmlElement, next: &mut i64) -> usize {
    let mut count = 0;
    root.visit_mut(&mut |e: &mut XmlElement| {
        if e.local_name() == "docPr" && e.attr("id").is_some() {
            e.set_attr("id", next.to_string());
            *next += 1;
            count += 1;
        }
    });
    count
}

/// Check that every reference in the source resolves.
///
/// Covers the body (header and footer references excepted, they are never
/// imported), every importable note and comment, `basedOn` chains between
/// styles and the template binding of each numbering instance. The first
/// unresolved reference is reported with its category, id and part.
pub(crate) fn validate_source(opc: &OpcPackage, doc: &Document) -> Result<()> {
    let main = doc.main();
    let (w, r) = (main.part().w(), main.part().r());
    let body = doc.body()?;
    check_definitions(body, w, doc, main.partname())?;
    check_relationships(opc, body, w, r, main.partname())?;

    for kind in NoteKind::ALL {
        let Some(notes) = doc.notes(kind) else {
            continue;
        };
        let (nw, nr) = (notes.part().w(), notes.part().r());
        for note in notes
            .elements()
            .filter(|e| !is_separator_element(e, kind, nw))
        {
            check_definitions(note, nw, doc, notes.partname())?;
            check_relationships(opc, note, nw, nr, notes.partname())?;
        }
    }

    if let Some(styles) = doc.styles() {
        let sw = styles.part().w();
        for style in styles.elements() {
            for based_on in style.elements().filter(|c| c.is(sw, "basedOn")) {
                let id = based_on.attr_ns(sw, "val").unwrap_or_default();
                if !styles.contains(id) {
                    return Err(OoxmlError::unresolved("style", id, styles.partname()));
                }
            }
            check_numbering_refs(style, sw, doc, styles.partname())?;
        }
    }

    if let Some(numbering) = doc.numbering() {
        let nw = numbering.part().w();
        for num in numbering.nums() {
            if !numbering.contains_abstract_num(num.abstract_num_id()) {
                return Err(OoxmlError::unresolved(
                    "abstractNum",
                    num.abstract_num_id(),
                    numbering.partname(),
                ));
            }
        }
        let nr = numbering.part().r();
        for pic_bullet in numbering.pic_bullet_elements() {
            check_relationships(opc, pic_bullet, nw, nr, numbering.partname())?;
        }
        for abstract_num in numbering.abstract_num_elements() {
            check_style_refs(abstract_num, nw, doc, numbering.partname())?;
            for level in abstract_num.descendants().filter(|e| e.is(nw, "lvlPicBulletId")) {
                let id = level.attr_ns(nw, "val").unwrap_or_default();
                if !numbering.contains_pic_bullet(id) {
                    return Err(OoxmlError::unresolved("numPicBullet", id, numbering.partname()));
                }
            }
        }
    }
    Ok(())
}

/// Style, numbering and note references in body-like content.
fn check_definitions(root: &XmlElement, w: &str, doc: &Document, part: &PackURI) -> Result<()> {
    check_style_refs(root, w, doc, part)?;
    check_numbering_refs(root, w, doc, part)?;
    for e in root.descendants().filter(|e| e.prefix() == w) {
        let Some(kind) = NoteKind::ALL
            .into_iter()
            .find(|k| k.reference_elements().contains(&e.local_name()))
        else {
            continue;
        };
        let raw = e.attr_ns(w, "id").unwrap_or_default();
        let known = raw
            .trim()
            .parse::<i64>()
            .ok()
            .zip(doc.notes(kind))
            .is_some_and(|(id, notes)| notes.contains(id));
        if !known {
            return Err(OoxmlError::unresolved(kind.category(), raw, part));
        }
    }
    Ok(())
}

fn check_style_refs(root: &XmlElement, w: &str, doc: &Document, part: &PackURI) -> Result<()> {
    for e in root.descendants().filter(|e| e.prefix() == w) {
        let local = e.local_name();
        if !STYLE_REFERENCES.contains(&local) || STYLE_CHAIN_LINKS.contains(&local) {
            continue;
        }
        // basedOn is checked per style definition
        if local == "basedOn" {
            continue;
        }
        let id = e.attr_ns(w, "val").unwrap_or_default();
        if !doc.styles().is_some_and(|s| s.contains(id)) {
            return Err(OoxmlError::unresolved("style", id, part));
        }
    }
    Ok(())
}

fn check_numbering_refs(root: &XmlElement, w: &str, doc: &Document, part: &PackURI) -> Result<()> {
    for e in root.descendants().filter(|e| e.is(w, "numId")) {
        let id = e.attr_ns(w, "val").unwrap_or_default();
        // numId 0 removes numbering
        if id == "0" {
            continue;
        }
        if !doc.numbering().is_some_and(|n| n.contains_num(id)) {
            return Err(OoxmlError::unresolved("num", id, part));
        }
    }
    Ok(())
}

/// Every relationship-id attribute resolves, and internal targets exist.
fn check_relationships(
    opc: &OpcPackage,
    root: &XmlElement,
    w: &str,
    r: &str,
    part: &PackURI,
) -> Result<()> {
    let rels = opc.get_part(part)?.rels();
    for e in root.descendants() {
        if e.is(w, "headerReference") || e.is(w, "footerReference") {
            continue;
        }
        for (key, value) in e.attributes() {
            if prefix_part(key) != r {
                continue;
            }
            let rel = rels
                .get(value)
                .ok_or_else(|| OoxmlError::unresolved("relationship", value, part))?;
            if !rel.is_external() {
                let target = rel.target_partname()?;
                if !opc.contains_part(&target) {
                    return Err(OoxmlError::unresolved("part", target.as_str(), part));
                }
            }
        }
    }
    Ok(())
}
