/// Merge engine: splice the body of one document into another.
///
/// The source document is validated first, then merged category by category
/// into clones of the target package and aggregate; the clones replace the
/// target only when every step succeeded, so a failed merge leaves the
/// target as it was. The source is never modified.
///
/// Per category:
///
/// - header and footer references are stripped from the source body, and its
///   trailing section properties are dropped; merged content runs under the
///   target's sections
/// - fonts are added by name
/// - styles are matched by content: a source style identical to a target
///   style (ignoring its id and whitespace) reuses the target id, any other
///   style is imported under an id derived from its content
/// - picture bullets, abstract numberings and numbering instances get fresh
///   ids; bullet images come along with the picture bullets
/// - footnotes, endnotes and comments are renumbered above the target's ids
/// - every other part the source body relates to is imported; images are
///   matched by content hash
/// - drawing object ids continue after the target's highest id
///
/// Every reference in the imported content is rewritten to the new ids.
///
/// # Examples
///
/// ```rust,no_run
/// use quire::ooxml::docx::{MergeOptions, Package};
///
/// let mut report = Package::open("report.docx")?;
/// let appendix = Package::open("appendix.docx")?;
/// let summary = report.insert_document(&appendix, MergeOptions::append())?;
/// println!("{} blocks, {} styles imported", summary.blocks_inserted, summary.styles_added);
/// report.save("combined.docx")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
mod parts;
mod references;

use self::parts::PartImporter;
use self::references::{
    IdAllocator, ReferenceMaps, max_drawing_id, relationship_ids, renumber_drawings,
    rewrite_relationship_ids, validate_source,
};
use crate::common::id::{format_guid, generate_rsid, guid_from_content};
use crate::common::xml::{XmlElement, XmlNode, local_part, prefix_part, qualify};
use crate::ooxml::custom_properties::CustomProperties;
use crate::ooxml::docx::document::{Document, create_related_part, free_partname};
use crate::ooxml::docx::fonts::FontTable;
use crate::ooxml::docx::notes::{NoteKind, Notes, is_separator_element};
use crate::ooxml::docx::numbering::Numbering;
use crate::ooxml::docx::styles::{Styles, content_key};
use crate::ooxml::error::Result;
use crate::ooxml::opc::part::XmlPart;
use crate::ooxml::opc::{OpcPackage, PackURI};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Where the source content goes in the target body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertPosition {
    /// After the target's content, before its final section properties.
    #[default]
    Append,
    /// Before the target's content.
    Prepend,
}

/// Options for [`Package::insert_document`](crate::ooxml::docx::Package::insert_document).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOptions {
    pub position: InsertPosition,
}

impl MergeOptions {
    pub fn append() -> Self {
        Self {
            position: InsertPosition::Append,
        }
    }

    pub fn prepend() -> Self {
        Self {
            position: InsertPosition::Prepend,
        }
    }
}

/// What a merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Top-level body elements spliced into the target.
    pub blocks_inserted: usize,
    pub header_footer_references_removed: usize,
    pub styles_added: usize,
    pub styles_reused: usize,
    pub pic_bullets_added: usize,
    pub abstract_nums_added: usize,
    pub nums_added: usize,
    pub fonts_added: usize,
    pub footnotes_added: usize,
    pub endnotes_added: usize,
    pub comments_added: usize,
    pub properties_added: usize,
    /// Category parts the target lacked and the merge created.
    pub parts_created: usize,
    pub parts_copied: usize,
    /// Source parts found byte-identical under the same name in the target.
    pub parts_shared: usize,
    pub images_added: usize,
    pub images_reused: usize,
    pub relationships_mapped: usize,
    pub drawings_renumbered: usize,
    pub orphan_images_skipped: usize,
}

/// Merge `source` into `target`.
///
/// Nothing is written to `target_opc` or `target` unless the whole merge succeeds.
pub(crate) fn insert_document(
    target_opc: &mut OpcPackage,
    target: &mut Document,
    source_opc: &OpcPackage,
    source: &Document,
    options: MergeOptions,
) -> Result<MergeReport> {
    validate_source(source_opc, source)?;

    let mut opc = target_opc.clone();
    let mut doc = target.clone();
    let report = Merge {
        opc: &mut opc,
        doc: &mut doc,
        source_opc,
        source: source.clone(),
        options,
        maps: ReferenceMaps::default(),
        report: MergeReport::default(),
    }
    .run()?;

    *target_opc = opc;
    *target = doc;
    info!(
        blocks = report.blocks_inserted,
        styles_added = report.styles_added,
        styles_reused = report.styles_reused,
        nums = report.nums_added,
        footnotes = report.footnotes_added,
        endnotes = report.endnotes_added,
        comments = report.comments_added,
        parts = report.parts_copied,
        images_reused = report.images_reused,
        "merged document"
    );
    Ok(report)
}

/// One merge in progress. Works on the target clones and a source clone.
struct Merge<'a> {
    opc: &'a mut OpcPackage,
    doc: &'a mut Document,
    source_opc: &'a OpcPackage,
    source: Document,
    options: MergeOptions,
    maps: ReferenceMaps,
    report: MergeReport,
}

type PreparedNotes = Vec<(NoteKind, Vec<XmlElement>)>;

impl Merge<'_> {
    fn run(mut self) -> Result<MergeReport> {
        self.create_missing_parts()?;
        self.align_prefixes();
        self.strip_sections()?;

        let mut importer = PartImporter::new(self.opc, *self.doc.schema(), self.shared_parts());

        self.merge_fonts()?;
        self.map_numbering();
        let styles = self.map_styles();
        self.import_styles(styles)?;
        self.import_numbering(&mut importer)?;
        self.map_notes();

        let mut notes = self.prepare_notes(&mut importer)?;
        self.prepare_body(&mut importer)?;
        self.renumber_drawing_objects(&mut notes)?;
        self.push_notes(notes)?;

        self.merge_custom_properties();
        self.merge_root_attributes();
        self.splice()?;

        let stats = importer.stats();
        self.report.parts_copied = stats.parts_copied;
        self.report.parts_shared = stats.parts_shared;
        self.report.images_added = stats.images_added;
        self.report.images_reused = stats.images_reused;
        self.report.relationships_mapped = stats.relationships_mapped;
        self.report.orphan_images_skipped = importer.skip_orphan_images(self.source_opc);
        Ok(self.report)
    }

    /// Give the target an empty part for each category only the source has.
    fn create_missing_parts(&mut self) -> Result<()> {
        let schema = *self.doc.schema();
        let main = self.doc.main().partname().clone();

        if self.doc.styles().is_none() {
            if let Some(src) = self.source.styles() {
                let root = root_shell(src.part().root());
                let part = create_related_part(self.opc, &main, &schema.styles, root, &schema)?;
                self.doc.set_styles(Styles::from_part(part));
                self.report.parts_created += 1;
            }
        }
        if self.doc.numbering().is_none() {
            if let Some(src) = self.source.numbering() {
                let root = root_shell(src.part().root());
                let part = create_related_part(self.opc, &main, &schema.numbering, root, &schema)?;
                self.doc.set_numbering(Numbering::from_part(part));
                self.report.parts_created += 1;
            }
        }
        if self.doc.font_table().is_none() {
            if let Some(src) = self.source.font_table() {
                let root = root_shell(src.part().root());
                let part = create_related_part(self.opc, &main, &schema.font_table, root, &schema)?;
                self.doc.set_font_table(FontTable::from_part(part));
                self.report.parts_created += 1;
            }
        }
        for kind in NoteKind::ALL {
            if self.doc.notes(kind).is_some() {
                continue;
            }
            let Some(src) = self.source.notes(kind) else {
                continue;
            };
            let w = src.part().w();
            let mut root = root_shell(src.part().root());
            for separator in src.elements().filter(|e| is_separator_element(e, kind, w)) {
                root.push(separator.clone());
            }
            let part = create_related_part(self.opc, &main, kind.spec(&schema), root, &schema)?;
            self.doc.set_notes(Notes::from_part(kind, part));
            self.report.parts_created += 1;
        }

        if self.doc.custom_properties().is_none() && self.source.custom_properties().is_some() {
            let spec = &schema.custom_properties;
            let partname = free_partname(self.opc, spec.partname)?;
            let props = CustomProperties::new();
            self.opc.add_part(Box::new(XmlPart::new(
                partname.clone(),
                spec.content_type.to_string(),
                props.to_xml()?.into_bytes(),
            )));
            self.opc.relate_to(&partname, spec.reltype);
            self.doc.set_custom_properties(partname, props);
            self.report.parts_created += 1;
        }
        Ok(())
    }

    /// Bind the source trees to the prefixes the matching target parts use.
    fn align_prefixes(&mut self) {
        self.source
            .main_mut()
            .part_mut()
            .align_prefixes(self.doc.main().part());
        if let (Some(src), Some(dst)) = (self.source.styles_mut(), self.doc.styles()) {
            src.part_mut().align_prefixes(dst.part());
        }
        if let (Some(src), Some(dst)) = (self.source.numbering_mut(), self.doc.numbering()) {
            src.part_mut().align_prefixes(dst.part());
        }
        if let (Some(src), Some(dst)) = (self.source.font_table_mut(), self.doc.font_table()) {
            src.part_mut().align_prefixes(dst.part());
        }
        for kind in NoteKind::ALL {
            if let (Some(src), Some(dst)) = (self.source.notes_mut(kind), self.doc.notes(kind)) {
                src.part_mut().align_prefixes(dst.part());
            }
        }
    }

    /// Drop header/footer references and the trailing section properties.
    fn strip_sections(&mut self) -> Result<()> {
        if let Some(index) = self.source.main().trailing_sect_pr_index()? {
            self.source.body_mut()?.children_mut().remove(index);
        }
        let w = self.source.main().part().w().to_string();
        let removed = self.source.body_mut()?.remove_descendants(&mut |e| {
            e.is(&w, "headerReference") || e.is(&w, "footerReference")
        });
        if removed > 0 {
            debug!(removed, "stripped header/footer references");
        }
        self.report.header_footer_references_removed = removed;
        Ok(())
    }

    /// Source parts that already have a counterpart in the target.
    fn shared_parts(&self) -> Vec<(PackURI, PackURI)> {
        let (src, dst) = (&self.source, &*self.doc);
        let mut shared = vec![(src.main().partname().clone(), dst.main().partname().clone())];
        let pairs = [
            (src.styles().map(Styles::partname), dst.styles().map(Styles::partname)),
            (src.numbering().map(Numbering::partname), dst.numbering().map(Numbering::partname)),
            (src.font_table().map(FontTable::partname), dst.font_table().map(FontTable::partname)),
            (src.settings().map(|s| s.partname()), dst.settings().map(|s| s.partname())),
        ];
        let notes = NoteKind::ALL.map(|k| {
            (src.notes(k).map(Notes::partname), dst.notes(k).map(Notes::partname))
        });
        for (from, to) in pairs.into_iter().chain(notes) {
            if let (Some(from), Some(to)) = (from, to) {
                shared.push((from.clone(), to.clone()));
            }
        }
        shared
    }

    fn merge_fonts(&mut self) -> Result<()> {
        let (Some(src), Some(dst)) = (self.source.font_table(), self.doc.font_table_mut()) else {
            return Ok(());
        };
        for font in src.elements() {
            if dst.add(font.clone())? {
                self.report.fonts_added += 1;
            }
        }
        debug!(added = self.report.fonts_added, "merged fonts");
        Ok(())
    }

    /// Allocate target ids for every source picture bullet, abstract
    /// numbering and instance.
    fn map_numbering(&mut self) {
        let (Some(src), Some(dst)) = (self.source.numbering(), self.doc.numbering()) else {
            return;
        };
        let w = src.part().w();
        let mut pic_bullets = IdAllocator::new(dst.used_pic_bullet_ids(), -1);
        for pic_bullet in src.pic_bullet_elements() {
            if let Some(old) = pic_bullet.attr_ns(w, "numPicBulletId") {
                self.maps
                    .pic_bullets
                    .entry(old.to_string())
                    .or_insert_with(|| pic_bullets.allocate().to_string());
            }
        }
        let mut abstracts = IdAllocator::new(dst.used_abstract_num_ids(), 0);
        let mut nums = IdAllocator::new(dst.used_num_ids(), 0);
        for abstract_num in src.abstract_nums() {
            self.maps
                .abstract_nums
                .entry(abstract_num.id().to_string())
                .or_insert_with(|| abstracts.allocate().to_string());
        }
        for num in src.nums() {
            self.maps
                .nums
                .entry(num.id().to_string())
                .or_insert_with(|| nums.allocate().to_string());
        }
    }

    /// Map every source style id to a target id. Returns the definitions
    /// that have no identical counterpart in the target.
    fn map_styles(&mut self) -> Vec<XmlElement> {
        let (Some(src), Some(dst)) = (self.source.styles(), self.doc.styles()) else {
            return Vec::new();
        };
        let w = src.part().w();
        let mut keys = dst.content_keys();
        let mut imports = Vec::new();
        for style in src.elements() {
            let Some(old) = style.attr_ns(w, "styleId") else {
                continue;
            };
            if self.maps.styles.contains_key(old) {
                continue;
            }
            let key = content_key(style, w);
            let new = match keys.get(&key) {
                Some(existing) => {
                    self.report.styles_reused += 1;
                    existing.clone()
                },
                None => {
                    let id = mint_style_id(&key, |id| dst.contains(id));
                    keys.insert(key, id.clone());
                    imports.push(style.clone());
                    id
                },
            };
            self.maps.styles.insert(old.to_string(), new);
        }
        imports
    }

    fn import_styles(&mut self, imports: Vec<XmlElement>) -> Result<()> {
        let Some(dst) = self.doc.styles_mut() else {
            return Ok(());
        };
        let w = dst.part().w().to_string();
        let id_attr = qualify(&w, "styleId");
        let default_attr = qualify(&w, "default");
        for mut style in imports {
            let Some(new_id) = style
                .attr(&id_attr)
                .and_then(|old| self.maps.styles.get(old))
                .cloned()
            else {
                continue;
            };
            style.set_attr(id_attr.as_str(), new_id);
            style.remove_attr(&default_attr);
            drop_dangling_links(&mut style, &w, &self.maps.styles);
            self.maps.apply(&mut style, &w);
            dst.add(style)?;
            self.report.styles_added += 1;
        }
        debug!(
            added = self.report.styles_added,
            reused = self.report.styles_reused,
            "merged styles"
        );
        Ok(())
    }

    fn import_numbering(&mut self, importer: &mut PartImporter) -> Result<()> {
        let (Some(src), Some(dst)) = (self.source.numbering(), self.doc.numbering_mut()) else {
            return Ok(());
        };
        let w = dst.part().w().to_string();
        let r = src.part().r().to_string();
        let pic_bullet_attr = qualify(&w, "numPicBulletId");
        let abstract_attr = qualify(&w, "abstractNumId");
        let num_attr = qualify(&w, "numId");
        let mut nsids: HashSet<String> = dst
            .abstract_num_elements()
            .filter_map(|e| nsid(e, &w))
            .map(str::to_string)
            .collect();

        let mut seen = HashSet::new();
        for element in src.pic_bullet_elements() {
            let Some(new_id) = element
                .attr(&pic_bullet_attr)
                .and_then(|old| self.maps.pic_bullets.get(old))
            else {
                continue;
            };
            if !seen.insert(new_id.clone()) {
                continue;
            }
            let mut pic_bullet = element.clone();
            pic_bullet.set_attr(pic_bullet_attr.as_str(), new_id.clone());
            rehome_relationships(
                &mut pic_bullet,
                &r,
                self.opc,
                self.source_opc,
                src.partname(),
                dst.partname(),
                importer,
            )?;
            dst.insert_pic_bullet(pic_bullet)?;
            self.report.pic_bullets_added += 1;
        }

        seen.clear();
        for element in src.abstract_num_elements() {
            let Some(new_id) = element
                .attr(&abstract_attr)
                .and_then(|old| self.maps.abstract_nums.get(old))
            else {
                continue;
            };
            if !seen.insert(new_id.clone()) {
                continue;
            }
            let mut abstract_num = element.clone();
            abstract_num.set_attr(abstract_attr.as_str(), new_id.clone());
            refresh_nsid(&mut abstract_num, &w, &mut nsids);
            self.maps.apply(&mut abstract_num, &w);
            dst.insert_abstract_num(abstract_num)?;
            self.report.abstract_nums_added += 1;
        }

        seen.clear();
        for element in src.num_elements() {
            let Some(new_id) = element
                .attr(&num_attr)
                .and_then(|old| self.maps.nums.get(old))
            else {
                continue;
            };
            if !seen.insert(new_id.clone()) {
                continue;
            }
            let mut num = element.clone();
            num.set_attr(num_attr.as_str(), new_id.clone());
            self.maps.apply(&mut num, &w);
            dst.insert_num(num)?;
            self.report.nums_added += 1;
        }
        debug!(
            pic_bullets = self.report.pic_bullets_added,
            abstract_nums = self.report.abstract_nums_added,
            nums = self.report.nums_added,
            "merged numbering"
        );
        Ok(())
    }

    /// Number the importable source notes of each kind above the target's ids,
    /// keeping their relative order.
    fn map_notes(&mut self) {
        for kind in NoteKind::ALL {
            let (Some(src), Some(dst)) = (self.source.notes(kind), self.doc.notes(kind)) else {
                continue;
            };
            let w = src.part().w();
            let mut ids: Vec<i64> = src
                .elements()
                .filter(|e| !is_separator_element(e, kind, w))
                .filter_map(|e| e.attr_ns(w, "id")?.trim().parse().ok())
                .collect();
            ids.sort_unstable();
            ids.dedup();
            let base = dst.max_id() + 1;
            let map = ids
                .iter()
                .zip(base..)
                .map(|(&old, new)| (old, new))
                .collect();
            self.maps.notes.insert(kind, map);
        }
    }

    /// Renumbered, rewritten copies of the source notes, with their
    /// relationships re-homed into the target note parts.
    fn prepare_notes(&mut self, importer: &mut PartImporter) -> Result<PreparedNotes> {
        let mut prepared = Vec::new();
        for kind in NoteKind::ALL {
            let (Some(src), Some(dst)) = (self.source.notes(kind), self.doc.notes(kind)) else {
                continue;
            };
            let Some(map) = self.maps.notes.get(&kind) else {
                continue;
            };
            let (w, r) = (src.part().w(), src.part().r());
            let id_attr = qualify(w, "id");
            let mut seen = HashSet::new();
            let mut notes = Vec::new();
            for element in src.elements().filter(|e| !is_separator_element(e, kind, w)) {
                let Some(old) = element
                    .attr(&id_attr)
                    .and_then(|v| v.trim().parse::<i64>().ok())
                else {
                    continue;
                };
                let Some(&new) = map.get(&old) else {
                    continue;
                };
                if !seen.insert(old) {
                    continue;
                }
                let mut note = element.clone();
                note.set_attr(id_attr.as_str(), new.to_string());
                self.maps.apply(&mut note, w);
                rehome_relationships(
                    &mut note,
                    r,
                    self.opc,
                    self.source_opc,
                    src.partname(),
                    dst.partname(),
                    importer,
                )?;
                notes.push(note);
            }
            prepared.push((kind, notes));
        }
        Ok(prepared)
    }

    /// Rewrite the source body's references and re-home its relationships.
    fn prepare_body(&mut self, importer: &mut PartImporter) -> Result<()> {
        let main = self.source.main().part();
        let (w, r) = (main.w().to_string(), main.r().to_string());
        let from = main.partname().clone();
        let to = self.doc.main().partname().clone();
        let body = self.source.body_mut()?;
        self.maps.apply(body, &w);
        rehome_relationships(body, &r, self.opc, self.source_opc, &from, &to, importer)?;
        Ok(())
    }

    /// Continue drawing object ids after the highest id anywhere in the target.
    fn renumber_drawing_objects(&mut self, notes: &mut PreparedNotes) -> Result<()> {
        let mut next = self
            .doc
            .trees()
            .iter()
            .map(|tree| max_drawing_id(tree.root()))
            .max()
            .unwrap_or(0)
            + 1;
        let mut renumbered = renumber_drawings(self.source.body_mut()?, &mut next);
        for note in notes.iter_mut().flat_map(|(_, list)| list.iter_mut()) {
            renumbered += renumber_drawings(note, &mut next);
        }
        self.report.drawings_renumbered = renumbered;
        Ok(())
    }

    fn push_notes(&mut self, prepared: PreparedNotes) -> Result<()> {
        for (kind, notes) in prepared {
            let Some(dst) = self.doc.notes_mut(kind) else {
                continue;
            };
            let added = notes.len();
            for note in notes {
                dst.push(note)?;
            }
            match kind {
                NoteKind::Footnote => self.report.footnotes_added = added,
                NoteKind::Endnote => self.report.endnotes_added = added,
                NoteKind::Comment => self.report.comments_added = added,
            }
            debug!(added, "merged {}s", kind.category());
        }
        Ok(())
    }

    fn merge_custom_properties(&mut self) {
        if let (Some(src), Some(dst)) = (
            self.source.custom_properties(),
            self.doc.custom_properties_mut(),
        ) {
            self.report.properties_added = dst.merge_from(src);
        }
    }

    /// Copy root attributes (namespace declarations, compatibility markers)
    /// the target lacks, for the main part and each merged category part.
    fn merge_root_attributes(&mut self) {
        merge_root_attributes(
            self.doc.main_mut().part_mut().root_mut(),
            self.source.main().part().root(),
        );
        if let (Some(dst), Some(src)) = (self.doc.styles_mut(), self.source.styles()) {
            merge_root_attributes(dst.part_mut().root_mut(), src.part().root());
        }
        if let (Some(dst), Some(src)) = (self.doc.numbering_mut(), self.source.numbering()) {
            merge_root_attributes(dst.part_mut().root_mut(), src.part().root());
        }
        if let (Some(dst), Some(src)) = (self.doc.font_table_mut(), self.source.font_table()) {
            merge_root_attributes(dst.part_mut().root_mut(), src.part().root());
        }
        for kind in NoteKind::ALL {
            if let (Some(dst), Some(src)) = (self.doc.notes_mut(kind), self.source.notes(kind)) {
                merge_root_attributes(dst.part_mut().root_mut(), src.part().root());
            }
        }
    }

    fn splice(&mut self) -> Result<()> {
        let nodes = std::mem::take(self.source.body_mut()?.children_mut());
        self.report.blocks_inserted = nodes.iter().filter(|n| n.as_element().is_some()).count();
        let position = match self.options.position {
            InsertPosition::Prepend => 0,
            InsertPosition::Append => match self.doc.main().trailing_sect_pr_index()? {
                Some(index) => index,
                None => self.doc.body()?.children().len(),
            },
        };
        self.doc
            .body_mut()?
            .children_mut()
            .splice(position..position, nodes);
        Ok(())
    }
}

/// The root element with its attributes and no children.
fn root_shell(root: &XmlElement) -> XmlElement {
    let mut shell = XmlElement::new(root.name());
    for (key, value) in root.attributes() {
        shell.set_attr(key.as_str(), value.as_str());
    }
    shell
}

/// A style id derived from the style's content key.
fn mint_style_id(key: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut seed = key.to_string();
    loop {
        let id = format_guid(&guid_from_content(seed.as_bytes()));
        if !taken(&id) {
            return id;
        }
        seed.push('#');
    }
}

/// Remove `next`/`link` children naming styles the source never defined.
fn drop_dangling_links(style: &mut XmlElement, w: &str, known: &HashMap<String, String>) {
    let val = qualify(w, "val");
    style.children_mut().retain(|node| match node {
        XmlNode::Element(e) if e.is(w, "next") || e.is(w, "link") => {
            let target = e.attr(&val).unwrap_or_default();
            let resolved = known.contains_key(target);
            if !resolved {
                debug!(link = e.local_name(), target, "dropping link to undefined style");
            }
            resolved
        },
        _ => true,
    });
}

fn nsid<'a>(abstract_num: &'a XmlElement, w: &str) -> Option<&'a str> {
    abstract_num
        .elements()
        .find(|c| c.is(w, "nsid"))
        .and_then(|c| c.attr_ns(w, "val"))
}

/// Give an imported abstract numbering a list identifier no target list
/// uses, so the two lists are not continued as one.
fn refresh_nsid(abstract_num: &mut XmlElement, w: &str, taken: &mut HashSet<String>) {
    let val = qualify(w, "val");
    let Some(element) = abstract_num.elements_mut().find(|c| c.is(w, "nsid")) else {
        return;
    };
    let current = element.attr(&val).unwrap_or_default().to_string();
    if !current.is_empty() && taken.insert(current) {
        return;
    }
    loop {
        let fresh = generate_rsid();
        if taken.insert(fresh.clone()) {
            element.set_attr(val.as_str(), fresh);
            return;
        }
    }
}

fn rehome_relationships(
    root: &mut XmlElement,
    r: &str,
    opc: &mut OpcPackage,
    source_opc: &OpcPackage,
    from: &PackURI,
    to: &PackURI,
    importer: &mut PartImporter,
) -> Result<()> {
    let mut map = HashMap::new();
    for r_id in relationship_ids(root, r) {
        let new_id = importer.import_relationship(opc, source_opc, from, &r_id, to)?;
        map.insert(r_id, new_id);
    }
    rewrite_relationship_ids(root, r, &map);
    Ok(())
}

/// Copy attributes missing on `target`; `mc:Ignorable` lists are unioned.
fn merge_root_attributes(target: &mut XmlElement, source: &XmlElement) {
    for (key, value) in source.attributes() {
        if local_part(key) == "Ignorable" && !prefix_part(key).is_empty() {
            let mut tokens: Vec<&str> = target
                .attr(key)
                .map(|v| v.split_whitespace().collect())
                .unwrap_or_default();
            for token in value.split_whitespace() {
                if !tokens.contains(&token) {
                    tokens.push(token);
                }
            }
            let merged = tokens.join(" ");
            target.set_attr(key.as_str(), merged);
        } else if target.attr(key).is_none() {
            target.set_attr(key.as_str(), value.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::docx::Package;
    use crate::ooxml::docx::testing::{Fixture, drawing, png};
    use crate::ooxml::error::OoxmlError;
    use crate::ooxml::opc::constants::{content_type as ct, relationship_type as rt};

    const HEADING: &str = r#"<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:rPr><w:b/></w:rPr></w:style>"#;

    fn merged(target: Fixture, source: Fixture) -> (Package, MergeReport) {
        let mut pkg = target.package();
        let report = pkg
            .insert_document(&source.package(), MergeOptions::default())
            .unwrap();
        (pkg, report)
    }

    fn style_ids(pkg: &Package) -> Vec<String> {
        pkg.document()
            .styles()
            .unwrap()
            .iter()
            .map(|s| s.style_id().to_string())
            .collect()
    }

    fn body_style(pkg: &Package, paragraph: usize) -> String {
        let doc = pkg.document();
        let w = doc.main().part().w();
        doc.body()
            .unwrap()
            .elements()
            .filter(|e| e.is(w, "p"))
            .nth(paragraph)
            .and_then(|p| p.descendants().find(|e| e.is(w, "pStyle")))
            .and_then(|s| s.attr_ns(w, "val"))
            .unwrap_or_default()
            .to_string()
    }

    #[test]
    fn test_footnotes_renumbered_after_target() {
        let target = Fixture::new(r#"<w:p><w:r><w:t>Mine</w:t><w:footnoteReference w:id="1"/></w:r></w:p>"#)
            .footnotes(r#"<w:footnote w:type="separator" w:id="-1"><w:p/></w:footnote><w:footnote w:type="continuationSeparator" w:id="0"><w:p/></w:footnote><w:footnote w:id="1"><w:p><w:r><w:t>A</w:t></w:r></w:p></w:footnote>"#);
        let source = Fixture::new(r#"<w:p><w:r><w:t>Theirs</w:t><w:footnoteReference w:id="1"/></w:r></w:p>"#)
            .footnotes(r#"<w:footnote w:type="separator" w:id="-1"><w:p/></w:footnote><w:footnote w:type="continuationSeparator" w:id="0"><w:p/></w:footnote><w:footnote w:id="1"><w:p><w:r><w:t>B</w:t></w:r></w:p></w:footnote>"#);
        let (pkg, report) = merged(target, source);

        let notes = pkg.document().footnotes().unwrap();
        let ids: Vec<i64> = notes.notes().iter().filter(|n| !n.is_separator()).map(|n| n.id()).collect();
        assert_eq!(ids, [1, 2]);
        assert_eq!(notes.get(2).unwrap().text(), "B");
        assert_eq!(notes.len(), 4);
        assert_eq!(report.footnotes_added, 1);

        let doc = pkg.document();
        let w = doc.main().part().w();
        let refs: Vec<&str> = doc
            .body()
            .unwrap()
            .descendants()
            .filter(|e| e.is(w, "footnoteReference"))
            .filter_map(|e| e.attr_ns(w, "id"))
            .collect();
        assert_eq!(refs, ["1", "2"]);
        assert_eq!(doc.paragraph_texts().unwrap(), ["Mine", "Theirs"]);
    }

    #[test]
    fn test_identical_style_is_reused() {
        let body = r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr></w:p>"#;
        let (pkg, report) = merged(
            Fixture::new(body).styles(HEADING),
            Fixture::new(body).styles(HEADING),
        );
        assert_eq!(style_ids(&pkg), ["Heading1"]);
        assert_eq!(body_style(&pkg, 1), "Heading1");
        assert_eq!(report.styles_reused, 1);
        assert_eq!(report.styles_added, 0);
    }

    #[test]
    fn test_style_comparison_ignores_whitespace() {
        let spaced = r#"<w:style w:type="paragraph" w:styleId="Heading1">
            <w:name w:val="heading 1"/>
            <w:rPr>
                <w:b/>
            </w:rPr>
        </w:style>"#;
        let (pkg, report) = merged(
            Fixture::new("<w:p/>").styles(HEADING),
            Fixture::new(r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr></w:p>"#).styles(spaced),
        );
        assert_eq!(style_ids(&pkg), ["Heading1"]);
        assert_eq!(report.styles_reused, 1);
    }

    #[test]
    fn test_conflicting_style_gets_content_id() {
        let red = r#"<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:rPr><w:color w:val="FF0000"/></w:rPr></w:style>"#;
        let body = r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr></w:p>"#;
        let (pkg, report) = merged(Fixture::new(body).styles(HEADING), Fixture::new(body).styles(red));

        let ids = style_ids(&pkg);
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], "Heading1");
        let minted = &ids[1];
        assert_eq!(minted.len(), 36);
        assert!(minted.chars().all(|c| c.is_ascii_hexdigit() || c == '-'));
        assert_eq!(body_style(&pkg, 0), "Heading1");
        assert_eq!(&body_style(&pkg, 1), minted);
        assert_eq!(report.styles_added, 1);

        let styles = pkg.document().styles().unwrap();
        let original = styles.element("Heading1").unwrap().to_xml();
        assert!(original.contains("<w:b/>"));
        assert!(styles.element(minted).unwrap().to_xml().contains("FF0000"));
    }

    #[test]
    fn test_style_ids_are_deterministic() {
        let red = r#"<w:style w:type="character" w:styleId="Strong"><w:rPr><w:color w:val="FF0000"/></w:rPr></w:style>"#;
        let target = || Fixture::new("<w:p/>").styles(r#"<w:style w:type="character" w:styleId="Strong"><w:rPr><w:b/></w:rPr></w:style>"#);
        let source = || Fixture::new(r#"<w:p><w:r><w:rPr><w:rStyle w:val="Strong"/></w:rPr></w:r></w:p>"#).styles(red);

        let (first, _) = merged(target(), source());
        let (second, _) = merged(target(), source());
        assert_eq!(style_ids(&first), style_ids(&second));
    }

    #[test]
    fn test_imported_style_chain_is_rewritten() {
        let target = Fixture::new("<w:p/>").styles(
            r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>"#,
        );
        let source = Fixture::new(r#"<w:p><w:pPr><w:pStyle w:val="Quote"/></w:pPr></w:p>"#).styles(concat!(
            r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:rPr><w:sz w:val="22"/></w:rPr></w:style>"#,
            r#"<w:style w:type="paragraph" w:styleId="Quote"><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:link w:val="QuoteChar"/></w:style>"#,
        ));
        let (pkg, report) = merged(target, source);
        assert_eq!(report.styles_added, 2);

        let styles = pkg.document().styles().unwrap();
        let quote = styles.get(&body_style(&pkg, 1)).unwrap();
        let base = quote.based_on().unwrap();
        assert_ne!(base, "Normal");
        assert_eq!(quote.next(), Some(base));
        assert_eq!(quote.link(), None);
        let imported_normal = styles.get(base).unwrap();
        assert!(!imported_normal.is_default());
        assert!(styles.get("Normal").unwrap().is_default());
    }

    #[test]
    fn test_numbering_gets_fresh_ids() {
        let target = Fixture::new(r#"<w:p><w:pPr><w:numPr><w:numId w:val="1"/></w:numPr></w:pPr></w:p>"#).numbering(
            r#"<w:abstractNum w:abstractNumId="0"><w:nsid w:val="1A2B3C4D"/></w:abstractNum><w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num>"#,
        );
        let source = Fixture::new(concat!(
            r#"<w:p><w:pPr><w:numPr><w:numId w:val="1"/></w:numPr></w:pPr></w:p>"#,
            r#"<w:p><w:pPr><w:numPr><w:numId w:val="3"/></w:numPr></w:pPr></w:p>"#,
        ))
        .numbering(concat!(
            r#"<w:abstractNum w:abstractNumId="0"><w:nsid w:val="1A2B3C4D"/></w:abstractNum>"#,
            r#"<w:abstractNum w:abstractNumId="1"><w:nsid w:val="00FF00FF"/></w:abstractNum>"#,
            r#"<w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num>"#,
            r#"<w:num w:numId="2"><w:abstractNumId w:val="1"/></w:num>"#,
            r#"<w:num w:numId="3"><w:abstractNumId w:val="1"/></w:num>"#,
        ));
        let (pkg, report) = merged(target, source);
        assert_eq!(report.abstract_nums_added, 2);
        assert_eq!(report.nums_added, 3);

        let numbering = pkg.document().numbering().unwrap();
        let bindings: Vec<(String, String)> = numbering
            .nums()
            .iter()
            .map(|n| (n.id().to_string(), n.abstract_num_id().to_string()))
            .collect();
        let pairs: Vec<(&str, &str)> = bindings.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        assert_eq!(pairs, [("1", "0"), ("2", "1"), ("3", "2"), ("4", "2")]);

        let doc = pkg.document();
        let w = doc.main().part().w();
        let used: Vec<&str> = doc
            .body()
            .unwrap()
            .descendants()
            .filter(|e| e.is(w, "numId"))
            .filter_map(|e| e.attr_ns(w, "val"))
            .collect();
        assert_eq!(used, ["1", "2", "4"]);

        let nw = numbering.part().w();
        let nsids: HashSet<&str> = numbering.abstract_num_elements().filter_map(|e| nsid(e, nw)).collect();
        assert_eq!(nsids.len(), 3);
        assert!(nsids.contains("00FF00FF"));
    }

    #[test]
    fn test_unresolved_source_leaves_target_unchanged() {
        let mut pkg = Fixture::new("<w:p><w:r><w:t>Keep</w:t></w:r></w:p>")
            .styles(HEADING)
            .package();
        let before = pkg.to_bytes().unwrap();
        let source = Fixture::new(r#"<w:p><w:pPr><w:pStyle w:val="Ghost"/></w:pPr></w:p>"#)
            .styles(HEADING)
            .package();

        let err = pkg.insert_document(&source, MergeOptions::default()).unwrap_err();
        assert!(matches!(err, OoxmlError::UnresolvedReference { category: "style", .. }));
        assert_eq!(pkg.document().paragraph_texts().unwrap(), ["Keep"]);
        assert_eq!(style_ids(&pkg), ["Heading1"]);
        assert_eq!(pkg.opc_package().part_count(), Package::from_bytes(&before).unwrap().opc_package().part_count());
    }

    #[test]
    fn test_missing_notes_part_is_created() {
        let source = Fixture::new(r#"<w:p><w:r><w:footnoteReference w:id="1"/></w:r></w:p>"#)
            .footnotes(r#"<w:footnote w:type="separator" w:id="-1"><w:p/></w:footnote><w:footnote w:id="1"><w:p><w:r><w:t>Only</w:t></w:r></w:p></w:footnote>"#);
        let (pkg, report) = merged(Fixture::new("<w:p/>"), source);

        assert_eq!(report.parts_created, 1);
        let notes = pkg.document().footnotes().unwrap();
        assert_eq!(notes.partname().as_str(), "/word/footnotes.xml");
        assert_eq!(notes.len(), 2);
        assert_eq!(notes.get(1).unwrap().text(), "Only");

        let reopened = Package::from_bytes(&pkg.to_bytes().unwrap()).unwrap();
        assert!(reopened.document().footnotes().unwrap().contains(1));
    }

    #[test]
    fn test_prepend_and_append_positions() {
        let target = || Fixture::new(r#"<w:p><w:r><w:t>Target</w:t></w:r></w:p><w:sectPr><w:pgSz w:w="12240"/></w:sectPr>"#);
        let source = || Fixture::new(r#"<w:p><w:r><w:t>Source</w:t></w:r></w:p><w:sectPr><w:pgSz w:w="16838"/></w:sectPr>"#);

        let mut pkg = target().package();
        pkg.insert_document(&source().package(), MergeOptions::prepend()).unwrap();
        assert_eq!(pkg.document().paragraph_texts().unwrap(), ["Source", "Target"]);

        let (pkg, report) = merged(target(), source());
        assert_eq!(pkg.document().paragraph_texts().unwrap(), ["Target", "Source"]);
        assert_eq!(report.blocks_inserted, 1);

        let doc = pkg.document();
        let w = doc.main().part().w();
        let body = doc.body().unwrap();
        let sections: Vec<&XmlElement> = body.elements().filter(|e| e.is(w, "sectPr")).collect();
        assert_eq!(sections.len(), 1);
        assert!(body.elements().last().unwrap().is(w, "sectPr"));
        assert!(sections[0].to_xml().contains("12240"));
    }

    #[test]
    fn test_header_references_are_stripped() {
        let source = Fixture::new(concat!(
            r#"<w:p><w:pPr><w:sectPr><w:headerReference w:type="default" r:id="rId1"/></w:sectPr></w:pPr></w:p>"#,
            r#"<w:p/><w:sectPr><w:footerReference w:type="default" r:id="rId2"/></w:sectPr>"#,
        ))
        .header("rId1", "<w:p><w:r><w:t>Their header</w:t></w:r></w:p>")
        .footer("rId2", "<w:p/>");
        let (pkg, report) = merged(Fixture::new("<w:p/>"), source);

        assert_eq!(report.header_footer_references_removed, 1);
        let opc = pkg.opc_package();
        assert!(opc.parts_with_content_type(crate::ooxml::opc::constants::content_type::WML_HEADER).is_empty());
        assert!(opc.parts_with_content_type(crate::ooxml::opc::constants::content_type::WML_FOOTER).is_empty());
        assert!(pkg.document().header(crate::ooxml::docx::HeaderFooterType::Default).is_none());
    }

    #[test]
    fn test_images_deduplicated_and_drawings_renumbered() {
        let target = Fixture::new(&drawing("rId10", 1)).image("rId10", "image1.png", &png(1));
        let source = Fixture::new(&format!("{}{}", drawing("rId3", 1), drawing("rId4", 2)))
            .image("rId3", "image1.png", &png(1))
            .image("rId4", "image2.png", &png(2));
        let (pkg, report) = merged(target, source);

        assert_eq!(report.images_reused, 1);
        assert_eq!(report.images_added, 1);
        assert_eq!(report.drawings_renumbered, 2);
        let opc = pkg.opc_package();
        assert_eq!(opc.parts_with_content_type("image/png").len(), 2);

        let doc = pkg.document();
        let root = doc.main().part().root();
        let doc_prs: Vec<&str> = root
            .descendants()
            .filter(|e| e.local_name() == "docPr")
            .filter_map(|e| e.attr("id"))
            .collect();
        assert_eq!(doc_prs, ["1", "2", "3"]);

        let embeds: Vec<&str> = root
            .descendants()
            .filter(|e| e.local_name() == "blip")
            .filter_map(|e| e.attr("r:embed"))
            .collect();
        assert_eq!(embeds[0], "rId10");
        assert_eq!(embeds[1], "rId10");
        let main = doc.main().partname();
        let fresh = opc.related_part(main, embeds[2]).unwrap();
        assert_eq!(fresh.blob(), png(2).as_slice());
    }

    #[test]
    fn test_hyperlink_gets_fresh_id() {
        let target = Fixture::new(r#"<w:p><w:hyperlink r:id="rId1"/></w:p>"#).hyperlink("rId1", "https://mine.example");
        let source = Fixture::new(r#"<w:p><w:hyperlink r:id="rId1"/></w:p>"#).hyperlink("rId1", "https://theirs.example");
        let (pkg, _) = merged(target, source);

        let doc = pkg.document();
        let links: Vec<&str> = doc
            .body()
            .unwrap()
            .descendants()
            .filter(|e| e.local_name() == "hyperlink")
            .filter_map(|e| e.attr("r:id"))
            .collect();
        assert_eq!(links[0], "rId1");
        assert_ne!(links[1], "rId1");
        let rel = pkg.opc_package().relationship(doc.main().partname(), links[1]).unwrap();
        assert_eq!(rel.target_ref(), "https://theirs.example");
    }

    #[test]
    fn test_comments_numbered_from_zero() {
        let source = Fixture::new(r#"<w:p><w:commentRangeStart w:id="5"/><w:r><w:t>x</w:t></w:r><w:commentRangeEnd w:id="5"/><w:r><w:commentReference w:id="5"/></w:r></w:p>"#)
            .comments(r#"<w:comment w:id="5" w:author="Ann"><w:p/></w:comment>"#);
        let (pkg, report) = merged(Fixture::new("<w:p/>"), source);
        assert_eq!(report.comments_added, 1);

        let comments = pkg.document().comments().unwrap();
        assert_eq!(comments.get(0).unwrap().author(), Some("Ann"));
        let doc = pkg.document();
        let ids: Vec<&str> = doc
            .body()
            .unwrap()
            .descendants()
            .filter(|e| e.local_name().starts_with("comment"))
            .filter_map(|e| e.attr("w:id"))
            .collect();
        assert_eq!(ids, ["0", "0", "0"]);
    }

    #[test]
    fn test_custom_properties_continue_pids() {
        let target = Fixture::new("<w:p/>").custom_properties(&[("Client", 2, "Acme"), ("Matter", 3, "42")]);
        let source = Fixture::new("<w:p/>").custom_properties(&[("Client", 2, "Other"), ("Owner", 2, "Bo")]);
        let (pkg, report) = merged(target, source);
        assert_eq!(report.properties_added, 1);

        let props = pkg.document().custom_properties().unwrap();
        assert_eq!(props.pid("Owner"), Some(4));
        assert_eq!(props.len(), 3);
    }

    #[test]
    fn test_ignorable_prefixes_are_unioned() {
        let target = Fixture::new("<w:p/>").root_attrs(
            r#"xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006" xmlns:w14="http://schemas.microsoft.com/office/word/2010/wordml" mc:Ignorable="w14""#,
        );
        let source = Fixture::new("<w:p/>").root_attrs(
            r#"xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006" xmlns:w15="http://schemas.microsoft.com/office/word/2012/wordml" mc:Ignorable="w14 w15""#,
        );
        let (pkg, _) = merged(target, source);
        let root = pkg.document().main().part().root();
        assert_eq!(root.attr("mc:Ignorable"), Some("w14 w15"));
        assert!(root.attr("xmlns:w15").is_some());
    }

    #[test]
    fn test_merged_package_has_no_dangling_references() {
        let target = Fixture::new(r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:footnoteReference w:id="1"/></w:r></w:p>"#)
            .styles(HEADING)
            .footnotes(r#"<w:footnote w:id="1"><w:p/></w:footnote>"#);
        let source = Fixture::new(&format!(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:footnoteReference w:id="1"/></w:r></w:p>{}"#,
            drawing("rId2", 1)
        ))
        .styles(r#"<w:style w:type="paragraph" w:styleId="Heading1"><w:rPr><w:i/></w:rPr></w:style>"#)
        .footnotes(&format!(r#"<w:footnote w:id="1">{}</w:footnote>"#, drawing("rId9", 7)))
        .image("rId2", "image1.png", &png(5))
        .part("/word/media/note.png", "image/png", &png(6))
        .part_rel("/word/footnotes.xml", "rId9", crate::ooxml::opc::constants::relationship_type::IMAGE, "media/note.png", false);
        let (pkg, _) = merged(target, source);

        let reopened = Package::from_bytes(&pkg.to_bytes().unwrap()).unwrap();
        validate_source(reopened.opc_package(), reopened.document()).unwrap();
        let notes = reopened.document().footnotes().unwrap();
        assert!(notes.contains(2));
    }

    const MC: &str = r#"xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006""#;

    fn pic_bullet(id: u32, r_id: &str) -> String {
        format!(
            r##"<w:numPicBullet w:numPicBulletId="{id}"><w:pict><v:shape id="_x0000_i10{id}" type="#_x0000_t75"><v:imagedata r:id="{r_id}"/></v:shape></w:pict></w:numPicBullet>"##
        )
    }

    fn picture_list(abstract_id: u32, bullet: u32, nsid: &str) -> String {
        format!(
            r#"<w:abstractNum w:abstractNumId="{abstract_id}"><w:nsid w:val="{nsid}"/><w:lvl w:ilvl="0"><w:numFmt w:val="bullet"/><w:lvlPicBulletId w:val="{bullet}"/></w:lvl></w:abstractNum>"#
        )
    }

    fn image_rels(pkg: &Package) -> usize {
        let doc = pkg.document();
        pkg.opc_package()
            .get_part(doc.main().partname())
            .unwrap()
            .rels()
            .by_reltype(rt::IMAGE)
            .count()
    }

    #[test]
    fn test_picture_bullets_are_imported() {
        let list = r#"<w:p><w:pPr><w:numPr><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>item</w:t></w:r></w:p>"#;
        let target = Fixture::new(list)
            .numbering(&format!(
                r#"{}{}<w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num>"#,
                pic_bullet(0, "rId1"),
                picture_list(0, 0, "11111111")
            ))
            .part("/word/media/bullet.png", ct::PNG, &png(1))
            .part_rel("/word/numbering.xml", "rId1", rt::IMAGE, "media/bullet.png", false);
        let source = Fixture::new(list)
            .numbering(&format!(
                r#"{}{}<w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num>"#,
                pic_bullet(0, "rId1"),
                picture_list(0, 0, "22222222")
            ))
            .part("/word/media/bullet.png", ct::PNG, &png(2))
            .part_rel("/word/numbering.xml", "rId1", rt::IMAGE, "media/bullet.png", false);
        let (pkg, report) = merged(target, source);
        assert_eq!(report.pic_bullets_added, 1);
        assert_eq!(report.images_added, 1);

        let numbering = pkg.document().numbering().unwrap();
        let nw = numbering.part().w();
        let names: Vec<&str> = numbering.part().root().elements().map(|e| e.local_name()).collect();
        assert_eq!(names, ["numPicBullet", "numPicBullet", "abstractNum", "abstractNum", "num", "num"]);
        assert_eq!(numbering.used_pic_bullet_ids(), HashSet::from([0, 1]));

        let imported = numbering
            .abstract_num_elements()
            .find(|e| e.attr_ns(nw, "abstractNumId") == Some("1"))
            .unwrap();
        let level_bullet = imported
            .descendants()
            .find(|e| e.is(nw, "lvlPicBulletId"))
            .and_then(|e| e.attr_ns(nw, "val"));
        assert_eq!(level_bullet, Some("1"));

        let bullet = numbering
            .pic_bullet_elements()
            .find(|e| e.attr_ns(nw, "numPicBulletId") == Some("1"))
            .unwrap();
        let r_id = bullet
            .descendants()
            .find(|e| e.local_name() == "imagedata")
            .and_then(|e| e.attr("r:id"))
            .unwrap();
        let image = pkg.opc_package().related_part(numbering.partname(), r_id).unwrap();
        assert_eq!(image.blob(), png(2).as_slice());

        let reopened = Package::from_bytes(&pkg.to_bytes().unwrap()).unwrap();
        validate_source(reopened.opc_package(), reopened.document()).unwrap();
    }

    #[test]
    fn test_picture_bullets_seed_a_new_numbering_part() {
        let source = Fixture::new(r#"<w:p><w:pPr><w:numPr><w:numId w:val="4"/></w:numPr></w:pPr></w:p>"#)
            .numbering(&format!(
                r#"{}{}<w:num w:numId="4"><w:abstractNumId w:val="3"/></w:num>"#,
                pic_bullet(7, "rId2"),
                picture_list(3, 7, "33333333")
            ))
            .part("/word/media/dot.png", ct::PNG, &png(3))
            .part_rel("/word/numbering.xml", "rId2", rt::IMAGE, "media/dot.png", false);
        let (pkg, report) = merged(Fixture::new("<w:p/>"), source);
        assert_eq!(report.parts_created, 1);

        let numbering = pkg.document().numbering().unwrap();
        assert!(numbering.contains_pic_bullet("0"));
        let reopened = Package::from_bytes(&pkg.to_bytes().unwrap()).unwrap();
        validate_source(reopened.opc_package(), reopened.document()).unwrap();
        let pngs = reopened.opc_package().parts_with_content_type(ct::PNG);
        assert_eq!(pngs.len(), 1);
        assert_eq!(pngs[0].blob(), png(3).as_slice());
    }

    #[test]
    fn test_undefined_picture_bullet_is_rejected() {
        let source = Fixture::new("<w:p/>").numbering(&picture_list(0, 5, "44444444"));
        let mut pkg = Fixture::new("<w:p/>").package();
        let err = pkg.insert_document(&source.package(), MergeOptions::default()).unwrap_err();
        assert!(matches!(err, OoxmlError::UnresolvedReference { category: "numPicBullet", .. }));
    }

    #[test]
    fn test_absolute_image_target_is_reused() {
        let target = Fixture::new(&drawing("rId10", 1))
            .part("/word/media/image1.png", ct::PNG, &png(1))
            .rel("rId10", rt::IMAGE, "/word/media/image1.png");
        let source = Fixture::new(&drawing("rId3", 1)).image("rId3", "photo.png", &png(1));
        let (mut pkg, report) = merged(target, source);
        assert_eq!(report.images_reused, 1);

        let doc = pkg.document();
        let embeds: Vec<&str> = doc
            .main()
            .part()
            .root()
            .descendants()
            .filter(|e| e.local_name() == "blip")
            .filter_map(|e| e.attr("r:embed"))
            .collect();
        assert_eq!(embeds, ["rId10", "rId10"]);
        assert_eq!(image_rels(&pkg), 1);

        assert_eq!(pkg.add_image(&png(1)).unwrap(), "rId10");
        assert_eq!(image_rels(&pkg), 1);
    }

    #[test]
    fn test_alternate_content_ids_are_rewritten() {
        let body = concat!(
            r#"<w:p><w:r><mc:AlternateContent><mc:Choice Requires="wps"><w:drawing><a:graphic><a:graphicData>"#,
            r#"<pic:pic><pic:blipFill><a:blip r:embed="rId5"/></pic:blipFill></pic:pic>"#,
            r#"</a:graphicData></a:graphic></w:drawing></mc:Choice><mc:Fallback><w:pict><v:shape>"#,
            r#"<v:imagedata r:id="rId6"/></v:shape></w:pict></mc:Fallback></mc:AlternateContent></w:r></w:p>"#,
        );
        let target = Fixture::new(r#"<w:p><w:hyperlink r:id="rId6"/></w:p>"#)
            .image("rId5", "image1.png", &png(1))
            .hyperlink("rId6", "https://mine.example");
        let source = Fixture::new(body)
            .root_attrs(MC)
            .image("rId5", "modern.png", &png(2))
            .image("rId6", "legacy.png", &png(3));
        let (pkg, report) = merged(target, source);
        assert_eq!(report.images_added, 2);

        let doc = pkg.document();
        let main = doc.main().partname();
        let root = doc.main().part().root();
        assert!(root.attr("xmlns:mc").is_some());
        let blip = root
            .descendants()
            .find(|e| e.local_name() == "blip")
            .and_then(|e| e.attr("r:embed"))
            .unwrap();
        let imagedata = root
            .descendants()
            .find(|e| e.local_name() == "imagedata")
            .and_then(|e| e.attr("r:id"))
            .unwrap();
        assert_ne!(imagedata, "rId6");
        let opc = pkg.opc_package();
        assert_eq!(opc.related_part(main, blip).unwrap().blob(), png(2).as_slice());
        assert_eq!(opc.related_part(main, imagedata).unwrap().blob(), png(3).as_slice());
    }

    #[test]
    fn test_repeated_insertion_is_stable() {
        let chart = br#"<c:chartSpace xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart"/>"#;
        let source = Fixture::new(&format!(
            r#"{}<w:p><w:r><w:drawing><a:graphic><a:graphicData><c:chart xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart" r:id="rId7"/></a:graphicData></a:graphic></w:drawing></w:r></w:p>"#,
            drawing("rId3", 1)
        ))
        .image("rId3", "image1.png", &png(2))
        .part("/word/charts/chart1.xml", ct::DML_CHART, chart)
        .rel("rId7", rt::CHART, "charts/chart1.xml")
        .package();
        let mut pkg = Fixture::new(&drawing("rId10", 1))
            .part("/word/media/image1.png", ct::PNG, &png(1))
            .rel("rId10", rt::IMAGE, "./media/image1.png")
            .package();

        let main_rels = |pkg: &Package| {
            let doc = pkg.document();
            pkg.opc_package().get_part(doc.main().partname()).unwrap().rels().len()
        };

        pkg.insert_document(&source, MergeOptions::default()).unwrap();
        let parts = pkg.opc_package().part_count();
        let rels = main_rels(&pkg);

        let again = pkg.insert_document(&source, MergeOptions::default()).unwrap();
        assert_eq!(again.images_added, 0);
        assert_eq!(again.images_reused, 1);
        assert_eq!(again.parts_shared, 1);
        assert_eq!(pkg.opc_package().part_count(), parts);
        assert_eq!(main_rels(&pkg), rels);
        assert_eq!(image_rels(&pkg), 2);
        assert_eq!(pkg.document().body().unwrap().elements().count(), 5);
    }
}
