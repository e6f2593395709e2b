/// Document - the assembled view of a word-processing package.
///
/// [`Document::assemble`] resolves the relationship graph of a loaded package
/// into the parts the document model works with: the main body, header and
/// footer slots, styles, numbering, font table, footnotes, endnotes,
/// comments, settings and custom properties. Each part is parsed once; edits
/// go to the parsed trees and reach the package on [`Document::flush`].
use crate::common::id::generate_rsid;
use crate::common::xml::{XmlDocument, XmlElement};
use crate::ooxml::custom_properties::{CustomProperties, find_custom_properties_part};
use crate::ooxml::docx::fonts::FontTable;
use crate::ooxml::docx::header_footer::{
    HeaderFooter, HeaderFooterKind, HeaderFooterSlots, HeaderFooterType,
};
use crate::ooxml::docx::notes::{NoteKind, Notes};
use crate::ooxml::docx::numbering::Numbering;
use crate::ooxml::docx::parts::{DocumentPart, TreePart};
use crate::ooxml::docx::schema::{PartSpec, Schema};
use crate::ooxml::docx::settings::Settings;
use crate::ooxml::docx::styles::Styles;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::part::{Part, XmlPart};
use crate::ooxml::opc::{OpcPackage, PackURI};
use tracing::{debug, warn};

/// The document aggregate.
///
/// # Examples
///
/// ```rust,no_run
/// use quire::ooxml::docx::{HeaderFooterType, Package};
///
/// let pkg = Package::open("document.docx")?;
/// let doc = pkg.document();
/// println!("{}", doc.text()?);
/// if let Some(header) = doc.header(HeaderFooterType::Default) {
///     println!("header: {}", header.text());
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    schema: Schema,
    main: DocumentPart,
    headers: HeaderFooterSlots,
    footers: HeaderFooterSlots,
    styles: Option<Styles>,
    numbering: Option<Numbering>,
    font_table: Option<FontTable>,
    footnotes: Option<Notes>,
    endnotes: Option<Notes>,
    comments: Option<Notes>,
    settings: Option<Settings>,
    custom_properties: Option<(PackURI, CustomProperties)>,
    rsid: String,
}

impl Document {
    /// Resolve a loaded package into the document aggregate.
    ///
    /// Fails when no part or more than one part carries a main content type
    /// of `schema`, when the main part has no body, or when a header/footer
    /// reference does not resolve to a header/footer part.
    pub fn assemble(opc: &OpcPackage, schema: &Schema) -> Result<Self> {
        let (main_name, main_ct) = locate_main_part(opc, schema)?;
        let main = DocumentPart::from_part(TreePart::load(opc, &main_name, schema)?, main_ct)?;
        let main_part = opc.get_part(&main_name)?;

        let load = |spec: &PartSpec| -> Result<Option<TreePart>> {
            match main_part.rels().optional_with_reltype(spec.reltype)? {
                Some(rel) if !rel.is_external() => {
                    let target = rel.target_partname()?;
                    Ok(Some(TreePart::load(opc, &target, schema)?))
                },
                _ => Ok(None),
            }
        };

        let styles = load(&schema.styles)?.map(Styles::from_part);
        let numbering = load(&schema.numbering)?.map(Numbering::from_part);
        let font_table = load(&schema.font_table)?.map(FontTable::from_part);
        let footnotes = load(&schema.footnotes)?.map(|p| Notes::from_part(NoteKind::Footnote, p));
        let endnotes = load(&schema.endnotes)?.map(|p| Notes::from_part(NoteKind::Endnote, p));
        let comments = load(&schema.comments)?.map(|p| Notes::from_part(NoteKind::Comment, p));
        let settings = load(&schema.settings)?.map(Settings::from_part);

        let (headers, footers) = resolve_header_footers(opc, &main, main_part, schema)?;

        let custom_properties = match find_custom_properties_part(opc)? {
            Some(part) => Some((
                part.partname().clone(),
                CustomProperties::from_xml(part.blob())?,
            )),
            None => None,
        };

        let rsid = generate_rsid();
        debug!(
            main = %main_name,
            headers = headers.len(),
            footers = footers.len(),
            styles = styles.as_ref().map_or(0, Styles::len),
            rsid = %rsid,
            "assembled document"
        );

        Ok(Self {
            schema: *schema,
            main,
            headers,
            footers,
            styles,
            numbering,
            font_table,
            footnotes,
            endnotes,
            comments,
            settings,
            custom_properties,
            rsid,
        })
    }

    #[inline]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Revision-session id of this editing session.
    #[inline]
    pub fn rsid(&self) -> &str {
        &self.rsid
    }

    #[inline]
    pub fn main(&self) -> &DocumentPart {
        &self.main
    }

    #[inline]
    pub(crate) fn main_mut(&mut self) -> &mut DocumentPart {
        &mut self.main
    }

    /// The `w:body` element.
    pub fn body(&self) -> Result<&XmlElement> {
        self.main.body()
    }

    /// The `w:body` element, for formatting collaborators that edit in place.
    pub fn body_mut(&mut self) -> Result<&mut XmlElement> {
        self.main.body_mut()
    }

    /// Plain text of the body, one line per paragraph.
    pub fn text(&self) -> Result<String> {
        self.main.text()
    }

    /// Text of each body paragraph.
    pub fn paragraph_texts(&self) -> Result<Vec<String>> {
        self.main.paragraph_texts()
    }

    #[inline]
    pub fn headers(&self) -> &HeaderFooterSlots {
        &self.headers
    }

    #[inline]
    pub fn footers(&self) -> &HeaderFooterSlots {
        &self.footers
    }

    #[inline]
    pub fn header(&self, slot: HeaderFooterType) -> Option<&HeaderFooter> {
        self.headers.get(slot)
    }

    #[inline]
    pub fn footer(&self, slot: HeaderFooterType) -> Option<&HeaderFooter> {
        self.footers.get(slot)
    }

    #[inline]
    pub fn header_mut(&mut self, slot: HeaderFooterType) -> Option<&mut HeaderFooter> {
        self.headers.get_mut(slot)
    }

    #[inline]
    pub fn footer_mut(&mut self, slot: HeaderFooterType) -> Option<&mut HeaderFooter> {
        self.footers.get_mut(slot)
    }

    #[inline]
    pub fn styles(&self) -> Option<&Styles> {
        self.styles.as_ref()
    }

    #[inline]
    pub(crate) fn styles_mut(&mut self) -> Option<&mut Styles> {
        self.styles.as_mut()
    }

    #[inline]
    pub fn numbering(&self) -> Option<&Numbering> {
        self.numbering.as_ref()
    }

    #[inline]
    pub(crate) fn numbering_mut(&mut self) -> Option<&mut Numbering> {
        self.numbering.as_mut()
    }

    #[inline]
    pub fn font_table(&self) -> Option<&FontTable> {
        self.font_table.as_ref()
    }

    #[inline]
    pub(crate) fn font_table_mut(&mut self) -> Option<&mut FontTable> {
        self.font_table.as_mut()
    }

    #[inline]
    pub fn footnotes(&self) -> Option<&Notes> {
        self.footnotes.as_ref()
    }

    #[inline]
    pub fn endnotes(&self) -> Option<&Notes> {
        self.endnotes.as_ref()
    }

    #[inline]
    pub fn comments(&self) -> Option<&Notes> {
        self.comments.as_ref()
    }

    /// Notes of the given kind.
    pub fn notes(&self, kind: NoteKind) -> Option<&Notes> {
        match kind {
            NoteKind::Footnote => self.footnotes.as_ref(),
            NoteKind::Endnote => self.endnotes.as_ref(),
            NoteKind::Comment => self.comments.as_ref(),
        }
    }

    pub(crate) fn notes_mut(&mut self, kind: NoteKind) -> Option<&mut Notes> {
        match kind {
            NoteKind::Footnote => self.footnotes.as_mut(),
            NoteKind::Endnote => self.endnotes.as_mut(),
            NoteKind::Comment => self.comments.as_mut(),
        }
    }

    #[inline]
    pub fn settings(&self) -> Option<&Settings> {
        self.settings.as_ref()
    }

    #[inline]
    pub fn settings_mut(&mut self) -> Option<&mut Settings> {
        self.settings.as_mut()
    }

    #[inline]
    pub fn custom_properties(&self) -> Option<&CustomProperties> {
        self.custom_properties.as_ref().map(|(_, props)| props)
    }

    #[inline]
    pub fn custom_properties_mut(&mut self) -> Option<&mut CustomProperties> {
        self.custom_properties.as_mut().map(|(_, props)| props)
    }

    pub(crate) fn set_styles(&mut self, styles: Styles) {
        self.styles = Some(styles);
    }

    pub(crate) fn set_numbering(&mut self, numbering: Numbering) {
        self.numbering = Some(numbering);
    }

    pub(crate) fn set_font_table(&mut self, font_table: FontTable) {
        self.font_table = Some(font_table);
    }

    pub(crate) fn set_notes(&mut self, notes: Notes) {
        match notes.kind() {
            NoteKind::Footnote => self.footnotes = Some(notes),
            NoteKind::Endnote => self.endnotes = Some(notes),
            NoteKind::Comment => self.comments = Some(notes),
        }
    }

    pub(crate) fn set_custom_properties(&mut self, partname: PackURI, props: CustomProperties) {
        self.custom_properties = Some((partname, props));
    }

    /// Every parsed tree the aggregate owns, for document-wide scans.
    pub(crate) fn trees(&self) -> Vec<&TreePart> {
        let mut trees = vec![self.main.part()];
        trees.extend(self.headers.iter().map(HeaderFooter::part));
        trees.extend(self.footers.iter().map(HeaderFooter::part));
        trees.extend(NoteKind::ALL.iter().filter_map(|&k| self.notes(k)).map(Notes::part));
        trees
    }

    /// Write every parsed part back into the package.
    ///
    /// The session's revision id is registered in the settings part on the
    /// way out; the aggregate itself is left untouched.
    pub fn flush(&self, opc: &mut OpcPackage) -> Result<()> {
        self.main.part().flush(opc)?;
        for hf in self.headers.iter().chain(self.footers.iter()) {
            hf.part().flush(opc)?;
        }
        if let Some(styles) = &self.styles {
            styles.part().flush(opc)?;
        }
        if let Some(numbering) = &self.numbering {
            numbering.part().flush(opc)?;
        }
        if let Some(fonts) = &self.font_table {
            fonts.part().flush(opc)?;
        }
        for kind in NoteKind::ALL {
            if let Some(notes) = self.notes(kind) {
                notes.part().flush(opc)?;
            }
        }
        if let Some(settings) = &self.settings {
            let mut stamped = settings.clone();
            stamped.register_rsid(&self.rsid);
            stamped.part().flush(opc)?;
        }
        if let Some((partname, props)) = &self.custom_properties {
            let xml = props.to_xml()?;
            opc.get_part_mut(partname)?.set_blob(xml.into_bytes());
        }
        Ok(())
    }
}

/// Find the single part whose content type marks it as the main document.
fn locate_main_part(opc: &OpcPackage, schema: &Schema) -> Result<(PackURI, String)> {
    let mut found: Option<(PackURI, String)> = None;
    for partname in opc.partnames() {
        let part = opc.get_part(&partname)?;
        if !schema.is_main_content_type(part.content_type()) {
            continue;
        }
        if let Some((first, _)) = &found {
            return Err(OoxmlError::DuplicateMainPart(
                first.to_string(),
                partname.to_string(),
            ));
        }
        found = Some((partname, part.content_type().to_string()));
    }
    found.ok_or(OoxmlError::MainPartNotFound)
}

/// Fill header and footer slots from the references in the body.
fn resolve_header_footers(
    opc: &OpcPackage,
    main: &DocumentPart,
    main_part: &dyn Part,
    schema: &Schema,
) -> Result<(HeaderFooterSlots, HeaderFooterSlots)> {
    let mut headers = HeaderFooterSlots::new();
    let mut footers = HeaderFooterSlots::new();
    let (w, r) = (main.part().w(), main.part().r());

    for e in main.body()?.descendants() {
        let kind = if e.is(w, HeaderFooterKind::Header.reference_element()) {
            HeaderFooterKind::Header
        } else if e.is(w, HeaderFooterKind::Footer.reference_element()) {
            HeaderFooterKind::Footer
        } else {
            continue;
        };

        let slot = match e.attr_ns(w, "type") {
            None => HeaderFooterType::Default,
            Some(value) => match HeaderFooterType::from_xml(value) {
                Some(slot) => slot,
                None => {
                    warn!(value, "ignoring {} reference of unknown type", kind.category());
                    continue;
                },
            },
        };

        let r_id = e.attr_ns(r, "id").unwrap_or_default();
        let rel = main_part
            .rels()
            .get(r_id)
            .ok_or_else(|| OoxmlError::unresolved(kind.category(), r_id, main.partname()))?;
        if rel.reltype() != kind.spec(schema).reltype || rel.is_external() {
            return Err(OoxmlError::InvalidFormat(format!(
                "relationship {} in {} is not a {} relationship",
                r_id,
                main.partname(),
                kind.category()
            )));
        }

        let slots = match kind {
            HeaderFooterKind::Header => &mut headers,
            HeaderFooterKind::Footer => &mut footers,
        };
        if slots.is_filled(slot) {
            continue;
        }
        let part = TreePart::load(opc, &rel.target_partname()?, schema)?;
        slots.fill(HeaderFooter::new(kind, slot, part));
    }

    Ok((headers, footers))
}

/// Create an empty structural part related from the main document part.
///
/// The partname is the profile default when free, otherwise the first free
/// numbered variant of it. `root` becomes the part's root element.
pub(crate) fn create_related_part(
    opc: &mut OpcPackage,
    main: &PackURI,
    spec: &PartSpec,
    root: XmlElement,
    schema: &Schema,
) -> Result<TreePart> {
    let partname = free_partname(opc, spec.partname)?;
    let tree = XmlDocument::new(root);
    opc.add_part(Box::new(XmlPart::from_tree(
        partname.clone(),
        spec.content_type.to_string(),
        &tree,
    )));
    let target_ref = partname.relative_ref(main.base_uri());
    opc.get_part_mut(main)?
        .relate_to(&target_ref, spec.reltype);
    debug!(part = %partname, "created part");
    Ok(TreePart::new(partname, tree, schema))
}

/// `preferred` if no part has that name, else the first free numbered name
/// derived from it (`/word/footnotes.xml` -> `/word/footnotes2.xml`, ...).
pub(crate) fn free_partname(opc: &OpcPackage, preferred: &str) -> Result<PackURI> {
    if preferred.contains("%d") {
        return Ok(opc.next_partname(preferred)?);
    }
    let candidate = PackURI::new(preferred).map_err(OoxmlError::InvalidFormat)?;
    if !opc.contains_part(&candidate) {
        return Ok(candidate);
    }
    let template = numbered_template(&candidate);
    Ok(opc.next_partname(&template)?)
}

/// `/dir/stem.ext` -> `/dir/stem%d.ext`, with trailing digits of the stem dropped.
pub(crate) fn numbered_template(partname: &PackURI) -> String {
    let stem = partname.stem().trim_end_matches(|c: char| c.is_ascii_digit());
    let base = partname.base_uri().trim_end_matches('/');
    match partname.ext() {
        "" => format!("{base}/{stem}%d"),
        ext => format!("{base}/{stem}%d.{ext}"),
    }
}
