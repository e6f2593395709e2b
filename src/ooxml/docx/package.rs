/// Package implementation for word-processing documents.
use crate::ooxml::docx::document::Document;
use crate::ooxml::docx::image;
use crate::ooxml::docx::merge::{self, MergeOptions, MergeReport};
use crate::ooxml::docx::schema::Schema;
use crate::ooxml::docx::template;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::constants::relationship_type as rt;
use crate::ooxml::opc::part::{Part, XmlPart};
use crate::ooxml::opc::{OpcPackage, PackURI};
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use tracing::{debug, info};

/// A word-processing (.docx / .dotx) package.
///
/// This is the main entry point for working with documents. It owns the OPC
/// package and the [`Document`] aggregate assembled from it. Edits go to the
/// aggregate; saving flushes them into the package, writes it out and
/// reopens it so the session can continue.
///
/// # Examples
///
/// ```rust,no_run
/// use quire::ooxml::docx::Package;
///
/// // Open an existing document
/// let pkg = Package::open("document.docx")?;
///
/// // Get the main document
/// let doc = pkg.document();
/// println!("{}", doc.text()?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct Package {
    opc: OpcPackage,
    document: Document,
}

impl Package {
    /// Create an empty document: one paragraph, one section, default styles,
    /// settings and font table.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use quire::ooxml::docx::Package;
    ///
    /// let pkg = Package::new()?;
    /// assert_eq!(pkg.document().paragraph_texts()?, [""]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new() -> Result<Self> {
        Self::new_with(Schema::document())
    }

    /// Create an empty package of the given profile (document or template).
    pub fn new_with(schema: Schema) -> Result<Self> {
        let mut opc = OpcPackage::new();
        let main = PackURI::new("/word/document.xml").map_err(OoxmlError::InvalidFormat)?;
        opc.add_part(Box::new(XmlPart::new(
            main.clone(),
            schema.new_main_content_type.to_string(),
            template::default_document_xml().as_bytes().to_vec(),
        )));
        opc.relate_to(&main, rt::OFFICE_DOCUMENT);

        let parts = [
            (&schema.styles, template::default_styles_xml()),
            (&schema.settings, template::default_settings_xml()),
            (&schema.font_table, template::default_font_table_xml()),
        ];
        for (spec, xml) in parts {
            let partname = PackURI::new(spec.partname).map_err(OoxmlError::InvalidFormat)?;
            opc.add_part(Box::new(XmlPart::new(
                partname.clone(),
                spec.content_type.to_string(),
                xml.as_bytes().to_vec(),
            )));
            let target_ref = partname.relative_ref(main.base_uri());
            opc.get_part_mut(&main)?.relate_to(&target_ref, spec.reltype);
        }

        debug!(profile = ?schema.profile(), parts = opc.part_count(), "created package");
        Self::assemble(opc, schema)
    }

    /// Open a .docx package from a file path.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use quire::ooxml::docx::Package;
    ///
    /// let pkg = Package::open("document.docx")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, Schema::document())
    }

    /// Open a package from a file path with an explicit profile.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use quire::ooxml::docx::{Package, Schema};
    ///
    /// let template = Package::open_with("letterhead.dotx", Schema::template())?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open_with<P: AsRef<Path>>(path: P, schema: Schema) -> Result<Self> {
        let path = path.as_ref();
        let opc = OpcPackage::open(path)?;
        info!(path = %path.display(), parts = opc.part_count(), "opened package");
        Self::assemble(opc, schema)
    }

    /// Load a .docx package from an in-memory buffer.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with(data, Schema::document())
    }

    /// Load a package from an in-memory buffer with an explicit profile.
    pub fn from_bytes_with(data: &[u8], schema: Schema) -> Result<Self> {
        Self::assemble(OpcPackage::from_bytes(data)?, schema)
    }

    /// Create a .docx package from a reader.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use quire::ooxml::docx::Package;
    /// use std::io::Cursor;
    ///
    /// let data = std::fs::read("document.docx")?;
    /// let pkg = Package::from_reader(Cursor::new(data))?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        Self::assemble(OpcPackage::from_reader(reader)?, Schema::document())
    }

    fn assemble(opc: OpcPackage, schema: Schema) -> Result<Self> {
        let document = Document::assemble(&opc, &schema)?;
        Ok(Self { opc, document })
    }

    /// The document aggregate.
    #[inline]
    pub fn document(&self) -> &Document {
        &self.document
    }

    #[inline]
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// The underlying OPC package, as of the last save or merge.
    ///
    /// Edits made through [`Package::document_mut`] reach it on save.
    #[inline]
    pub fn opc_package(&self) -> &OpcPackage {
        &self.opc
    }

    #[inline]
    pub fn schema(&self) -> &Schema {
        self.document.schema()
    }

    /// Add a picture related from the main document part.
    ///
    /// Returns the relationship id to put in `a:blip/@r:embed`. Adding the
    /// same bytes again returns the same id.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use quire::ooxml::docx::Package;
    ///
    /// let mut pkg = Package::new()?;
    /// let r_id = pkg.add_image(&std::fs::read("logo.png")?)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn add_image(&mut self, data: &[u8]) -> Result<String> {
        let main = self.document.main().partname().clone();
        image::add_image(&mut self.opc, &main, self.document.schema(), data)
    }

    /// Splice the body of `source` into this document.
    ///
    /// See the [`merge`](crate::ooxml::docx::merge) module for how each
    /// category of definitions is reconciled. On error this package is left
    /// as it was; `source` is never modified.
    pub fn insert_document(
        &mut self,
        source: &Package,
        options: MergeOptions,
    ) -> Result<MergeReport> {
        merge::insert_document(
            &mut self.opc,
            &mut self.document,
            &source.opc,
            &source.document,
            options,
        )
    }

    /// Serialize the package, edits included, without ending the session.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut opc = self.opc.clone();
        self.document.flush(&mut opc)?;
        Ok(opc.to_bytes()?)
    }

    /// Save to a file, then continue editing the saved state.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use quire::ooxml::docx::Package;
    ///
    /// let mut pkg = Package::open("document.docx")?;
    /// pkg.save("copy.docx")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.flush()?;
        std::fs::write(path, &bytes)?;
        info!(path = %path.display(), bytes = bytes.len(), "saved package");
        self.reopen(&bytes)
    }

    /// Save to a writer, then continue editing the saved state.
    pub fn save_to<W: Write>(&mut self, mut writer: W) -> Result<()> {
        let bytes = self.flush()?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        debug!(bytes = bytes.len(), "saved package to writer");
        self.reopen(&bytes)
    }

    fn flush(&mut self) -> Result<Vec<u8>> {
        self.document.flush(&mut self.opc)?;
        Ok(self.opc.to_bytes()?)
    }

    /// Reload from saved bytes. The new aggregate gets a fresh revision id.
    fn reopen(&mut self, bytes: &[u8]) -> Result<()> {
        let schema = *self.document.schema();
        *self = Self::assemble(OpcPackage::from_reader(Cursor::new(bytes))?, schema)?;
        Ok(())
    }
}
