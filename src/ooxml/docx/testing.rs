//! In-memory package fixtures for tests.

use crate::ooxml::docx::Package;
use crate::ooxml::opc::constants::{content_type as ct, relationship_type as rt};
use std::io::{Cursor, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Namespace declarations placed on every fixture root.
pub(crate) const NS: &str = concat!(
    r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" "#,
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture" "#,
    r#"xmlns:v="urn:schemas-microsoft-com:vml""#,
);

struct FixturePart {
    name: String,
    content_type: String,
    data: Vec<u8>,
}

struct FixtureRel {
    source: String,
    r_id: String,
    reltype: String,
    target: String,
    external: bool,
}

/// Builder for a word-processing package.
///
/// Structural parts get main-part relationship ids from `rId100` upwards so
/// they never clash with the ids a test chooses for body references.
pub(crate) struct Fixture {
    body: String,
    main_content_type: &'static str,
    root_attrs: String,
    parts: Vec<FixturePart>,
    rels: Vec<FixtureRel>,
    next_structural: u32,
    headers: u32,
    footers: u32,
}

const MAIN: &str = "/word/document.xml";

impl Fixture {
    pub(crate) fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
            main_content_type: ct::WML_DOCUMENT_MAIN,
            root_attrs: String::new(),
            parts: Vec::new(),
            rels: Vec::new(),
            next_structural: 100,
            headers: 0,
            footers: 0,
        }
    }

    /// Use another main content type (templates, macro-enabled documents).
    pub(crate) fn main_content_type(mut self, content_type: &'static str) -> Self {
        self.main_content_type = content_type;
        self
    }

    /// Extra attributes for the `w:document` root.
    pub(crate) fn root_attrs(mut self, attrs: &str) -> Self {
        self.root_attrs = format!(" {attrs}");
        self
    }

    fn structural(mut self, name: &str, root: &str, content_type: &str, reltype: &str, inner: &str) -> Self {
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<w:{root} {NS}>{inner}</w:{root}>"
        );
        let r_id = format!("rId{}", self.next_structural);
        self.next_structural += 1;
        self.parts.push(FixturePart {
            name: name.to_string(),
            content_type: content_type.to_string(),
            data: xml.into_bytes(),
        });
        self.rel(&r_id, reltype, name.trim_start_matches("/word/"))
    }

    pub(crate) fn styles(self, inner: &str) -> Self {
        self.structural("/word/styles.xml", "styles", ct::WML_STYLES, rt::STYLES, inner)
    }

    pub(crate) fn numbering(self, inner: &str) -> Self {
        self.structural("/word/numbering.xml", "numbering", ct::WML_NUMBERING, rt::NUMBERING, inner)
    }

    pub(crate) fn fonts(self, inner: &str) -> Self {
        self.structural("/word/fontTable.xml", "fonts", ct::WML_FONT_TABLE, rt::FONT_TABLE, inner)
    }

    pub(crate) fn footnotes(self, inner: &str) -> Self {
        self.structural("/word/footnotes.xml", "footnotes", ct::WML_FOOTNOTES, rt::FOOTNOTES, inner)
    }

    pub(crate) fn endnotes(self, inner: &str) -> Self {
        self.structural("/word/endnotes.xml", "endnotes", ct::WML_ENDNOTES, rt::ENDNOTES, inner)
    }

    pub(crate) fn comments(self, inner: &str) -> Self {
        self.structural("/word/comments.xml", "comments", ct::WML_COMMENTS, rt::COMMENTS, inner)
    }

    pub(crate) fn settings(self, inner: &str) -> Self {
        self.structural("/word/settings.xml", "settings", ct::WML_SETTINGS, rt::SETTINGS, inner)
    }

    /// A header part reached from the main part through `r_id`.
    pub(crate) fn header(mut self, r_id: &str, inner: &str) -> Self {
        self.headers += 1;
        let name = format!("header{}.xml", self.headers);
        self.part(
            &format!("/word/{name}"),
            ct::WML_HEADER,
            format!("<w:hdr {NS}>{inner}</w:hdr>").as_bytes(),
        )
        .rel(r_id, rt::HEADER, &name)
    }

    /// A footer part reached from the main part through `r_id`.
    pub(crate) fn footer(mut self, r_id: &str, inner: &str) -> Self {
        self.footers += 1;
        let name = format!("footer{}.xml", self.footers);
        self.part(
            &format!("/word/{name}"),
            ct::WML_FOOTER,
            format!("<w:ftr {NS}>{inner}</w:ftr>").as_bytes(),
        )
        .rel(r_id, rt::FOOTER, &name)
    }

    /// An image under `/word/media/` reached from the main part through `r_id`.
    pub(crate) fn image(self, r_id: &str, filename: &str, data: &[u8]) -> Self {
        let content_type = match filename.rsplit_once('.').map(|(_, ext)| ext) {
            Some("png") => ct::PNG,
            Some("gif") => ct::GIF,
            _ => ct::JPEG,
        };
        self.part(&format!("/word/media/{filename}"), content_type, data)
            .rel(r_id, rt::IMAGE, &format!("media/{filename}"))
    }

    /// An external hyperlink relationship on the main part.
    pub(crate) fn hyperlink(mut self, r_id: &str, url: &str) -> Self {
        self.rels.push(FixtureRel {
            source: MAIN.to_string(),
            r_id: r_id.to_string(),
            reltype: rt::HYPERLINK.to_string(),
            target: url.to_string(),
            external: true,
        });
        self
    }

    /// Any part, without relationships.
    pub(crate) fn part(mut self, name: &str, content_type: &str, data: &[u8]) -> Self {
        self.parts.push(FixturePart {
            name: name.to_string(),
            content_type: content_type.to_string(),
            data: data.to_vec(),
        });
        self
    }

    /// An internal relationship from the main part.
    pub(crate) fn rel(self, r_id: &str, reltype: &str, target: &str) -> Self {
        self.part_rel(MAIN, r_id, reltype, target, false)
    }

    /// A relationship from any part (or `/` for the package).
    pub(crate) fn part_rel(
        mut self,
        source: &str,
        r_id: &str,
        reltype: &str,
        target: &str,
        external: bool,
    ) -> Self {
        self.rels.push(FixtureRel {
            source: source.to_string(),
            r_id: r_id.to_string(),
            reltype: reltype.to_string(),
            target: target.to_string(),
            external,
        });
        self
    }

    /// Custom properties: `(name, pid, lpwstr value)` triples.
    pub(crate) fn custom_properties(self, props: &[(&str, i32, &str)]) -> Self {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/custom-properties" xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes">"#,
        );
        for (name, pid, value) in props {
            xml.push_str(&format!(
                r#"<property fmtid="{{D5CDD505-2E9C-101B-9397-08002B2CF9AE}}" pid="{pid}" name="{name}"><vt:lpwstr>{value}</vt:lpwstr></property>"#
            ));
        }
        xml.push_str("</Properties>");
        self.part("/docProps/custom.xml", ct::OFC_CUSTOM_PROPERTIES, xml.as_bytes())
            .part_rel("/", "rId2", rt::CUSTOM_PROPERTIES, "docProps/custom.xml", false)
    }

    /// Serialize to ZIP bytes.
    pub(crate) fn build(self) -> Vec<u8> {
        let mut zip_data = Vec::new();
        let cursor = Cursor::new(&mut zip_data);
        let mut writer = ZipWriter::new(cursor);
        let options = SimpleFileOptions::default();

        let mut types = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>"#,
        );
        types.push_str(&format!(
            r#"<Override PartName="{MAIN}" ContentType="{}"/>"#,
            self.main_content_type
        ));
        for part in &self.parts {
            types.push_str(&format!(
                r#"<Override PartName="{}" ContentType="{}"/>"#,
                part.name, part.content_type
            ));
        }
        types.push_str("</Types>");
        writer.start_file("[Content_Types].xml", options).unwrap();
        writer.write_all(types.as_bytes()).unwrap();

        let mut sources: Vec<&str> = vec!["/", MAIN];
        for rel in &self.rels {
            if !sources.contains(&rel.source.as_str()) {
                sources.push(&rel.source);
            }
        }
        for source in sources {
            let mut xml = String::from(
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            );
            if source == "/" {
                xml.push_str(&format!(
                    r#"<Relationship Id="rId1" Type="{}" Target="word/document.xml"/>"#,
                    rt::OFFICE_DOCUMENT
                ));
            }
            for rel in self.rels.iter().filter(|r| r.source == source) {
                let mode = if rel.external { r#" TargetMode="External""# } else { "" };
                xml.push_str(&format!(
                    r#"<Relationship Id="{}" Type="{}" Target="{}"{mode}/>"#,
                    rel.r_id, rel.reltype, rel.target
                ));
            }
            xml.push_str("</Relationships>");
            let member = match source {
                "/" => "_rels/.rels".to_string(),
                _ => {
                    let (dir, file) = source.rsplit_once('/').unwrap();
                    format!("{}/_rels/{file}.rels", dir.trim_start_matches('/'))
                },
            };
            writer.start_file(member, options).unwrap();
            writer.write_all(xml.as_bytes()).unwrap();
        }

        let document = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<w:document {NS}{}><w:body>{}</w:body></w:document>",
            self.root_attrs, self.body
        );
        writer.start_file("word/document.xml", options).unwrap();
        writer.write_all(document.as_bytes()).unwrap();

        for part in &self.parts {
            writer
                .start_file(part.name.trim_start_matches('/'), options)
                .unwrap();
            writer.write_all(&part.data).unwrap();
        }

        writer.finish().unwrap();
        zip_data
    }

    /// Build and open as a document package.
    pub(crate) fn package(self) -> Package {
        Package::from_bytes(&self.build()).unwrap()
    }
}

/// A PNG-signed blob; different seeds give different content.
pub(crate) fn png(seed: u8) -> Vec<u8> {
    let mut data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    data.extend_from_slice(&[0, 0, 0, 13, b'I', b'H', b'D', b'R', seed, seed, seed]);
    data
}

/// An inline picture drawing referencing `r_id`, with drawing object id `doc_pr`.
pub(crate) fn drawing(r_id: &str, doc_pr: u32) -> String {
    format!(
        r#"<w:p><w:r><w:drawing><wp:inline><wp:docPr id="{doc_pr}" name="Picture {doc_pr}"/><a:graphic><a:graphicData><pic:pic><pic:blipFill><a:blip r:embed="{r_id}"/></pic:blipFill></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#
    )
}
