/// DocumentPart - the main document.xml part of a Word document.
use crate::common::xml::{XmlElement, XmlNode};
use crate::ooxml::docx::parts::TreePart;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::PackURI;

/// The main document part of a Word document.
///
/// This corresponds to the `/word/document.xml` part in the package (or
/// whichever part carries the main content type). It contains the body with
/// paragraphs, tables and the trailing section properties.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentPart {
    part: TreePart,
    content_type: String,
}

impl DocumentPart {
    /// Wrap the parsed main part. Fails when the root has no `body` child.
    pub fn from_part(part: TreePart, content_type: impl Into<String>) -> Result<Self> {
        let body = part.wname("body");
        if part.root().child(&body).is_none() {
            return Err(OoxmlError::missing(&body, part.partname()));
        }
        Ok(Self {
            part,
            content_type: content_type.into(),
        })
    }

    #[inline]
    pub fn partname(&self) -> &PackURI {
        self.part.partname()
    }

    #[inline]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    #[inline]
    pub fn part(&self) -> &TreePart {
        &self.part
    }

    #[inline]
    pub(crate) fn part_mut(&mut self) -> &mut TreePart {
        &mut self.part
    }

    /// The `w:body` element.
    pub fn body(&self) -> Result<&XmlElement> {
        let name = self.part.wname("body");
        self.part
            .root()
            .child(&name)
            .ok_or_else(|| OoxmlError::missing(&name, self.part.partname()))
    }

    /// The `w:body` element, mutably.
    pub fn body_mut(&mut self) -> Result<&mut XmlElement> {
        let name = self.part.wname("body");
        let partname = self.part.partname().clone();
        self.part
            .root_mut()
            .child_mut(&name)
            .ok_or_else(|| OoxmlError::missing(&name, partname))
    }

    /// Section properties of the last section: the `sectPr` that is the last
    /// element child of the body.
    pub fn section_properties(&self) -> Result<Option<&XmlElement>> {
        let w = self.part.w();
        Ok(self
            .body()?
            .elements()
            .last()
            .filter(|e| e.is(w, "sectPr")))
    }

    /// Text of every body paragraph, in document order.
    ///
    /// Paragraphs nested in tables and content controls are included; runs
    /// contribute `w:t` text, tabs and breaks.
    pub fn paragraph_texts(&self) -> Result<Vec<String>> {
        let w = self.part.w();
        Ok(self
            .body()?
            .descendants()
            .filter(|e| e.is(w, "p"))
            .map(|p| paragraph_text(p, w))
            .collect())
    }

    /// Plain text of the body, one line per paragraph.
    pub fn text(&self) -> Result<String> {
        Ok(self.paragraph_texts()?.join("\n"))
    }

    /// Index of the trailing `sectPr` among the body's child nodes.
    pub(crate) fn trailing_sect_pr_index(&self) -> Result<Option<usize>> {
        let w = self.part.w();
        let body = self.body()?;
        let last = body
            .children()
            .iter()
            .rposition(|n| n.as_element().is_some());
        Ok(last.filter(|&i| matches!(&body.children()[i], XmlNode::Element(e) if e.is(w, "sectPr"))))
    }
}

/// Text of a single paragraph, without descending into nested paragraphs
/// (text boxes are reported as their own paragraphs).
pub(crate) fn paragraph_text(p: &XmlElement, w: &str) -> String {
    let mut out = String::new();
    collect_run_text(p, w, &mut out);
    out
}

fn collect_run_text(e: &XmlElement, w: &str, out: &mut String) {
    for child in e.elements() {
        if child.is(w, "p") {
            continue;
        }
        if child.is(w, "t") {
            out.push_str(&child.text());
        } else if child.is(w, "tab") {
            out.push('\t');
        } else if child.is(w, "br") || child.is(w, "cr") {
            out.push('\n');
        } else if !child.is(w, "delText") && !child.is(w, "instrText") {
            collect_run_text(child, w, out);
        }
    }
}
