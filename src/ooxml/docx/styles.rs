/// Styles - document styles and formatting definitions.
///
/// The styles part is held as a tree; [`Styles`] keeps an index of the style
/// ids it contains so lookups and additions stay consistent. Typed [`Style`]
/// values are read from the tree on demand.
use crate::common::xml::XmlElement;
use crate::ooxml::docx::parts::TreePart;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::PackURI;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// One of the four style types: paragraph, character, table or numbering.
///
/// # Examples
///
/// ```rust
/// use quire::ooxml::docx::StyleType;
///
/// assert_eq!(StyleType::Paragraph.to_xml(), "paragraph");
/// assert_eq!(StyleType::from_xml("numbering"), Some(StyleType::Numbering));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StyleType {
    /// Paragraph style; also the type of a style without `w:type`.
    #[default]
    Paragraph,
    /// Character style.
    Character,
    /// Table style.
    Table,
    /// Numbering (list) style.
    Numbering,
}

impl StyleType {
    /// Convert the style type to its XML attribute value.
    #[inline]
    pub const fn to_xml(self) -> &'static str {
        match self {
            Self::Paragraph => "paragraph",
            Self::Character => "character",
            Self::Table => "table",
            Self::Numbering => "numbering",
        }
    }

    /// Parse style type from XML attribute value.
    ///
    /// Returns `None` if the value is not recognized.
    #[inline]
    pub fn from_xml(s: &str) -> Option<Self> {
        match s {
            "paragraph" => Some(Self::Paragraph),
            "character" => Some(Self::Character),
            "table" => Some(Self::Table),
            "numbering" => Some(Self::Numbering),
            _ => None,
        }
    }
}

impl fmt::Display for StyleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Paragraph => write!(f, "Paragraph"),
            Self::Character => write!(f, "Character"),
            Self::Table => write!(f, "Table"),
            Self::Numbering => write!(f, "Numbering"),
        }
    }
}

/// A style definition (`w:style`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Style {
    style_id: String,
    style_type: StyleType,
    name: Option<String>,
    based_on: Option<String>,
    next: Option<String>,
    link: Option<String>,
    num_id: Option<String>,
    is_default: bool,
    is_custom: bool,
}

impl Style {
    /// Parse a `w:style` element. Returns `None` when it has no `styleId`.
    pub fn from_element(e: &XmlElement, w: &str) -> Option<Self> {
        let style_id = e.attr_ns(w, "styleId")?.to_string();
        let child_val = |local: &str| {
            e.elements()
                .find(|c| c.is(w, local))
                .and_then(|c| c.attr_ns(w, "val"))
                .map(str::to_string)
        };
        let num_id = e
            .elements()
            .find(|c| c.is(w, "pPr"))
            .and_then(|ppr| ppr.elements().find(|c| c.is(w, "numPr")))
            .and_then(|numpr| numpr.elements().find(|c| c.is(w, "numId")))
            .and_then(|n| n.attr_ns(w, "val"))
            .map(str::to_string);
        Some(Self {
            style_id,
            style_type: e
                .attr_ns(w, "type")
                .and_then(StyleType::from_xml)
                .unwrap_or_default(),
            name: child_val("name"),
            based_on: child_val("basedOn"),
            next: child_val("next"),
            link: child_val("link"),
            num_id,
            is_default: on_off(e.attr_ns(w, "default")),
            is_custom: on_off(e.attr_ns(w, "customStyle")),
        })
    }

    #[inline]
    pub fn style_id(&self) -> &str {
        &self.style_id
    }

    #[inline]
    pub fn style_type(&self) -> StyleType {
        self.style_type
    }

    /// Display name (`w:name`).
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn based_on(&self) -> Option<&str> {
        self.based_on.as_deref()
    }

    /// Style applied to the following paragraph.
    #[inline]
    pub fn next(&self) -> Option<&str> {
        self.next.as_deref()
    }

    /// Linked paragraph/character style.
    #[inline]
    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    /// Numbering instance applied by the style's paragraph properties.
    #[inline]
    pub fn num_id(&self) -> Option<&str> {
        self.num_id.as_deref()
    }

    #[inline]
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    #[inline]
    pub fn is_custom(&self) -> bool {
        self.is_custom
    }
}

fn on_off(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true" | "on"))
}

/// The styles part with an index of its style ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Styles {
    part: TreePart,
    ids: HashSet<String>,
}

impl Styles {
    /// Index a parsed styles part.
    pub fn from_part(part: TreePart) -> Self {
        let w = part.w().to_string();
        let ids = part
            .root()
            .elements()
            .filter(|e| e.is(&w, "style"))
            .filter_map(|e| e.attr_ns(&w, "styleId"))
            .map(str::to_string)
            .collect();
        Self { part, ids }
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

    /// Number of distinct style ids.
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[inline]
    pub fn contains(&self, style_id: &str) -> bool {
        self.ids.contains(style_id)
    }

    /// `w:style` elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        let w = self.part.w();
        self.part.root().elements().filter(move |e| e.is(w, "style"))
    }

    /// The `w:style` element with the given id.
    pub fn element(&self, style_id: &str) -> Option<&XmlElement> {
        if !self.contains(style_id) {
            return None;
        }
        let w = self.part.w();
        self.elements()
            .find(|e| e.attr_ns(w, "styleId") == Some(style_id))
    }

    /// Get a style by its ID.
    pub fn get(&self, style_id: &str) -> Option<Style> {
        self.element(style_id)
            .and_then(|e| Style::from_element(e, self.part.w()))
    }

    /// Get a style by its display name.
    pub fn get_by_name(&self, name: &str) -> Option<Style> {
        self.iter().find(|s| s.name() == Some(name))
    }

    /// Get the default style of a type.
    pub fn default_style(&self, style_type: StyleType) -> Option<Style> {
        self.iter()
            .find(|s| s.is_default() && s.style_type() == style_type)
    }

    /// All styles in document order.
    pub fn iter(&self) -> impl Iterator<Item = Style> + '_ {
        let w = self.part.w();
        self.elements().filter_map(move |e| Style::from_element(e, w))
    }

    /// Map content key -> style id over every style, first definition wins.
    pub fn content_keys(&self) -> HashMap<String, String> {
        let w = self.part.w();
        let mut keys = HashMap::with_capacity(self.ids.len());
        for e in self.elements() {
            if let Some(id) = e.attr_ns(w, "styleId") {
                keys.entry(content_key(e, w)).or_insert_with(|| id.to_string());
            }
        }
        keys
    }

    /// Append a style definition. Its id must not be taken.
    pub fn add(&mut self, style: XmlElement) -> Result<()> {
        let w = self.part.w();
        let id = style
            .attr_ns(w, "styleId")
            .ok_or_else(|| OoxmlError::InvalidFormat("style without styleId".to_string()))?
            .to_string();
        if self.ids.contains(&id) {
            return Err(OoxmlError::InvalidFormat(format!(
                "style '{}' already defined in {}",
                id,
                self.partname()
            )));
        }
        self.part.root_mut().push(style);
        self.ids.insert(id);
        Ok(())
    }
}

/// Structural identity of a style: its serialized form without `styleId`,
/// with all whitespace removed.
///
/// Two definitions with the same key are interchangeable; the id under which
/// a style is stored does not take part in the comparison.
pub fn content_key(style: &XmlElement, w: &str) -> String {
    let mut bare = style.clone();
    bare.remove_attr(&crate::common::xml::qualify(w, "styleId"));
    bare.to_xml().chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::xml::XmlDocument;
    use crate::ooxml::docx::schema::Schema;

    const STYLES: &str = r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
        <w:docDefaults/>
        <w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>
        <w:style w:type="paragraph" w:styleId="Heading1">
            <w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/>
            <w:link w:val="Heading1Char"/><w:pPr><w:numPr><w:numId w:val="3"/></w:numPr></w:pPr>
            <w:rPr><w:color w:val="2F5496"/></w:rPr>
        </w:style>
        <w:style w:type="character" w:customStyle="1" w:styleId="Heading1Char"><w:name w:val="Heading 1 Char"/><w:link w:val="Heading1"/></w:style>
    </w:styles>"#;

    fn styles() -> Styles {
        let part = TreePart::new(
            PackURI::new("/word/styles.xml").unwrap(),
            XmlDocument::parse(STYLES.as_bytes()).unwrap(),
            &Schema::document(),
        );
        Styles::from_part(part)
    }

    #[test]
    fn test_index_and_typed_view() {
        let styles = styles();
        assert_eq!(styles.len(), 3);
        assert!(styles.contains("Heading1"));
        assert!(!styles.contains("Title"));

        let h1 = styles.get("Heading1").unwrap();
        assert_eq!(h1.style_type(), StyleType::Paragraph);
        assert_eq!(h1.name(), Some("heading 1"));
        assert_eq!(h1.based_on(), Some("Normal"));
        assert_eq!(h1.next(), Some("Normal"));
        assert_eq!(h1.link(), Some("Heading1Char"));
        assert_eq!(h1.num_id(), Some("3"));
        assert!(!h1.is_default());

        let char_style = styles.get_by_name("Heading 1 Char").unwrap();
        assert_eq!(char_style.style_type(), StyleType::Character);
        assert!(char_style.is_custom());
        assert_eq!(
            styles.default_style(StyleType::Paragraph).unwrap().style_id(),
            "Normal"
        );
    }

    #[test]
    fn test_content_key_ignores_id_and_whitespace() {
        let a = XmlDocument::parse(
            br#"<w:style w:type="paragraph" w:styleId="A"><w:name w:val="x"/>
                <w:rPr><w:b/></w:rPr></w:style>"#,
        )
        .unwrap();
        let b = XmlDocument::parse(
            br#"<w:style w:type="paragraph" w:styleId="B"><w:name w:val="x"/><w:rPr><w:b/></w:rPr></w:style>"#,
        )
        .unwrap();
        let c = XmlDocument::parse(
            br#"<w:style w:type="paragraph" w:styleId="A"><w:name w:val="x"/><w:rPr><w:i/></w:rPr></w:style>"#,
        )
        .unwrap();
        assert_eq!(content_key(a.root(), "w"), content_key(b.root(), "w"));
        assert_ne!(content_key(a.root(), "w"), content_key(c.root(), "w"));
    }

    #[test]
    fn test_add_keeps_index_consistent() {
        let mut styles = styles();
        let keys = styles.content_keys();
        let h1_key = content_key(styles.element("Heading1").unwrap(), "w");
        assert_eq!(keys.get(&h1_key).map(String::as_str), Some("Heading1"));

        let title = XmlElement::new("w:style")
            .with_attr("w:type", "paragraph")
            .with_attr("w:styleId", "Title");
        styles.add(title.clone()).unwrap();
        assert!(styles.contains("Title"));
        assert_eq!(styles.len(), 4);
        assert!(styles.add(title).is_err());
        assert!(styles.add(XmlElement::new("w:style")).is_err());
    }
}
