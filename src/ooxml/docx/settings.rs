/// Document settings: protection, revision tracking and revision-session ids.
///
/// The settings part is edited in place. Elements are inserted at the position
/// the settings schema assigns them so that strict consumers accept the part.
use crate::common::xml::XmlElement;
use crate::ooxml::docx::parts::TreePart;
use crate::ooxml::opc::PackURI;

/// Children of `w:settings` that must precede `w:documentProtection`.
const BEFORE_PROTECTION: &[&str] = &[
    "writeProtection",
    "view",
    "zoom",
    "removePersonalInformation",
    "removeDateAndTime",
    "doNotDisplayPageBoundaries",
    "displayBackgroundShape",
    "printPostScriptOverText",
    "printFractionalCharacterWidth",
    "printFormsData",
    "embedTrueTypeFonts",
    "embedSystemFonts",
    "saveSubsetFonts",
    "saveFormsData",
    "mirrorMargins",
    "alignBordersAndEdges",
    "bordersDoNotSurroundHeader",
    "bordersDoNotSurroundFooter",
    "gutterAtTop",
    "hideSpellingErrors",
    "hideGrammaticalErrors",
    "activeWritingStyle",
    "proofState",
    "formsDesign",
    "attachedTemplate",
    "linkStyles",
    "stylePaneFormatFilter",
    "stylePaneSortMethod",
    "documentType",
    "mailMerge",
    "revisionView",
    "trackRevisions",
    "doNotTrackMoves",
    "doNotTrackFormatting",
];

/// Children of `w:settings` that must follow `w:rsids`.
const AFTER_RSIDS: &[&str] = &[
    "mathPr",
    "attachedSchema",
    "themeFontLang",
    "clrSchemeMapping",
    "doNotIncludeSubdocsInStats",
    "doNotAutoCompressPictures",
    "forceUpgrade",
    "captions",
    "readModeInkLockDown",
    "smartTagType",
    "schemaLibrary",
    "shapeDefaults",
    "doNotEmbedSmartTags",
    "decimalSymbol",
    "listSeparator",
];

/// Type of document protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionType {
    /// No editing allowed
    ReadOnly,
    /// Only comments allowed
    Comments,
    /// Only tracked changes allowed
    TrackedChanges,
    /// Only form fields allowed
    Forms,
}

impl ProtectionType {
    /// Parse protection type from XML value.
    pub fn from_xml(s: &str) -> Option<Self> {
        match s {
            "readOnly" => Some(Self::ReadOnly),
            "comments" => Some(Self::Comments),
            "trackedChanges" => Some(Self::TrackedChanges),
            "forms" => Some(Self::Forms),
            _ => None,
        }
    }

    /// Get XML value for this protection type.
    pub const fn to_xml(self) -> &'static str {
        match self {
            Self::ReadOnly => "readOnly",
            Self::Comments => "comments",
            Self::TrackedChanges => "trackedChanges",
            Self::Forms => "forms",
        }
    }
}

/// Output of an external password-hashing routine, persisted verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    /// Base64 hash value
    pub hash: String,
    /// Base64 salt
    pub salt: String,
    /// Iteration count used by the hashing routine
    pub spin_count: u32,
    /// Hash algorithm SID (4 = SHA-1, 14 = SHA-512)
    pub algorithm_sid: u32,
}

/// A `w:documentProtection` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentProtection {
    pub edit: ProtectionType,
    pub enforcement: bool,
    /// Also restrict formatting to the allowed styles
    pub formatting: bool,
    pub password: Option<PasswordHash>,
}

impl DocumentProtection {
    /// Enforced protection without a password.
    pub fn new(edit: ProtectionType) -> Self {
        Self {
            edit,
            enforcement: true,
            formatting: false,
            password: None,
        }
    }

    /// Attach a password hash.
    pub fn with_password(mut self, password: PasswordHash) -> Self {
        self.password = Some(password);
        self
    }

    fn to_element(&self, w: &str) -> XmlElement {
        let name = |local: &str| crate::common::xml::qualify(w, local);
        let mut e = XmlElement::new(name("documentProtection"))
            .with_attr(name("edit"), self.edit.to_xml());
        if self.formatting {
            e.set_attr(name("formatting"), "1");
        }
        e.set_attr(name("enforcement"), if self.enforcement { "1" } else { "0" });
        if let Some(pw) = &self.password {
            e.set_attr(name("cryptProviderType"), "rsaAES");
            e.set_attr(name("cryptAlgorithmClass"), "hash");
            e.set_attr(name("cryptAlgorithmType"), "typeAny");
            e.set_attr(name("cryptAlgorithmSid"), pw.algorithm_sid.to_string());
            e.set_attr(name("cryptSpinCount"), pw.spin_count.to_string());
            e.set_attr(name("hash"), pw.hash.as_str());
            e.set_attr(name("salt"), pw.salt.as_str());
        }
        e
    }

    fn from_element(e: &XmlElement, w: &str) -> Option<Self> {
        let edit = e.attr_ns(w, "edit").and_then(ProtectionType::from_xml)?;
        let password = match (e.attr_ns(w, "hash"), e.attr_ns(w, "salt")) {
            (Some(hash), Some(salt)) => Some(PasswordHash {
                hash: hash.to_string(),
                salt: salt.to_string(),
                spin_count: parse_u32(e.attr_ns(w, "cryptSpinCount")).unwrap_or(0),
                algorithm_sid: parse_u32(e.attr_ns(w, "cryptAlgorithmSid")).unwrap_or(0),
            }),
            _ => None,
        };
        Some(Self {
            edit,
            enforcement: on_off(e.attr_ns(w, "enforcement"), false),
            formatting: on_off(e.attr_ns(w, "formatting"), false),
            password,
        })
    }
}

fn parse_u32(value: Option<&str>) -> Option<u32> {
    value.and_then(|v| atoi_simd::parse::<u32, false, false>(v.as_bytes()).ok())
}

fn on_off(value: Option<&str>, absent: bool) -> bool {
    match value {
        None => absent,
        Some(v) => matches!(v, "1" | "true" | "on"),
    }
}

/// The settings part.
///
/// # Examples
///
/// ```rust,no_run
/// use quire::ooxml::docx::{DocumentProtection, Package, ProtectionType};
///
/// let mut pkg = Package::open("document.docx")?;
/// if let Some(settings) = pkg.document_mut().settings_mut() {
///     settings.set_protection(&DocumentProtection::new(ProtectionType::ReadOnly));
/// }
/// pkg.save("protected.docx")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    part: TreePart,
}

impl Settings {
    pub fn from_part(part: TreePart) -> Self {
        Self { part }
    }

    #[inline]
    pub fn partname(&self) -> &PackURI {
        self.part.partname()
    }

    #[inline]
    pub fn part(&self) -> &TreePart {
        &self.part
    }

    fn child(&self, local: &str) -> Option<&XmlElement> {
        let w = self.part.w();
        self.part.root().elements().find(|e| e.is(w, local))
    }

    /// The protection record, if one is present.
    pub fn protection(&self) -> Option<DocumentProtection> {
        self.child("documentProtection")
            .and_then(|e| DocumentProtection::from_element(e, self.part.w()))
    }

    /// Whether protection is present and enforced.
    pub fn is_protected(&self) -> bool {
        self.protection().is_some_and(|p| p.enforcement)
    }

    /// Write (or replace) the protection record.
    pub fn set_protection(&mut self, protection: &DocumentProtection) {
        self.clear_protection();
        let w = self.part.w().to_string();
        let element = protection.to_element(&w);
        self.part
            .root_mut()
            .insert_after_last(|e| e.prefix() == w && BEFORE_PROTECTION.contains(&e.local_name()), element);
    }

    /// Remove any protection record.
    pub fn clear_protection(&mut self) -> bool {
        let w = self.part.w().to_string();
        let root = self.part.root_mut();
        let before = root.children().len();
        root.children_mut()
            .retain(|n| !n.as_element().is_some_and(|e| e.is(&w, "documentProtection")));
        root.children().len() != before
    }

    /// Whether revision tracking is on.
    pub fn track_revisions(&self) -> bool {
        self.child("trackRevisions")
            .is_some_and(|e| on_off(e.attr_ns(self.part.w(), "val"), true))
    }

    /// Zoom percentage.
    pub fn zoom_percent(&self) -> Option<u32> {
        self.child("zoom")
            .and_then(|e| parse_u32(e.attr_ns(self.part.w(), "percent")))
    }

    /// Distinct revision-session ids registered in `w:rsids`, root first.
    pub fn rsids(&self) -> Vec<String> {
        let w = self.part.w();
        let mut out: Vec<String> = Vec::new();
        let Some(rsids) = self.child("rsids") else {
            return out;
        };
        for val in rsids
            .elements()
            .filter(|e| e.is(w, "rsidRoot") || e.is(w, "rsid"))
            .filter_map(|e| e.attr_ns(w, "val"))
        {
            if !out.iter().any(|r| r == val) {
                out.push(val.to_string());
            }
        }
        out
    }

    /// Register a revision-session id. The first id registered in a part
    /// becomes the root id. Registering a known id is a no-op.
    pub fn register_rsid(&mut self, rsid: &str) {
        if self.rsids().iter().any(|r| r == rsid) {
            return;
        }
        let w = self.part.w().to_string();
        let name = |local: &str| crate::common::xml::qualify(&w, local);
        let root = self.part.root_mut();
        if !root.elements().any(|e| e.is(&w, "rsids")) {
            root.insert_before_first(
                |e| AFTER_RSIDS.contains(&e.local_name()),
                XmlElement::new(name("rsids")),
            );
        }
        let Some(rsids) = root.elements_mut().find(|e| e.is(&w, "rsids")) else {
            return;
        };
        let has_root = rsids.elements().any(|e| e.is(&w, "rsidRoot"));
        if !has_root {
            rsids.children_mut().insert(
                0,
                crate::common::xml::XmlNode::Element(
                    XmlElement::new(name("rsidRoot")).with_attr(name("val"), rsid),
                ),
            );
        }
        rsids.push(XmlElement::new(name("rsid")).with_attr(name("val"), rsid));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::xml::XmlDocument;
    use crate::ooxml::docx::schema::Schema;
    use crate::ooxml::docx::template::default_settings_xml;

    fn settings(xml: &str) -> Settings {
        let part = TreePart::new(
            PackURI::new("/word/settings.xml").unwrap(),
            XmlDocument::parse(xml.as_bytes()).unwrap(),
            &Schema::document(),
        );
        Settings::from_part(part)
    }

    fn child_names(settings: &Settings) -> Vec<String> {
        settings
            .part()
            .root()
            .elements()
            .map(|e| e.local_name().to_string())
            .collect()
    }

    #[test]
    fn test_protection_type() {
        assert_eq!(
            ProtectionType::from_xml("readOnly"),
            Some(ProtectionType::ReadOnly)
        );
        assert_eq!(
            ProtectionType::from_xml("trackedChanges"),
            Some(ProtectionType::TrackedChanges)
        );
        assert_eq!(ProtectionType::from_xml("invalid"), None);
    }

    #[test]
    fn test_set_protection_position_and_round_trip() {
        let mut settings = settings(default_settings_xml());
        assert!(!settings.is_protected());
        assert_eq!(settings.zoom_percent(), Some(100));

        let protection = DocumentProtection::new(ProtectionType::Forms).with_password(PasswordHash {
            hash: "aGFzaA==".to_string(),
            salt: "c2FsdA==".to_string(),
            spin_count: 100_000,
            algorithm_sid: 14,
        });
        settings.set_protection(&protection);
        assert_eq!(
            child_names(&settings)[..3],
            ["zoom", "documentProtection", "defaultTabStop"]
        );
        assert_eq!(settings.protection(), Some(protection.clone()));
        assert!(settings.is_protected());

        // Replacing does not duplicate
        settings.set_protection(&DocumentProtection::new(ProtectionType::ReadOnly));
        assert_eq!(
            child_names(&settings)
                .iter()
                .filter(|n| *n == "documentProtection")
                .count(),
            1
        );
        assert!(settings.clear_protection());
        assert!(settings.protection().is_none());
    }

    #[test]
    fn test_register_rsid() {
        let mut settings = settings(default_settings_xml());
        assert!(settings.rsids().is_empty());
        settings.register_rsid("00A1B2C3");
        settings.register_rsid("00D4E5F6");
        settings.register_rsid("00D4E5F6");
        assert_eq!(settings.rsids(), ["00A1B2C3", "00D4E5F6"]);
        let xml = settings.part().root().to_xml();
        assert!(xml.contains(r#"<w:rsids><w:rsidRoot w:val="00A1B2C3"/><w:rsid w:val="00A1B2C3"/><w:rsid w:val="00D4E5F6"/></w:rsids>"#));
    }

    #[test]
    fn test_rsids_precede_math_properties() {
        let mut settings = settings(
            r#"<w:settings xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:m="http://schemas.openxmlformats.org/officeDocument/2006/math"><w:trackRevisions/><m:mathPr/><w:decimalSymbol w:val="."/></w:settings>"#,
        );
        assert!(settings.track_revisions());
        settings.register_rsid("00112233");
        assert_eq!(child_names(&settings), ["trackRevisions", "rsids", "mathPr", "decimalSymbol"]);
    }
}
