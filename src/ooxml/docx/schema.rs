/// Schema profiles: the constants that identify word-processing parts.
///
/// A [`Schema`] bundles the main-document content types a package may carry,
/// the namespaces used to resolve element prefixes, and the content type,
/// relationship type and default location of every structural part. It is
/// chosen when a package is opened or created and handed to the assembler
/// and the merge engine; nothing reads these values from globals.
use crate::ooxml::opc::constants::{content_type as ct, namespace, relationship_type as rt};

/// Which kind of main document a profile accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
    /// `.docx` / `.docm` documents
    Document,
    /// `.dotx` / `.dotm` templates
    Template,
}

/// Identity of one structural part kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartSpec {
    /// Relationship type from the main document part
    pub reltype: &'static str,
    /// Content type of the part
    pub content_type: &'static str,
    /// Partname used when the part has to be created; may carry `%d`
    pub partname: &'static str,
    /// Local name of the root element
    pub root: &'static str,
}

/// A complete set of constants for one document profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    profile: Profile,
    /// Content types recognised as the main document part
    pub main_content_types: &'static [&'static str],
    /// Content type given to the main part of a newly created package
    pub new_main_content_type: &'static str,
    /// WordprocessingML main namespace
    pub wml_namespace: &'static str,
    /// Office relationships namespace (`r:` attributes)
    pub rel_namespace: &'static str,
    pub styles: PartSpec,
    pub numbering: PartSpec,
    pub font_table: PartSpec,
    pub footnotes: PartSpec,
    pub endnotes: PartSpec,
    pub settings: PartSpec,
    pub comments: PartSpec,
    pub header: PartSpec,
    pub footer: PartSpec,
    /// Package-level custom properties part
    pub custom_properties: PartSpec,
    /// Relationship type of image parts
    pub image_reltype: &'static str,
    /// Content types treated as images for deduplication
    pub image_content_types: &'static [&'static str],
}

const DOCUMENT_MAINS: &[&str] = &[ct::WML_DOCUMENT_MAIN, ct::WML_DOCUMENT_MACRO_MAIN];
const TEMPLATE_MAINS: &[&str] = &[ct::WML_TEMPLATE_MAIN, ct::WML_TEMPLATE_MACRO_MAIN];
const IMAGE_TYPES: &[&str] = &[
    ct::PNG,
    ct::JPEG,
    ct::GIF,
    ct::BMP,
    ct::TIFF,
    ct::X_EMF,
    ct::X_WMF,
    ct::SVG,
    ct::MS_PHOTO,
];

impl Schema {
    /// Profile for documents (`.docx`, `.docm`).
    pub const fn document() -> Self {
        Self::with_mains(Profile::Document, DOCUMENT_MAINS, ct::WML_DOCUMENT_MAIN)
    }

    /// Profile for templates (`.dotx`, `.dotm`).
    pub const fn template() -> Self {
        Self::with_mains(Profile::Template, TEMPLATE_MAINS, ct::WML_TEMPLATE_MAIN)
    }

    /// Look up the profile constants.
    pub const fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::Document => Self::document(),
            Profile::Template => Self::template(),
        }
    }

    const fn with_mains(
        profile: Profile,
        main_content_types: &'static [&'static str],
        new_main_content_type: &'static str,
    ) -> Self {
        Self {
            profile,
            main_content_types,
            new_main_content_type,
            wml_namespace: namespace::WML_MAIN,
            rel_namespace: namespace::OFC_RELATIONSHIPS,
            styles: PartSpec {
                reltype: rt::STYLES,
                content_type: ct::WML_STYLES,
                partname: "/word/styles.xml",
                root: "styles",
            },
            numbering: PartSpec {
                reltype: rt::NUMBERING,
                content_type: ct::WML_NUMBERING,
                partname: "/word/numbering.xml",
                root: "numbering",
            },
            font_table: PartSpec {
                reltype: rt::FONT_TABLE,
                content_type: ct::WML_FONT_TABLE,
                partname: "/word/fontTable.xml",
                root: "fonts",
            },
            footnotes: PartSpec {
                reltype: rt::FOOTNOTES,
                content_type: ct::WML_FOOTNOTES,
                partname: "/word/footnotes.xml",
                root: "footnotes",
            },
            endnotes: PartSpec {
                reltype: rt::ENDNOTES,
                content_type: ct::WML_ENDNOTES,
                partname: "/word/endnotes.xml",
                root: "endnotes",
            },
            settings: PartSpec {
                reltype: rt::SETTINGS,
                content_type: ct::WML_SETTINGS,
                partname: "/word/settings.xml",
                root: "settings",
            },
            comments: PartSpec {
                reltype: rt::COMMENTS,
                content_type: ct::WML_COMMENTS,
                partname: "/word/comments.xml",
                root: "comments",
            },
            header: PartSpec {
                reltype: rt::HEADER,
                content_type: ct::WML_HEADER,
                partname: "/word/header%d.xml",
                root: "hdr",
            },
            footer: PartSpec {
                reltype: rt::FOOTER,
                content_type: ct::WML_FOOTER,
                partname: "/word/footer%d.xml",
                root: "ftr",
            },
            custom_properties: PartSpec {
                reltype: rt::CUSTOM_PROPERTIES,
                content_type: ct::OFC_CUSTOM_PROPERTIES,
                partname: "/docProps/custom.xml",
                root: "Properties",
            },
            image_reltype: rt::IMAGE,
            image_content_types: IMAGE_TYPES,
        }
    }

    #[inline]
    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Whether `content_type` marks a main document part in this profile.
    pub fn is_main_content_type(&self, content_type: &str) -> bool {
        self.main_content_types.contains(&content_type)
    }

    /// Whether `content_type` is an image type.
    pub fn is_image_content_type(&self, content_type: &str) -> bool {
        self.image_content_types.contains(&content_type)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::document()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_accept_their_own_mains() {
        let doc = Schema::document();
        assert!(doc.is_main_content_type(ct::WML_DOCUMENT_MAIN));
        assert!(doc.is_main_content_type(ct::WML_DOCUMENT_MACRO_MAIN));
        assert!(!doc.is_main_content_type(ct::WML_TEMPLATE_MAIN));

        let tpl = Schema::for_profile(Profile::Template);
        assert_eq!(tpl.profile(), Profile::Template);
        assert!(tpl.is_main_content_type(ct::WML_TEMPLATE_MACRO_MAIN));
        assert_eq!(tpl.new_main_content_type, ct::WML_TEMPLATE_MAIN);
    }

    #[test]
    fn test_structural_parts_are_distinct() {
        let schema = Schema::default();
        let parts = [
            &schema.styles,
            &schema.numbering,
            &schema.font_table,
            &schema.footnotes,
            &schema.endnotes,
            &schema.settings,
            &schema.comments,
        ];
        for (i, a) in parts.iter().enumerate() {
            for b in &parts[i + 1..] {
                assert_ne!(a.reltype, b.reltype);
                assert_ne!(a.partname, b.partname);
            }
        }
        assert!(schema.is_image_content_type("image/png"));
        assert!(!schema.is_image_content_type(ct::WML_STYLES));
    }
}
