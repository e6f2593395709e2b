/// TreePart - an XML part parsed for in-place editing.
use crate::common::xml::{XmlDocument, XmlElement, qualify};
use crate::ooxml::docx::schema::Schema;
use crate::ooxml::error::Result;
use crate::ooxml::opc::part::Part;
use crate::ooxml::opc::{OpcPackage, PackURI};

/// An XML part held as an owned tree.
///
/// The WordprocessingML and relationship prefixes are looked up once on the
/// root element; producers almost always use `w` and `r`, which are also the
/// fallbacks when a part does not declare the namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct TreePart {
    partname: PackURI,
    tree: XmlDocument,
    w: String,
    r: String,
}

impl TreePart {
    /// Wrap a parsed tree.
    pub fn new(partname: PackURI, tree: XmlDocument, schema: &Schema) -> Self {
        let w = tree.prefix_for(schema.wml_namespace).unwrap_or("w").to_string();
        let r = tree.prefix_for(schema.rel_namespace).unwrap_or("r").to_string();
        Self {
            partname,
            tree,
            w,
            r,
        }
    }

    /// Parse a part of the package.
    pub fn load(opc: &OpcPackage, partname: &PackURI, schema: &Schema) -> Result<Self> {
        let tree = opc.get_part(partname)?.tree()?;
        Ok(Self::new(partname.clone(), tree, schema))
    }

    #[inline]
    pub fn partname(&self) -> &PackURI {
        &self.partname
    }

    #[inline]
    pub fn tree(&self) -> &XmlDocument {
        &self.tree
    }

    #[inline]
    pub fn tree_mut(&mut self) -> &mut XmlDocument {
        &mut self.tree
    }

    #[inline]
    pub fn root(&self) -> &XmlElement {
        self.tree.root()
    }

    #[inline]
    pub fn root_mut(&mut self) -> &mut XmlElement {
        self.tree.root_mut()
    }

    /// Prefix bound to the WordprocessingML namespace.
    #[inline]
    pub fn w(&self) -> &str {
        &self.w
    }

    /// Prefix bound to the relationships namespace.
    #[inline]
    pub fn r(&self) -> &str {
        &self.r
    }

    /// Qualified WordprocessingML name, e.g. `w:style`.
    #[inline]
    pub fn wname(&self, local: &str) -> String {
        qualify(&self.w, local)
    }

    /// Rename the WordprocessingML prefix throughout the tree.
    ///
    /// Used when content moves between parts that bind the namespace to
    /// different prefixes. The root declaration is rewritten too.
    pub fn rename_w_prefix(&mut self, to: &str) {
        let from = std::mem::replace(&mut self.w, to.to_string());
        self.rename_bound_prefix(&from, to);
    }

    /// Adopt the WordprocessingML and relationship prefixes of `other`.
    pub fn align_prefixes(&mut self, other: &TreePart) {
        self.rename_w_prefix(other.w());
        let from = std::mem::replace(&mut self.r, other.r().to_string());
        self.rename_bound_prefix(&from, other.r());
    }

    fn rename_bound_prefix(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        let root = self.tree.root_mut();
        let old_decl = if from.is_empty() {
            "xmlns".to_string()
        } else {
            format!("xmlns:{from}")
        };
        if let Some(uri) = root.remove_attr(&old_decl) {
            root.set_attr(format!("xmlns:{to}"), uri);
        }
        root.rename_prefix(from, to);
    }

    /// Write the tree back into the package part.
    pub fn flush(&self, opc: &mut OpcPackage) -> Result<()> {
        opc.get_part_mut(&self.partname)?.set_tree(&self.tree);
        Ok(())
    }
}
