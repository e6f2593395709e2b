use crate::common::xml::escape_xml;
use crate::ooxml::opc::constants::{namespace, target_mode};
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::PackURI;
/// Relationship-related objects for OPC packages.
///
/// This module provides types for managing relationships between parts in an OPC package,
/// including internal and external relationships.
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Whether a relationship resolves to a part inside the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetMode {
    /// The target is another part of the same package.
    #[default]
    Internal,
    /// The target is an opaque URL (hyperlinks, linked files).
    External,
}

impl TargetMode {
    /// Parse the `TargetMode` attribute value. Anything but "External" is internal.
    #[inline]
    pub fn from_xml(value: &str) -> Self {
        if value == target_mode::EXTERNAL {
            Self::External
        } else {
            Self::Internal
        }
    }

    /// Get the `TargetMode` attribute value.
    #[inline]
    pub const fn to_xml(self) -> &'static str {
        match self {
            Self::Internal => target_mode::INTERNAL,
            Self::External => target_mode::EXTERNAL,
        }
    }
}

/// A single relationship from a source part to a target.
///
/// Represents a connection between parts in an OPC package, identified by an rId
/// (relationship ID). Can be either internal (pointing to another part) or external
/// (pointing to an external URL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1", "rId2")
    r_id: String,

    /// Relationship type URI
    reltype: String,

    /// Target reference - either a part URI or external URL
    target_ref: String,

    /// Base URI for resolving relative references
    base_uri: String,

    /// Internal or external target
    target_mode: TargetMode,
}

impl Relationship {
    /// Create a new relationship.
    ///
    /// # Arguments
    /// * `r_id` - Relationship ID (e.g., "rId1")
    /// * `reltype` - Relationship type URI
    /// * `target_ref` - Target reference (part URI or external URL)
    /// * `base_uri` - Base URI for resolving relative references
    /// * `target_mode` - Internal or external target
    pub fn new(
        r_id: String,
        reltype: String,
        target_ref: String,
        base_uri: String,
        target_mode: TargetMode,
    ) -> Self {
        Self {
            r_id,
            reltype,
            target_ref,
            base_uri,
            target_mode,
        }
    }

    /// Get the relationship ID.
    #[inline]
    pub fn r_id(&self) -> &str {
        &self.r_id
    }

    /// Get the relationship type.
    #[inline]
    pub fn reltype(&self) -> &str {
        &self.reltype
    }

    /// Get the target reference.
    ///
    /// For internal relationships, this is a relative part reference.
    /// For external relationships, this is an absolute URL.
    #[inline]
    pub fn target_ref(&self) -> &str {
        &self.target_ref
    }

    /// Get the target mode.
    #[inline]
    pub fn target_mode(&self) -> TargetMode {
        self.target_mode
    }

    /// Check if this is an external relationship.
    #[inline]
    pub fn is_external(&self) -> bool {
        self.target_mode == TargetMode::External
    }

    /// Get the absolute target partname for internal relationships.
    ///
    /// Returns an error if this is an external relationship or if the target
    /// reference cannot be resolved inside the package.
    pub fn target_partname(&self) -> Result<PackURI> {
        if self.is_external() {
            return Err(OpcError::InvalidRelationship(format!(
                "{} targets external '{}', not a part",
                self.r_id, self.target_ref
            )));
        }
        PackURI::from_rel_ref(&self.base_uri, &self.target_ref).map_err(|e| {
            OpcError::InvalidRelationship(format!("{} has a malformed target: {}", self.r_id, e))
        })
    }
}

/// Collection of relationships from a single source.
///
/// Keyed by relationship ID; ids are only unique within one source part.
#[derive(Debug, Clone)]
pub struct Relationships {
    /// Base URI for resolving relative references
    base_uri: String,

    /// Map of relationship ID to Relationship
    rels: HashMap<String, Relationship>,
}

impl Relationships {
    /// Create a new empty relationships collection.
    ///
    /// # Arguments
    /// * `base_uri` - Base URI for resolving relative references
    pub fn new(base_uri: String) -> Self {
        Self {
            base_uri,
            rels: HashMap::new(),
        }
    }

    /// Get the base URI relative targets resolve against.
    #[inline]
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Add a relationship with a caller-chosen ID, replacing any relationship
    /// that already used it.
    ///
    /// # Returns
    /// Reference to the newly added relationship
    pub fn add_relationship(
        &mut self,
        reltype: String,
        target_ref: String,
        r_id: String,
        target_mode: TargetMode,
    ) -> &Relationship {
        let rel = Relationship::new(
            r_id.clone(),
            reltype,
            target_ref,
            self.base_uri.clone(),
            target_mode,
        );
        match self.rels.entry(r_id) {
            Entry::Occupied(mut slot) => {
                slot.insert(rel);
                slot.into_mut()
            },
            Entry::Vacant(slot) => slot.insert(rel),
        }
    }

    /// Create a relationship under a freshly allocated ID.
    pub fn create(
        &mut self,
        reltype: &str,
        target_ref: &str,
        target_mode: TargetMode,
    ) -> &Relationship {
        let r_id = self.next_r_id();
        self.add_relationship(reltype.to_string(), target_ref.to_string(), r_id, target_mode)
    }

    /// Get a relationship by its ID.
    #[inline]
    pub fn get(&self, r_id: &str) -> Option<&Relationship> {
        self.rels.get(r_id)
    }

    /// Check whether an ID is in use.
    #[inline]
    pub fn contains(&self, r_id: &str) -> bool {
        self.rels.contains_key(r_id)
    }

    /// Get or add an internal relationship to a target part.
    ///
    /// If a relationship of the given type to the target already exists,
    /// returns that relationship. Otherwise, creates a new one with the
    /// next available rId.
    ///
    /// Targets are compared as resolved partnames, so `media/a.png`,
    /// `./media/a.png` and `/word/media/a.png` name the same part from `/word`.
    pub fn get_or_add(&mut self, reltype: &str, target_ref: &str) -> &Relationship {
        let wanted = PackURI::from_rel_ref(&self.base_uri, target_ref).ok();
        let existing = self
            .iter()
            .find(|rel| {
                rel.reltype() == reltype
                    && !rel.is_external()
                    && match &wanted {
                        Some(partname) => rel.target_partname().is_ok_and(|p| &p == partname),
                        None => rel.target_ref() == target_ref,
                    }
            })
            .map(|rel| rel.r_id().to_string());

        match existing {
            Some(r_id) => &self.rels[&r_id],
            None => self.create(reltype, target_ref, TargetMode::Internal),
        }
    }

    /// Get or add an external relationship, returning its ID.
    pub fn get_or_add_ext_rel(&mut self, reltype: &str, target_ref: &str) -> String {
        let existing = self
            .iter()
            .find(|rel| rel.reltype() == reltype && rel.target_ref() == target_ref && rel.is_external())
            .map(|rel| rel.r_id().to_string());

        match existing {
            Some(r_id) => r_id,
            None => self
                .create(reltype, target_ref, TargetMode::External)
                .r_id()
                .to_string(),
        }
    }

    /// Get the next available relationship ID.
    ///
    /// Scans existing "rIdN" ids and returns `rId{max + 1}`, so a new id is
    /// never below one already handed out, even after deletions.
    pub fn next_r_id(&self) -> String {
        let max = self
            .rels
            .keys()
            .filter_map(|r_id| r_id_number(r_id))
            .max()
            .unwrap_or(0);

        format!("rId{}", max + 1)
    }

    /// Get the relationship of a specific type.
    ///
    /// Returns an error if no relationship of the type is found,
    /// or if multiple relationships of the type exist.
    pub fn part_with_reltype(&self, reltype: &str) -> Result<&Relationship> {
        self.optional_with_reltype(reltype)?.ok_or_else(|| {
            OpcError::RelationshipNotFound(format!("No relationship of type '{}'", reltype))
        })
    }

    /// Get the relationship of a specific type if there is one.
    ///
    /// Returns an error if multiple relationships of the type exist.
    pub fn optional_with_reltype(&self, reltype: &str) -> Result<Option<&Relationship>> {
        let mut matching = self.by_reltype(reltype);
        let first = matching.next();
        if matching.next().is_some() {
            return Err(OpcError::InvalidRelationship(format!(
                "Multiple relationships of type '{}'",
                reltype
            )));
        }
        Ok(first)
    }

    /// All relationships of a type, in id order.
    pub fn by_reltype<'a>(
        &'a self,
        reltype: &str,
    ) -> impl Iterator<Item = &'a Relationship> + use<'a> {
        let reltype = reltype.to_string();
        self.iter().filter(move |rel| rel.reltype() == reltype)
    }

    /// Get an iterator over all relationships, ordered by numeric id.
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        let mut rels: Vec<&Relationship> = self.rels.values().collect();
        rels.sort_by(|a, b| id_order(a.r_id()).cmp(&id_order(b.r_id())));
        rels.into_iter()
    }

    /// Get the number of relationships in the collection.
    #[inline]
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    /// Check if the collection is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    /// Remove a relationship by its ID.
    pub fn remove(&mut self, r_id: &str) -> Option<Relationship> {
        self.rels.remove(r_id)
    }

    /// Remove every internal relationship resolving to `partname`.
    ///
    /// Returns the removed relationship IDs.
    pub fn remove_targeting(&mut self, partname: &PackURI) -> Vec<String> {
        let doomed: Vec<String> = self
            .rels
            .values()
            .filter(|rel| rel.target_partname().is_ok_and(|p| &p == partname))
            .map(|rel| rel.r_id().to_string())
            .collect();
        for r_id in &doomed {
            self.rels.remove(r_id);
        }
        doomed
    }

    /// Serialize relationships to XML format.
    ///
    /// Generates the XML for a .rels file, with relationships sorted by rId
    /// for consistent output.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(1024);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<Relationships xmlns="{}">"#,
            namespace::OPC_RELATIONSHIPS
        ));

        for rel in self.iter() {
            let target_mode = if rel.is_external() {
                r#" TargetMode="External""#
            } else {
                ""
            };

            xml.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}"{}/>"#,
                escape_xml(rel.r_id()),
                escape_xml(rel.reltype()),
                escape_xml(rel.target_ref()),
                target_mode
            ));
        }

        xml.push_str("</Relationships>");

        xml
    }
}

impl Default for Relationships {
    fn default() -> Self {
        Self::new("/".to_string())
    }
}

/// Numeric suffix of an "rIdN" id.
#[inline]
pub(crate) fn r_id_number(r_id: &str) -> Option<u32> {
    let digits = r_id.strip_prefix("rId")?;
    atoi_simd::parse::<u32, false, false>(digits.as_bytes()).ok()
}

fn id_order(r_id: &str) -> (u32, &str) {
    (r_id_number(r_id).unwrap_or(u32::MAX), r_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_relationship_creation() {
        let rel = Relationship::new(
            "rId1".to_string(),
            "http://example.com/rel".to_string(),
            "target.xml".to_string(),
            "/word".to_string(),
            TargetMode::Internal,
        );

        assert_eq!(rel.r_id(), "rId1");
        assert_eq!(rel.reltype(), "http://example.com/rel");
        assert!(!rel.is_external());
        assert_eq!(rel.target_partname().unwrap().as_str(), "/word/target.xml");
    }

    #[test]
    fn test_next_r_id_uses_max_plus_one() {
        let mut rels = Relationships::new("/word".to_string());
        assert_eq!(rels.next_r_id(), "rId1");

        rels.add_relationship("t".into(), "a.xml".into(), "rId1".into(), TargetMode::Internal);
        rels.add_relationship("t".into(), "b.xml".into(), "rId7".into(), TargetMode::Internal);
        rels.add_relationship("t".into(), "c.xml".into(), "custom".into(), TargetMode::Internal);

        // Gaps are never reused
        assert_eq!(rels.next_r_id(), "rId8");
    }

    #[test]
    fn test_get_or_add() {
        let mut rels = Relationships::new("/word".to_string());

        let rel1 = rels.get_or_add("type1", "target1");
        assert_eq!(rel1.r_id(), "rId1");

        let rel2 = rels.get_or_add("type1", "target1");
        assert_eq!(rel2.r_id(), "rId1");

        let rel3 = rels.get_or_add("type1", "target2");
        assert_eq!(rel3.r_id(), "rId2");

        // the same part spelled differently is the same target
        assert_eq!(rels.get_or_add("type1", "./target1").r_id(), "rId1");
        assert_eq!(rels.get_or_add("type1", "/word/target1").r_id(), "rId1");

        let ext = rels.get_or_add_ext_rel("type1", "https://example.com");
        assert_eq!(ext, "rId3");
        assert_eq!(rels.get_or_add_ext_rel("type1", "https://example.com"), "rId3");
    }

    #[test]
    fn test_get_or_add_matches_absolute_target() {
        let mut rels = Relationships::new("/word".to_string());
        rels.add_relationship(
            "image".into(),
            "/word/media/image1.png".into(),
            "rId10".into(),
            TargetMode::Internal,
        );

        assert_eq!(rels.get_or_add("image", "media/image1.png").r_id(), "rId10");
        assert_eq!(rels.get_or_add("image", "../word/media/image1.png").r_id(), "rId10");
        assert_eq!(rels.get_or_add("other", "media/image1.png").r_id(), "rId11");
        assert_eq!(rels.len(), 2);
    }

    #[test]
    fn test_by_reltype_accepts_temporary_names() {
        let mut rels = Relationships::new("/word".to_string());
        rels.create("styles", "styles.xml", TargetMode::Internal);
        let rel = rels
            .optional_with_reltype(&format!("sty{}", "les"))
            .unwrap()
            .unwrap();
        let mut matching = rels.by_reltype(&String::from("styles"));
        let first = matching.next().unwrap();
        assert_eq!(rel.r_id(), first.r_id());
    }

    #[test]
    fn test_part_with_reltype() {
        let mut rels = Relationships::new("/word".to_string());
        assert!(matches!(
            rels.part_with_reltype("styles"),
            Err(OpcError::RelationshipNotFound(_))
        ));
        assert!(rels.optional_with_reltype("styles").unwrap().is_none());

        rels.create("styles", "styles.xml", TargetMode::Internal);
        assert_eq!(rels.part_with_reltype("styles").unwrap().target_ref(), "styles.xml");

        rels.create("styles", "styles2.xml", TargetMode::Internal);
        assert!(matches!(
            rels.part_with_reltype("styles"),
            Err(OpcError::InvalidRelationship(_))
        ));
    }

    #[test]
    fn test_remove_targeting() {
        let mut rels = Relationships::new("/word".to_string());
        rels.create("image", "media/image1.png", TargetMode::Internal);
        rels.create("image", "media/image2.png", TargetMode::Internal);
        rels.create("hyperlink", "media/image1.png", TargetMode::External);

        let target = PackURI::new("/word/media/image1.png").unwrap();
        assert_eq!(rels.remove_targeting(&target), vec!["rId1".to_string()]);
        assert_eq!(rels.len(), 2);
    }

    #[test]
    fn test_to_xml_orders_numerically() {
        let mut rels = Relationships::new("/word".to_string());
        for i in [10, 2, 1] {
            rels.add_relationship(
                "t".into(),
                format!("p{i}.xml"),
                format!("rId{i}"),
                TargetMode::Internal,
            );
        }
        rels.add_relationship("h".into(), "https://a.b/?x=1&y=2".into(), "rId3".into(), TargetMode::External);

        let xml = rels.to_xml();
        let p1 = xml.find(r#"Id="rId1""#).unwrap();
        let p2 = xml.find(r#"Id="rId2""#).unwrap();
        let p10 = xml.find(r#"Id="rId10""#).unwrap();
        assert!(p1 < p2 && p2 < p10);
        assert!(xml.contains(r#"Target="https://a.b/?x=1&amp;y=2" TargetMode="External""#));
    }

    proptest! {
        #[test]
        fn prop_created_ids_never_collide(existing in proptest::collection::btree_set(1u32..500, 0..20), extra in 1usize..20) {
            let mut rels = Relationships::new("/word".to_string());
            for n in &existing {
                rels.add_relationship("t".into(), format!("p{n}.xml"), format!("rId{n}"), TargetMode::Internal);
            }
            let floor = existing.iter().max().copied().unwrap_or(0);
            for i in 0..extra {
                let id = rels.create("t", &format!("new{i}.xml"), TargetMode::Internal).r_id().to_string();
                let n = r_id_number(&id).unwrap();
                prop_assert!(n > floor);
            }
            prop_assert_eq!(rels.len(), existing.len() + extra);
        }
    }
}
