/// Copying parts and relationships from the source package into the target.
use crate::ooxml::docx::document::free_partname;
use crate::ooxml::docx::image::{ImageIndex, store_image};
use crate::ooxml::docx::schema::Schema;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::part::{Part, PartFactory};
use crate::ooxml::opc::{OpcPackage, PackURI, TargetMode};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Counters for what the importer did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ImportStats {
    pub(crate) parts_copied: usize,
    pub(crate) parts_shared: usize,
    pub(crate) images_added: usize,
    pub(crate) images_reused: usize,
    pub(crate) relationships_mapped: usize,
}

/// Imports source parts on demand, each at most once.
///
/// The memo maps source partnames to the target partname now holding that
/// content. It is seeded with the parts both documents already have in
/// common (main part, styles, numbering and the like) so a relationship
/// reaching one of those never duplicates it.
#[derive(Debug)]
pub(crate) struct PartImporter {
    schema: Schema,
    imported: HashMap<PackURI, PackURI>,
    images: ImageIndex,
    stats: ImportStats,
}

impl PartImporter {
    pub(crate) fn new(
        target: &OpcPackage,
        schema: Schema,
        shared: impl IntoIterator<Item = (PackURI, PackURI)>,
    ) -> Self {
        Self {
            images: ImageIndex::build(target, &schema),
            schema,
            imported: shared.into_iter().collect(),
            stats: ImportStats::default(),
        }
    }

    #[inline]
    pub(crate) fn stats(&self) -> ImportStats {
        self.stats
    }

    /// Re-create relationship `r_id` of source part `from` on target part `to`.
    ///
    /// External relationships are cloned under a fresh id. Internal ones
    /// import their target first and then reuse an existing relationship of
    /// the same type to the same part, or create one. Returns the target id.
    pub(crate) fn import_relationship(
        &mut self,
        target: &mut OpcPackage,
        source: &OpcPackage,
        from: &PackURI,
        r_id: &str,
        to: &PackURI,
    ) -> Result<String> {
        let rel = source
            .get_part(from)?
            .rels()
            .get(r_id)
            .ok_or_else(|| OoxmlError::unresolved("relationship", r_id, from))?;

        let new_id = if rel.is_external() {
            target
                .get_part_mut(to)?
                .rels_mut()
                .create(rel.reltype(), rel.target_ref(), TargetMode::External)
                .r_id()
                .to_string()
        } else {
            let partname = self.import_part(target, source, &rel.target_partname()?)?;
            let target_ref = partname.relative_ref(to.base_uri());
            target
                .get_part_mut(to)?
                .rels_mut()
                .get_or_add(rel.reltype(), &target_ref)
                .r_id()
                .to_string()
        };
        self.stats.relationships_mapped += 1;
        Ok(new_id)
    }

    /// Bring a source part (and everything it relates to) into the target.
    ///
    /// Images are matched by content. Other parts keep their name when it is
    /// free, are shared when the target holds byte-identical content under
    /// the same name, and are copied under a numbered name otherwise. The
    /// copy keeps the relationship ids of the original.
    fn import_part(
        &mut self,
        target: &mut OpcPackage,
        source: &OpcPackage,
        partname: &PackURI,
    ) -> Result<PackURI> {
        if let Some(done) = self.imported.get(partname) {
            return Ok(done.clone());
        }
        let part = source.get_part(partname)?;
        let content_type = part.content_type();

        if self.schema.is_image_content_type(content_type) {
            let (name, reused) = store_image(
                target,
                &mut self.images,
                content_type,
                part.blob(),
                partname.as_str(),
            )?;
            if reused {
                debug!(source = %partname, target = %name, "reused identical image");
                self.stats.images_reused += 1;
            } else {
                self.stats.images_added += 1;
            }
            self.imported.insert(partname.clone(), name.clone());
            return Ok(name);
        }

        if let Ok(existing) = target.get_part(partname) {
            if existing.content_type() == content_type && existing.blob() == part.blob() {
                self.imported.insert(partname.clone(), partname.clone());
                self.stats.parts_shared += 1;
                return Ok(partname.clone());
            }
        }

        let name = free_partname(target, partname.as_str())?;
        target.add_part(PartFactory::load(
            name.clone(),
            content_type.to_string(),
            part.blob().to_vec(),
        ));
        self.imported.insert(partname.clone(), name.clone());
        self.stats.parts_copied += 1;
        debug!(source = %partname, target = %name, "copied part");

        for rel in part.rels().iter() {
            let target_ref = if rel.is_external() {
                rel.target_ref().to_string()
            } else {
                let child = self.import_part(target, source, &rel.target_partname()?)?;
                child.relative_ref(name.base_uri())
            };
            target.get_part_mut(&name)?.rels_mut().add_relationship(
                rel.reltype().to_string(),
                target_ref,
                rel.r_id().to_string(),
                rel.target_mode(),
            );
        }
        Ok(name)
    }

    /// Log source images nothing in the source relates to. They are not imported.
    pub(crate) fn skip_orphan_images(&self, source: &OpcPackage) -> usize {
        let mut targeted: HashSet<PackURI> = HashSet::new();
        let rels = source
            .rels()
            .iter()
            .chain(source.iter_parts().flat_map(|p| p.rels().iter()));
        for rel in rels.filter(|r| !r.is_external()) {
            if let Ok(partname) = rel.target_partname() {
                targeted.insert(partname);
            }
        }

        let mut skipped = 0;
        for &content_type in self.schema.image_content_types {
            for part in source.parts_with_content_type(content_type) {
                if !targeted.contains(part.partname()) {
                    debug!(part = %part.partname(), "skipping orphan image");
                    skipped += 1;
                }
            }
        }
        skipped
    }
}
