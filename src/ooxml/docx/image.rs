/// Image parts: adding pictures and recognizing pictures a package already holds.
///
/// Two image parts are the same picture when their content types match and
/// their bytes hash to the same SHA-256 digest. Adding a picture that is
/// already present reuses the existing part and, where one exists, the
/// relationship that points at it.
use crate::ooxml::docx::document::free_partname;
use crate::ooxml::docx::format::ImageFormat;
use crate::ooxml::docx::schema::Schema;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::part::{BlobPart, Part};
use crate::ooxml::opc::{OpcPackage, PackURI};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::debug;

/// SHA-256 of an image's bytes.
pub type ImageDigest = [u8; 32];

pub fn image_digest(data: &[u8]) -> ImageDigest {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Image parts of a package keyed by content type and digest.
#[derive(Debug, Clone, Default)]
pub(crate) struct ImageIndex {
    parts: HashMap<(String, ImageDigest), PackURI>,
}

impl ImageIndex {
    /// Hash every image part. When two parts share content the first in
    /// partname order is the one found.
    pub(crate) fn build(opc: &OpcPackage, schema: &Schema) -> Self {
        let mut index = Self::default();
        for &content_type in schema.image_content_types {
            for part in opc.parts_with_content_type(content_type) {
                index.insert(content_type, image_digest(part.blob()), part.partname().clone());
            }
        }
        index
    }

    pub(crate) fn find(&self, content_type: &str, digest: &ImageDigest) -> Option<&PackURI> {
        self.parts.get(&(content_type.to_string(), *digest))
    }

    pub(crate) fn insert(&mut self, content_type: &str, digest: ImageDigest, partname: PackURI) {
        self.parts
            .entry((content_type.to_string(), digest))
            .or_insert(partname);
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.parts.len()
    }
}

/// Store image bytes under `name` (a partname or a `%d` template), unless an
/// identical image is already indexed.
///
/// Returns the partname holding the bytes and whether an existing part was reused.
pub(crate) fn store_image(
    opc: &mut OpcPackage,
    index: &mut ImageIndex,
    content_type: &str,
    data: &[u8],
    name: &str,
) -> Result<(PackURI, bool)> {
    let digest = image_digest(data);
    if let Some(existing) = index.find(content_type, &digest) {
        return Ok((existing.clone(), true));
    }
    let partname = free_partname(opc, name)?;
    opc.add_part(Box::new(BlobPart::new(
        partname.clone(),
        content_type.to_string(),
        data.to_vec(),
    )));
    index.insert(content_type, digest, partname.clone());
    Ok((partname, false))
}

/// Add a picture to the package and relate it from `source`.
///
/// The format is detected from the bytes. Returns the relationship id to use
/// in `r:embed`.
pub(crate) fn add_image(
    opc: &mut OpcPackage,
    source: &PackURI,
    schema: &Schema,
    data: &[u8],
) -> Result<String> {
    let format = ImageFormat::detect_from_bytes(data)
        .ok_or_else(|| OoxmlError::InvalidFormat("unrecognized image format".to_string()))?;
    let mut index = ImageIndex::build(opc, schema);
    let template = format!("/word/media/image%d.{}", format.extension());
    let (partname, reused) =
        store_image(opc, &mut index, format.content_type(), data, &template)?;

    let target_ref = partname.relative_ref(source.base_uri());
    let r_id = opc
        .get_part_mut(source)?
        .rels_mut()
        .get_or_add(schema.image_reltype, &target_ref)
        .r_id()
        .to_string();
    debug!(part = %partname, r_id = %r_id, reused, "added image");
    Ok(r_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::docx::testing::{Fixture, png};

    fn main_uri() -> PackURI {
        PackURI::new("/word/document.xml").unwrap()
    }

    #[test]
    fn test_add_image_reuses_identical_bytes() {
        let mut opc = OpcPackage::from_bytes(&Fixture::new("<w:p/>").build()).unwrap();
        let schema = Schema::document();

        let first = add_image(&mut opc, &main_uri(), &schema, &png(1)).unwrap();
        let again = add_image(&mut opc, &main_uri(), &schema, &png(1)).unwrap();
        let other = add_image(&mut opc, &main_uri(), &schema, &png(2)).unwrap();

        assert_eq!(first, again);
        assert_ne!(first, other);
        let images = opc.parts_with_content_type("image/png");
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].partname().as_str(), "/word/media/image1.png");

        let main = opc.get_part(&main_uri()).unwrap();
        assert_eq!(main.target_ref(&first).unwrap(), "media/image1.png");
        assert_eq!(main.target_ref(&other).unwrap(), "media/image2.png");
    }

    #[test]
    fn test_add_image_reuses_existing_part() {
        let bytes = Fixture::new("<w:p/>").image("rId7", "photo.png", &png(3)).build();
        let mut opc = OpcPackage::from_bytes(&bytes).unwrap();

        let r_id = add_image(&mut opc, &main_uri(), &Schema::document(), &png(3)).unwrap();
        assert_eq!(r_id, "rId7");
        assert_eq!(opc.parts_with_content_type("image/png").len(), 1);
    }

    #[test]
    fn test_add_image_rejects_unknown_bytes() {
        let mut opc = OpcPackage::from_bytes(&Fixture::new("<w:p/>").build()).unwrap();
        let err = add_image(&mut opc, &main_uri(), &Schema::document(), b"plain text").unwrap_err();
        assert!(matches!(err, OoxmlError::InvalidFormat(_)));
    }

    #[test]
    fn test_index_keys_on_content_type() {
        let bytes = Fixture::new("<w:p/>")
            .image("rId1", "a.png", &png(4))
            .image("rId2", "b.gif", &png(4))
            .build();
        let opc = OpcPackage::from_bytes(&bytes).unwrap();
        let index = ImageIndex::build(&opc, &Schema::document());
        assert_eq!(index.len(), 2);
        let found = index.find("image/gif", &image_digest(&png(4))).unwrap();
        assert_eq!(found.as_str(), "/word/media/b.gif");
    }
}
