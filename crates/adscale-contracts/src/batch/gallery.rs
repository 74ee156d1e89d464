use indexmap::IndexMap;

use super::artifact::GeneratedImage;

/// Bucket for every image that is not part of a carousel run.
pub const STANDALONE_GROUP: &str = "standalone";

/// Groups a flat result list for presentation. Carousel images bucket
/// under their shared group id, everything else under
/// [`STANDALONE_GROUP`]; bucket order and order within a bucket both
/// follow production order.
pub fn group_gallery(images: &[GeneratedImage]) -> IndexMap<String, Vec<&GeneratedImage>> {
    let mut groups: IndexMap<String, Vec<&GeneratedImage>> = IndexMap::new();
    for image in images {
        let key = image
            .carousel
            .as_ref()
            .map(|slot| slot.group_id.clone())
            .unwrap_or_else(|| STANDALONE_GROUP.to_string());
        groups.entry(key).or_default().push(image);
    }
    groups
}
