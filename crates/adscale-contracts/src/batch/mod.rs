mod artifact;
mod expand;
mod gallery;

pub use artifact::{Dimensions, GeneratedImage};
pub use expand::{carousel_group_id, expand_carousel, expand_single, RenderRequest};
pub use gallery::{group_gallery, STANDALONE_GROUP};
