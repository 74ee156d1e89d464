use crate::batch::GeneratedImage;
use crate::creative::{CreativeAnalysis, ImagePayload};

/// In-memory state of one studio sitting: the reference image, its
/// analysis and the latest batch of results. Nothing here persists; a new
/// reference or an explicit reset clears it.
#[derive(Debug, Clone, Default)]
pub struct StudioSession {
    base_image: Option<ImagePayload>,
    analysis: Option<CreativeAnalysis>,
    images: Vec<GeneratedImage>,
}

impl StudioSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts over with a freshly analyzed reference. Any previous results
    /// belong to the old reference and are discarded.
    pub fn begin(&mut self, image: ImagePayload, analysis: CreativeAnalysis) {
        self.base_image = Some(image);
        self.analysis = Some(analysis);
        self.images.clear();
    }

    pub fn base_image(&self) -> Option<&ImagePayload> {
        self.base_image.as_ref()
    }

    pub fn analysis(&self) -> Option<&CreativeAnalysis> {
        self.analysis.as_ref()
    }

    pub fn images(&self) -> &[GeneratedImage] {
        &self.images
    }

    /// Each batch replaces the gallery wholesale.
    pub fn record_results(&mut self, results: Vec<GeneratedImage>) {
        self.images = results;
    }

    /// Applies a quick-edit result to the image with the given id.
    /// Returns false when the id is unknown.
    pub fn apply_edit(&mut self, id: &str, image: ImagePayload) -> bool {
        match self.images.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.replace_payload(image);
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
