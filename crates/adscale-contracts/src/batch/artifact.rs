use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::creative::{AspectRatio, CarouselSlot, ImagePayload, RequestedFormat};

/// Pixel size of a custom format, echoed onto its artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub w: u32,
    pub h: u32,
}

/// One finished creative. `prompt` holds the exact text the render call
/// used, so a result can always be audited or re-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub id: String,
    pub image: ImagePayload,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
    pub label: String,
    pub timestamp: i64,
    #[serde(default)]
    pub carousel: Option<CarouselSlot>,
}

impl GeneratedImage {
    pub fn new(
        image: ImagePayload,
        prompt: impl Into<String>,
        format: &RequestedFormat,
        carousel: Option<CarouselSlot>,
    ) -> Self {
        Self {
            id: fresh_image_id(),
            image,
            prompt: prompt.into(),
            aspect_ratio: format.ratio,
            dimensions: format.dimensions().map(|(w, h)| Dimensions { w, h }),
            label: format.label.clone(),
            timestamp: Utc::now().timestamp_millis(),
            carousel,
        }
    }

    /// Quick-edit swaps the pixels and nothing else: id, prompt, format
    /// metadata and carousel membership all stay put.
    pub fn replace_payload(&mut self, image: ImagePayload) {
        self.image = image;
    }
}

fn fresh_image_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("img-{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}
