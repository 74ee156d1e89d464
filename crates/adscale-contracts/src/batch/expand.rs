use serde::{Deserialize, Serialize};

use crate::creative::{AdCopy, CarouselSlot, GenerationConfig, RequestedFormat};

/// One atomic render unit. A batch is an ordered list of these; each one
/// maps to exactly one upstream render call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    pub format: RequestedFormat,
    pub headline: String,
    pub sub_headline: String,
    /// Deterministic per-unit offset added to the render seed. Absent in
    /// carousel mode, where continuity matters more than divergence.
    #[serde(default)]
    pub seed_offset: Option<u64>,
    #[serde(default)]
    pub carousel: Option<CarouselSlot>,
    /// Static round-robin pick into the config's asset images, resolved at
    /// expansion time so dispatch order can never change it.
    #[serde(default)]
    pub asset_index: Option<usize>,
}

/// Expands a single-mode batch: for every variant, for every copy, for
/// every format, one request. The seed offset `v*100 + c*10 + f` keeps
/// every unit visually distinct from its siblings.
pub fn expand_single(config: &GenerationConfig, count: u32) -> Vec<RenderRequest> {
    let mut requests = Vec::new();
    for variant in 0..u64::from(count) {
        for (copy_index, copy) in config.copies.iter().enumerate() {
            for (format_index, format) in config.formats.iter().enumerate() {
                let seed_offset = variant * 100 + copy_index as u64 * 10 + format_index as u64;
                requests.push(RenderRequest {
                    format: format.clone(),
                    headline: copy.headline.clone(),
                    sub_headline: copy.sub_headline.clone(),
                    seed_offset: Some(seed_offset),
                    carousel: None,
                    asset_index: None,
                });
            }
        }
    }
    requests
}

/// Expands a carousel batch: formats outer, cards inner, so each format
/// yields a complete 1..=total sequence sharing the run's group id. Cards
/// cycle through the config's asset images by position.
pub fn expand_carousel(
    config: &GenerationConfig,
    cards: &[AdCopy],
    group_id: &str,
) -> Vec<RenderRequest> {
    let total = cards.len() as u32;
    let mut requests = Vec::new();
    for format in &config.formats {
        for (card_index, card) in cards.iter().enumerate() {
            let asset_index = if config.asset_images.is_empty() {
                None
            } else {
                Some(card_index % config.asset_images.len())
            };
            requests.push(RenderRequest {
                format: format.clone(),
                headline: card.headline.clone(),
                sub_headline: card.sub_headline.clone(),
                seed_offset: None,
                carousel: Some(CarouselSlot {
                    index: card_index as u32 + 1,
                    total,
                    group_id: group_id.to_string(),
                }),
                asset_index,
            });
        }
    }
    requests
}

/// Group id shared by every card of one carousel run, minted once from the
/// submission clock.
pub fn carousel_group_id(now_millis: i64) -> String {
    format!("carousel-{now_millis}")
}
