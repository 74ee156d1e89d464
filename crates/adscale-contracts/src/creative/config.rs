use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::carousel::CarouselConfig;
use super::copy::AdCopy;
use super::formats::RequestedFormat;

/// How the new creatives relate to the analyzed reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvolutionType {
    FromScratch,
    #[default]
    Replicate,
    ReplicateWithChanges,
}

/// Resolution tier the user picked. Recorded with the run; the render
/// call itself always asks upstream for the maximum size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ResolutionTier {
    #[default]
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl ResolutionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionTier::OneK => "1K",
            ResolutionTier::TwoK => "2K",
            ResolutionTier::FourK => "4K",
        }
    }
}

/// Self-describing embedded image: mime type plus raw base64 payload.
/// The wire shape matches the upstream `inlineData` part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub mime_type: String,
    pub data: String,
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: BASE64.encode(bytes),
        }
    }

    /// Parses a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> anyhow::Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .with_context(|| format!("not a data url: {}", truncated(url)))?;
        let (header, data) = rest
            .split_once(',')
            .with_context(|| format!("data url has no payload: {}", truncated(url)))?;
        let mime_type = header
            .strip_suffix(";base64")
            .with_context(|| format!("data url is not base64 encoded: {}", truncated(url)))?;
        Ok(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn decode(&self) -> anyhow::Result<Vec<u8>> {
        BASE64
            .decode(self.data.as_bytes())
            .context("image payload is not valid base64")
    }
}

fn truncated(value: &str) -> String {
    if value.chars().count() <= 48 {
        return value.to_string();
    }
    value.chars().take(48).collect::<String>() + "…"
}

/// The shape of one run: a batch of independent single creatives or one
/// carousel sequence. Expansion switches on this tag exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "creativeType")]
pub enum CreativeMode {
    #[serde(rename = "SINGLE")]
    Single {
        #[serde(default = "default_variant_count")]
        count: u32,
    },
    #[serde(rename = "CAROUSEL")]
    Carousel {
        #[serde(rename = "carouselConfig")]
        carousel: CarouselConfig,
    },
}

fn default_variant_count() -> u32 {
    3
}

/// Immutable snapshot of everything a generation batch needs. Built once
/// by the caller and handed to the engine; nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default)]
    pub evolution_type: EvolutionType,
    #[serde(flatten)]
    pub mode: CreativeMode,
    pub copies: Vec<AdCopy>,
    #[serde(default)]
    pub complementary_prompt: String,
    pub formats: Vec<RequestedFormat>,
    #[serde(default)]
    pub size: ResolutionTier,
    #[serde(default)]
    pub asset_images: Vec<ImagePayload>,
    #[serde(default)]
    pub logo_image: Option<ImagePayload>,
}

impl GenerationConfig {
    /// A batch needs at least one copy variant and one output format.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.copies.is_empty() {
            anyhow::bail!("generation config needs at least one copy variant");
        }
        if self.formats.is_empty() {
            anyhow::bail!("generation config needs at least one output format");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CreativeMode, GenerationConfig, ImagePayload, ResolutionTier};
    use crate::creative::carousel::CarouselContent;
    use crate::creative::{AdCopy, AspectRatio, EvolutionType, RequestedFormat};

    #[test]
    fn data_url_round_trip() -> anyhow::Result<()> {
        let payload = ImagePayload::from_bytes("image/jpeg", b"fake-jpeg-bytes");
        let url = payload.to_data_url();
        assert!(url.starts_with("data:image/jpeg;base64,"));
        let parsed = ImagePayload::from_data_url(&url)?;
        assert_eq!(parsed, payload);
        assert_eq!(parsed.decode()?, b"fake-jpeg-bytes");
        Ok(())
    }

    #[test]
    fn malformed_data_urls_are_rejected() {
        assert!(ImagePayload::from_data_url("http://example.com/a.png").is_err());
        assert!(ImagePayload::from_data_url("data:image/png").is_err());
        assert!(ImagePayload::from_data_url("data:image/png;base32,abcd").is_err());
    }

    #[test]
    fn single_mode_uses_creative_type_tag() -> anyhow::Result<()> {
        let mode: CreativeMode = serde_json::from_str(r#"{"creativeType":"SINGLE","count":2}"#)?;
        assert_eq!(mode, CreativeMode::Single { count: 2 });
        Ok(())
    }

    #[test]
    fn full_config_file_parses() -> anyhow::Result<()> {
        let config: GenerationConfig = serde_json::from_str(
            r#"{
                "evolutionType": "REPLICATE_WITH_CHANGES",
                "creativeType": "CAROUSEL",
                "carouselConfig": {
                    "cardCount": 4,
                    "goal": "STORYTELLING",
                    "style": "CONSISTENT",
                    "contentOption": "CENTRAL_IDEA",
                    "centralIdea": "Launching the spring collection"
                },
                "copies": [{"headline": "New season", "subHeadline": "Now live"}],
                "complementaryPrompt": "Warm light, pastel palette",
                "formats": [
                    {"id": "std-1", "ratio": "4:5", "label": "Portrait (4:5)", "isCustom": false}
                ],
                "size": "2K"
            }"#,
        )?;

        assert_eq!(config.evolution_type, EvolutionType::ReplicateWithChanges);
        assert_eq!(config.size, ResolutionTier::TwoK);
        assert!(config.asset_images.is_empty());
        assert!(config.logo_image.is_none());
        let CreativeMode::Carousel { carousel } = &config.mode else {
            panic!("expected carousel mode");
        };
        assert_eq!(carousel.card_count, 4);
        assert!(matches!(
            carousel.content,
            CarouselContent::CentralIdea { .. }
        ));
        assert_eq!(config.formats[0].ratio, AspectRatio::Portrait);
        config.validate()?;
        Ok(())
    }

    #[test]
    fn validation_requires_copies_and_formats() {
        let config = GenerationConfig {
            evolution_type: EvolutionType::Replicate,
            mode: CreativeMode::Single { count: 1 },
            copies: vec![],
            complementary_prompt: String::new(),
            formats: vec![RequestedFormat::preset(AspectRatio::Square, "Feed")],
            size: ResolutionTier::OneK,
            asset_images: vec![],
            logo_image: None,
        };
        assert!(config.validate().is_err());

        let config = GenerationConfig {
            copies: vec![AdCopy::new("Hi", "")],
            formats: vec![],
            ..config
        };
        assert!(config.validate().is_err());
    }
}
