use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Presentation ratios the studio can request. The upstream render API
/// understands a narrower vocabulary, so `wire_str` squeezes `4:5` to the
/// nearest supported shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Vertical,
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "9:16")]
    Story,
    #[serde(rename = "16:9")]
    Banner,
    #[serde(rename = "4:5")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Vertical => "3:4",
            AspectRatio::Landscape => "4:3",
            AspectRatio::Story => "9:16",
            AspectRatio::Banner => "16:9",
            AspectRatio::Portrait => "4:5",
        }
    }

    /// Ratio string sent upstream. `4:5` is not in the render API's
    /// vocabulary and maps to `3:4`; everything else passes through.
    pub fn wire_str(&self) -> &'static str {
        match self {
            AspectRatio::Portrait => "3:4",
            other => other.as_str(),
        }
    }

    pub fn parse(value: &str) -> anyhow::Result<Self> {
        match value {
            "1:1" => Ok(AspectRatio::Square),
            "3:4" => Ok(AspectRatio::Vertical),
            "4:3" => Ok(AspectRatio::Landscape),
            "9:16" => Ok(AspectRatio::Story),
            "16:9" => Ok(AspectRatio::Banner),
            "4:5" => Ok(AspectRatio::Portrait),
            other => anyhow::bail!("unknown aspect ratio: {other}"),
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derives the nearest supported ratio for a free-form pixel size:
/// wider than 1.2 is a banner, narrower than 0.8 is a story, anything in
/// between (both boundaries included) renders square.
pub fn ratio_for_dimensions(width: u32, height: u32) -> AspectRatio {
    let ratio = width as f64 / height.max(1) as f64;
    if ratio > 1.2 {
        AspectRatio::Banner
    } else if ratio < 0.8 {
        AspectRatio::Story
    } else {
        AspectRatio::Square
    }
}

/// One output format requested for a generation batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedFormat {
    pub id: String,
    pub ratio: AspectRatio,
    pub label: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub is_custom: bool,
}

impl RequestedFormat {
    /// Standard platform format, e.g. `preset(AspectRatio::Story, "Story")`
    /// labelled `Story (9:16)`.
    pub fn preset(ratio: AspectRatio, name: &str) -> Self {
        Self {
            id: format!("std-{}", Utc::now().timestamp_millis()),
            ratio,
            label: format!("{name} ({ratio})"),
            width: None,
            height: None,
            is_custom: false,
        }
    }

    /// Free pixel-size format; the ratio is derived from the dimensions and
    /// the label is the literal size.
    pub fn custom(width: u32, height: u32) -> Self {
        Self {
            id: format!("cust-{}", Utc::now().timestamp_millis()),
            ratio: ratio_for_dimensions(width, height),
            label: format!("{width}x{height}"),
            width: Some(width),
            height: Some(height),
            is_custom: true,
        }
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ratio_for_dimensions, AspectRatio, RequestedFormat};

    #[test]
    fn wire_ratio_squeezes_four_five() {
        assert_eq!(AspectRatio::Portrait.wire_str(), "3:4");
        assert_eq!(AspectRatio::Square.wire_str(), "1:1");
        assert_eq!(AspectRatio::Banner.wire_str(), "16:9");
    }

    #[test]
    fn ratio_parse_round_trips_every_variant() -> anyhow::Result<()> {
        for ratio in [
            AspectRatio::Square,
            AspectRatio::Vertical,
            AspectRatio::Landscape,
            AspectRatio::Story,
            AspectRatio::Banner,
            AspectRatio::Portrait,
        ] {
            assert_eq!(AspectRatio::parse(ratio.as_str())?, ratio);
        }
        assert!(AspectRatio::parse("2:1").is_err());
        Ok(())
    }

    #[test]
    fn custom_dimension_rule_picks_nearest_shape() {
        assert_eq!(ratio_for_dimensions(1920, 1080), AspectRatio::Banner);
        assert_eq!(ratio_for_dimensions(1080, 1920), AspectRatio::Story);
        assert_eq!(ratio_for_dimensions(1000, 1000), AspectRatio::Square);
        // Boundaries land on square.
        assert_eq!(ratio_for_dimensions(1200, 1000), AspectRatio::Square);
        assert_eq!(ratio_for_dimensions(800, 1000), AspectRatio::Square);
        assert_eq!(ratio_for_dimensions(1201, 1000), AspectRatio::Banner);
        assert_eq!(ratio_for_dimensions(799, 1000), AspectRatio::Story);
    }

    #[test]
    fn custom_format_carries_dimensions_and_label() {
        let format = RequestedFormat::custom(800, 600);
        assert_eq!(format.label, "800x600");
        assert_eq!(format.ratio, AspectRatio::Banner);
        assert_eq!(format.dimensions(), Some((800, 600)));
        assert!(format.is_custom);
        assert!(format.id.starts_with("cust-"));
    }

    #[test]
    fn preset_format_has_no_dimensions() {
        let format = RequestedFormat::preset(AspectRatio::Square, "Feed");
        assert_eq!(format.label, "Feed (1:1)");
        assert_eq!(format.dimensions(), None);
        assert!(!format.is_custom);
    }
}
