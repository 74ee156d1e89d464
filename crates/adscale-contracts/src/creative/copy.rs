use serde::{Deserialize, Serialize};

/// One headline / sub-headline pair to overlay on a creative. Configs carry
/// an ordered list of these; the position in that list feeds seed
/// derivation, so order is meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AdCopy {
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub sub_headline: String,
}

impl AdCopy {
    pub fn new(headline: impl Into<String>, sub_headline: impl Into<String>) -> Self {
        Self {
            headline: headline.into(),
            sub_headline: sub_headline.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.headline.trim().is_empty() && self.sub_headline.trim().is_empty()
    }
}
