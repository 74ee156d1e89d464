use serde::{Deserialize, Serialize};

use super::copy::AdCopy;

pub const MIN_CARD_COUNT: u32 = 1;
pub const MAX_CARD_COUNT: u32 = 20;

/// Narrative objective of a carousel run. The wire name is embedded
/// verbatim in the planning prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CarouselGoal {
    #[default]
    Educate,
    Storytelling,
    Authority,
    Offer,
    DirectConversion,
}

impl CarouselGoal {
    pub fn as_str(&self) -> &'static str {
        match self {
            CarouselGoal::Educate => "EDUCATE",
            CarouselGoal::Storytelling => "STORYTELLING",
            CarouselGoal::Authority => "AUTHORITY",
            CarouselGoal::Offer => "OFFER",
            CarouselGoal::DirectConversion => "DIRECT_CONVERSION",
        }
    }
}

/// Visual treatment across cards. Advisory; recorded with the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CarouselStyle {
    #[default]
    Consistent,
    Alternating,
    Evolutionary,
}

/// Where the card copy comes from: a central idea the planning model
/// expands into a script, or explicit per-card copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "contentOption")]
pub enum CarouselContent {
    #[serde(rename = "CENTRAL_IDEA")]
    CentralIdea {
        #[serde(rename = "centralIdea", default)]
        idea: String,
    },
    #[serde(rename = "PER_CARD")]
    PerCard {
        #[serde(rename = "perCardContent", default)]
        cards: Vec<AdCopy>,
    },
}

impl Default for CarouselContent {
    fn default() -> Self {
        CarouselContent::CentralIdea {
            idea: String::new(),
        }
    }
}

/// Advisory optimization flags. They travel with the config and are
/// recorded with the run; nothing downstream branches on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CarouselOptimizations {
    pub retention: bool,
    pub cta: bool,
    pub balance: bool,
    pub adaptation: bool,
}

impl Default for CarouselOptimizations {
    fn default() -> Self {
        Self {
            retention: true,
            cta: true,
            balance: true,
            adaptation: true,
        }
    }
}

/// Carousel shape for one generation run.
///
/// `card_count` drives the planning prompt; under explicit per-card
/// content the rendered total is the card list length, which
/// `set_card_count` grows with blank cards but never truncates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarouselConfig {
    #[serde(deserialize_with = "clamped_card_count")]
    pub card_count: u32,
    #[serde(default)]
    pub goal: CarouselGoal,
    #[serde(default)]
    pub style: CarouselStyle,
    #[serde(flatten)]
    pub content: CarouselContent,
    #[serde(default)]
    pub optimizations: CarouselOptimizations,
}

impl CarouselConfig {
    pub fn new(
        card_count: u32,
        goal: CarouselGoal,
        style: CarouselStyle,
        content: CarouselContent,
    ) -> Self {
        Self {
            card_count: card_count.clamp(MIN_CARD_COUNT, MAX_CARD_COUNT),
            goal,
            style,
            content,
            optimizations: CarouselOptimizations::default(),
        }
    }

    /// Changes the requested card count, padding explicit per-card copy
    /// with blank cards when the count grows. Shrinking the count leaves
    /// already-authored cards untouched.
    pub fn set_card_count(&mut self, count: u32) {
        self.card_count = count.clamp(MIN_CARD_COUNT, MAX_CARD_COUNT);
        if let CarouselContent::PerCard { cards } = &mut self.content {
            while (cards.len() as u32) < self.card_count {
                cards.push(AdCopy::default());
            }
        }
    }
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            card_count: 3,
            goal: CarouselGoal::default(),
            style: CarouselStyle::default(),
            content: CarouselContent::default(),
            optimizations: CarouselOptimizations::default(),
        }
    }
}

fn clamped_card_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = u32::deserialize(deserializer)?;
    Ok(value.clamp(MIN_CARD_COUNT, MAX_CARD_COUNT))
}

/// Membership of one generated image in a carousel run: 1-based position,
/// resolved card total and the group id shared by the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarouselSlot {
    pub index: u32,
    pub total: u32,
    pub group_id: String,
}
