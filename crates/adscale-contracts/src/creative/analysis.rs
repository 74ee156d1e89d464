use serde::{Deserialize, Serialize};

/// Structured reading of one reference advertisement, produced by the
/// analysis model and reused verbatim by every render prompt afterwards.
///
/// The upstream model is asked for exactly these camelCase keys with plain
/// string values. Absent or extra keys are tolerated on parse; presence is
/// never validated locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CreativeAnalysis {
    pub visual_style: String,
    pub creative_type: String,
    pub implicit_audience: String,
    pub emotions: String,
    pub visual_structure: String,
    pub key_elements: KeyElements,
    pub base_prompt: String,
}

/// Salient elements the analysis model picked out of the reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyElements {
    pub person: Option<String>,
    pub object: Option<String>,
    pub text: Option<String>,
    pub background: Option<String>,
    pub dominant_colors: Option<String>,
}
