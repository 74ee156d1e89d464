use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use image::{ImageFormat, Rgb, RgbImage};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use adscale_contracts::batch::{
    carousel_group_id, expand_carousel, expand_single, GeneratedImage, RenderRequest,
};
use adscale_contracts::creative::{
    AdCopy, CarouselConfig, CarouselContent, CreativeAnalysis, CreativeMode, GenerationConfig,
    ImagePayload,
};
use adscale_contracts::events::{EventPayload, EventWriter};

pub const ANALYSIS_MODEL: &str = "gemini-3.1-pro-preview";
pub const PLAN_MODEL: &str = "gemini-3-flash-preview";
pub const RENDER_MODEL: &str = "gemini-3.1-flash-image-preview";
pub const QUICK_EDIT_MODEL: &str = "gemini-2.5-flash-image";
pub const CHAT_MODEL: &str = "gemini-3-flash-preview";

/// Every render call asks upstream for maximum resolution; the tier the
/// user picked only labels the run.
const RENDER_IMAGE_SIZE: &str = "4K";

const DEFAULT_ART_DIRECTION: &str = "Maintain aesthetic harmony and modern composition.";

const CHAT_SYSTEM_INSTRUCTION: &str =
    "You are Adscale, the studio's creative marketing assistant. Help with digital advertising \
     strategy, ad copy and campaign ideas. Keep answers short and practical.";

const ANALYSIS_INSTRUCTION: &str = r#"Analyze this advertising creative. Reply with a JSON object where EVERY field value is a plain STRING.
Fields: visualStyle, creativeType, implicitAudience, emotions, visualStructure, keyElements { person, object, text, background, dominantColors }, basePrompt (technical, in English)."#;

// ---------------------------------------------------------------------------
// Retry wrapper

/// Backoff schedule for transient upstream failures: `max_retries` extra
/// attempts, the first after `initial_delay`, doubling each time with no
/// ceiling. The defaults reproduce the studio's long-standing 2s/4s/8s
/// schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
        }
    }
}

/// Runs `op` until it succeeds, a non-transient error surfaces, or the
/// retry budget runs out. The last error is returned unmodified.
pub fn with_retry<T>(policy: &RetryPolicy, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut delay = policy.initial_delay;
    let mut remaining = policy.max_retries;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) => {
                if remaining == 0 || !is_transient_service_error(&err) {
                    return Err(err);
                }
                thread::sleep(delay);
                delay *= 2;
                remaining -= 1;
            }
        }
    }
}

/// Non-success HTTP status from the upstream service, kept typed so retry
/// classification can read the code instead of parsing a message.
#[derive(Debug)]
pub struct HttpStatusError {
    status: u16,
    body: String,
}

impl HttpStatusError {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }
}

impl fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upstream request failed ({}): {}", self.status, self.body)
    }
}

impl std::error::Error for HttpStatusError {}

/// A failure is worth retrying iff the upstream reported 503, the
/// transport timed out or could not connect, or the error text carries the
/// service's explicit overload markers.
pub fn is_transient_service_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(status) = cause.downcast_ref::<HttpStatusError>() {
            if status.status() == 503 {
                return true;
            }
        }
        if let Some(transport) = cause.downcast_ref::<reqwest::Error>() {
            if transport.is_timeout() || transport.is_connect() {
                return true;
            }
        }
        let text = cause.to_string();
        text.contains("UNAVAILABLE") || text.contains("Deadline expired")
    })
}

/// The upstream signals a revoked or mis-scoped credential with this exact
/// message; callers surface it as "pick another API key" instead of a
/// generic failure.
pub fn is_entitlement_error(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.to_string().contains("Requested entity was not found."))
}

// ---------------------------------------------------------------------------
// Backend seam

/// One `generateContent`-shaped call against a generative model. The
/// payload and response are the raw wire JSON; everything above this trait
/// is backend-agnostic.
pub trait GenerativeBackend: Send + Sync {
    fn name(&self) -> &str;

    fn generate_content(&self, model: &str, payload: &Value) -> Result<Value>;
}

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Live Gemini backend. The API key is injected at construction; nothing
/// here reads ambient state.
pub struct GeminiBackend {
    api_base: String,
    api_key: String,
    http: HttpClient,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_api_base(api_key, DEFAULT_API_BASE)
    }

    pub fn with_api_base(api_key: impl Into<String>, api_base: &str) -> Self {
        Self {
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http: HttpClient::new(),
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

impl GenerativeBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate_content(&self, model: &str, payload: &Value) -> Result<Value> {
        let endpoint = self.endpoint_for_model(model);
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(payload)
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        response_json_or_error("Gemini", response)
    }
}

/// Deterministic offline stand-in: canned analysis and plan payloads, flat
/// placeholder renders colored by a hash of the prompt. Lets the CLI and
/// tests exercise every path without a key or network.
pub struct DryrunBackend;

impl GenerativeBackend for DryrunBackend {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate_content(&self, _model: &str, payload: &Value) -> Result<Value> {
        let prompt = collect_text_parts(payload);
        let has_inline_image = payload_has_inline_image(payload);
        let wants_json = payload
            .pointer("/generationConfig/responseMimeType")
            .and_then(Value::as_str)
            == Some("application/json");
        let wants_image = payload.pointer("/generationConfig/imageConfig").is_some();

        if wants_json {
            if has_inline_image {
                return Ok(text_response(&dryrun_analysis_json()));
            }
            let count = first_integer(&prompt).unwrap_or(3);
            return Ok(text_response(&dryrun_plan_json(count)));
        }
        if wants_image || has_inline_image {
            let ratio = payload
                .pointer("/generationConfig/imageConfig/aspectRatio")
                .and_then(Value::as_str)
                .unwrap_or("1:1");
            let data = dryrun_png_base64(&prompt, ratio)?;
            return Ok(json!({
                "candidates": [{
                    "content": {
                        "parts": [{"inlineData": {"mimeType": "image/png", "data": data}}]
                    }
                }]
            }));
        }
        Ok(text_response(&format!(
            "(dryrun) {}",
            truncate_text(&prompt, 160)
        )))
    }
}

fn dryrun_analysis_json() -> String {
    json!({
        "visualStyle": "clean studio photography with soft gradients",
        "creativeType": "product advertisement",
        "implicitAudience": "young urban professionals",
        "emotions": "aspiration, trust",
        "visualStructure": "centered subject with generous negative space",
        "keyElements": {
            "person": "smiling presenter facing the camera",
            "object": "hero product on a pedestal",
            "text": "short benefit-led headline",
            "background": "single-color seamless backdrop",
            "dominantColors": "deep blue, warm white"
        },
        "basePrompt": "hero product centered on a softly lit seamless backdrop, studio lighting"
    })
    .to_string()
}

fn dryrun_plan_json(count: u64) -> String {
    let cards: Vec<Value> = (1..=count)
        .map(|index| {
            json!({
                "headline": format!("Card {index} headline"),
                "subHeadline": format!("Card {index} supporting line"),
            })
        })
        .collect();
    json!({ "cards": cards }).to_string()
}

fn dryrun_png_base64(prompt: &str, ratio: &str) -> Result<String> {
    let (width, height) = match ratio {
        "3:4" => (96, 128),
        "4:3" => (128, 96),
        "9:16" => (72, 128),
        "16:9" => (128, 72),
        _ => (96, 96),
    };
    let (r, g, b) = color_from_prompt(prompt);
    let mut image = RgbImage::new(width, height);
    for pixel in image.pixels_mut() {
        *pixel = Rgb([r, g, b]);
    }
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("failed to encode dryrun image")?;
    Ok(BASE64.encode(bytes))
}

fn color_from_prompt(prompt: &str) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

fn collect_text_parts(payload: &Value) -> String {
    let mut out = String::new();
    let contents = match payload.get("contents").and_then(Value::as_array) {
        Some(rows) => rows,
        None => return out,
    };
    for content in contents {
        let parts = content
            .get("parts")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for part in parts {
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
    }
    out
}

fn payload_has_inline_image(payload: &Value) -> bool {
    payload
        .get("contents")
        .and_then(Value::as_array)
        .map(|contents| {
            contents.iter().any(|content| {
                content
                    .get("parts")
                    .and_then(Value::as_array)
                    .map(|parts| parts.iter().any(|part| part.get("inlineData").is_some()))
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false)
}

fn first_integer(text: &str) -> Option<u64> {
    let mut digits = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else if !digits.is_empty() {
            break;
        }
    }
    digits.parse().ok()
}

fn text_response(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"parts": [{"text": text}]}
        }]
    })
}

// ---------------------------------------------------------------------------
// Studio engine

/// Model id per logical operation, overridable for previews and rollouts.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub analysis_model: String,
    pub plan_model: String,
    pub render_model: String,
    pub edit_model: String,
    pub chat_model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            analysis_model: ANALYSIS_MODEL.to_string(),
            plan_model: PLAN_MODEL.to_string(),
            render_model: RENDER_MODEL.to_string(),
            edit_model: QUICK_EDIT_MODEL.to_string(),
            chat_model: CHAT_MODEL.to_string(),
        }
    }
}

/// One chat exchange as the upstream API sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

/// The generation orchestration core: analysis, batch expansion, render
/// dispatch, quick edits and chat, all through one retry-wrapped backend.
pub struct StudioEngine {
    backend: Arc<dyn GenerativeBackend>,
    models: ModelConfig,
    retry: RetryPolicy,
    events: Option<EventWriter>,
}

impl StudioEngine {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self {
            backend,
            models: ModelConfig::default(),
            retry: RetryPolicy::default(),
            events: None,
        }
    }

    pub fn with_models(mut self, models: ModelConfig) -> Self {
        self.models = models;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Reads one reference creative into a structured analysis. The
    /// response must be valid JSON; an empty response falls back to an
    /// all-empty analysis the way an absent field would.
    pub fn analyze_image(&self, image: &ImagePayload) -> Result<CreativeAnalysis> {
        self.emit(
            "analysis_started",
            map_object(json!({"model": self.models.analysis_model})),
        )?;
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [inline_image_part(image), {"text": ANALYSIS_INSTRUCTION}]
            }],
            "generationConfig": {"responseMimeType": "application/json"}
        });
        let response = with_retry(&self.retry, || {
            self.backend
                .generate_content(&self.models.analysis_model, &payload)
        })?;
        let text = extract_text(&response);
        let source = if text.trim().is_empty() { "{}" } else { &text };
        let analysis: CreativeAnalysis = serde_json::from_str(source).with_context(|| {
            format!(
                "analysis response is not valid JSON: {}",
                truncate_text(&text, 200)
            )
        })?;
        self.emit(
            "analysis_completed",
            map_object(json!({"visualStyle": analysis.visual_style})),
        )?;
        Ok(analysis)
    }

    /// Expands the config into its full batch and renders it in order, one
    /// request at a time. A request whose retries are exhausted fails the
    /// whole batch; a request that comes back without an image is dropped
    /// silently. The result carries every image that was produced, in
    /// production order.
    pub fn generate_variations(
        &self,
        analysis: &CreativeAnalysis,
        config: &GenerationConfig,
        base_image: Option<&ImagePayload>,
    ) -> Result<Vec<GeneratedImage>> {
        config.validate()?;
        let (mode, requests) = match &config.mode {
            CreativeMode::Single { count } => ("single", expand_single(config, *count)),
            CreativeMode::Carousel { carousel } => {
                let group_id = carousel_group_id(Utc::now().timestamp_millis());
                let cards = self.resolve_carousel_cards(carousel)?;
                self.emit(
                    "carousel_planned",
                    map_object(json!({"groupId": group_id, "cards": cards.len()})),
                )?;
                ("carousel", expand_carousel(config, &cards, &group_id))
            }
        };
        self.emit(
            "batch_started",
            map_object(json!({"mode": mode, "requests": requests.len()})),
        )?;

        let mut results = Vec::new();
        for request in &requests {
            match self.render_image(analysis, config, request, base_image)? {
                Some(image) => {
                    self.emit(
                        "render_completed",
                        map_object(json!({
                            "id": image.id,
                            "label": image.label,
                            "carousel": image.carousel.as_ref().map(|slot| slot.index),
                        })),
                    )?;
                    results.push(image);
                }
                None => {
                    self.emit(
                        "render_dropped",
                        map_object(json!({"label": request.format.label})),
                    )?;
                }
            }
        }
        self.emit(
            "batch_finished",
            map_object(json!({"requested": requests.len(), "produced": results.len()})),
        )?;
        Ok(results)
    }

    fn resolve_carousel_cards(&self, carousel: &CarouselConfig) -> Result<Vec<AdCopy>> {
        match &carousel.content {
            CarouselContent::PerCard { cards } => Ok(cards.clone()),
            CarouselContent::CentralIdea { idea } => {
                if idea.trim().is_empty() {
                    return Ok(Vec::new());
                }
                self.plan_carousel(idea, carousel)
            }
        }
    }

    /// Asks the planning model to script the carousel. A response that
    /// cannot be read as a card list degrades to no cards at all; the
    /// batch then renders nothing instead of failing.
    fn plan_carousel(&self, idea: &str, carousel: &CarouselConfig) -> Result<Vec<AdCopy>> {
        let prompt = format!(
            "Create a carousel script with {count} cards about: \"{idea}\".\n\
             Goal: {goal}.\n\
             Return JSON: cards: [{{headline: string, subHeadline: string}}].",
            count = carousel.card_count,
            goal = carousel.goal.as_str(),
        );
        let payload = json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
            "generationConfig": {"responseMimeType": "application/json"}
        });
        let response = with_retry(&self.retry, || {
            self.backend
                .generate_content(&self.models.plan_model, &payload)
        })?;
        Ok(parse_plan_cards(&extract_text(&response)))
    }

    /// Renders one atomic request. `Ok(None)` means the model answered
    /// without an image; the unit is simply dropped.
    pub fn render_image(
        &self,
        analysis: &CreativeAnalysis,
        config: &GenerationConfig,
        request: &RenderRequest,
        base_image: Option<&ImagePayload>,
    ) -> Result<Option<GeneratedImage>> {
        let prompt = build_render_prompt(analysis, config, request, Utc::now().timestamp_millis());
        let parts = render_parts(config, request, base_image, &prompt);
        let payload = json!({
            "contents": [{"role": "user", "parts": parts}],
            "generationConfig": {
                "imageConfig": {
                    "aspectRatio": request.format.ratio.wire_str(),
                    "imageSize": RENDER_IMAGE_SIZE,
                }
            }
        });
        let response = with_retry(&self.retry, || {
            self.backend
                .generate_content(&self.models.render_model, &payload)
        })?;
        Ok(extract_inline_image(&response).map(|image| {
            GeneratedImage::new(image, prompt, &request.format, request.carousel.clone())
        }))
    }

    /// One-shot edit of an existing creative. `Ok(None)` when the model
    /// returned no image.
    pub fn quick_edit(
        &self,
        image: &ImagePayload,
        instruction: &str,
    ) -> Result<Option<ImagePayload>> {
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [inline_image_part(image), {"text": instruction}]
            }]
        });
        let response = with_retry(&self.retry, || {
            self.backend
                .generate_content(&self.models.edit_model, &payload)
        })?;
        let result = extract_inline_image(&response);
        if result.is_some() {
            self.emit(
                "edit_applied",
                map_object(json!({"instruction": truncate_text(instruction, 120)})),
            )?;
        }
        Ok(result)
    }

    /// Free-form assistant turn with prior history.
    pub fn chat(&self, message: &str, history: &[ChatTurn]) -> Result<String> {
        let mut contents: Vec<Value> = history
            .iter()
            .map(|turn| {
                json!({
                    "role": turn.role.as_str(),
                    "parts": [{"text": turn.text}]
                })
            })
            .collect();
        contents.push(json!({"role": "user", "parts": [{"text": message}]}));
        let payload = json!({
            "contents": contents,
            "systemInstruction": {"parts": [{"text": CHAT_SYSTEM_INSTRUCTION}]}
        });
        let response = with_retry(&self.retry, || {
            self.backend
                .generate_content(&self.models.chat_model, &payload)
        })?;
        let reply = extract_text(&response);
        self.emit("chat_turn", map_object(json!({"chars": reply.len()})))?;
        Ok(reply)
    }

    fn emit(&self, event_type: &str, payload: EventPayload) -> Result<()> {
        if let Some(events) = &self.events {
            events.emit(event_type, payload)?;
        }
        Ok(())
    }
}

/// Composite prompt for one render: fixed identity-fidelity preamble, the
/// overlay copy, art direction (with a neutral default), the analyzed
/// style and scene, a per-unit variation seed, and a continuity line for
/// carousel cards.
fn build_render_prompt(
    analysis: &CreativeAnalysis,
    config: &GenerationConfig,
    request: &RenderRequest,
    now_millis: i64,
) -> String {
    let art_direction = if config.complementary_prompt.trim().is_empty() {
        DEFAULT_ART_DIRECTION
    } else {
        config.complementary_prompt.as_str()
    };
    let seed = now_millis + request.seed_offset.unwrap_or(0) as i64;
    let mut prompt = format!(
        r#"SENIOR ART DIRECTOR & AD STRATEGIST.
PRIMARY OBJECTIVE: Create a high-performance conversion ad image with ABSOLUTE IDENTITY FIDELITY.

CRITICAL INSTRUCTION: The person/subject in the reference image MUST be 100% identical in the new composition. Maintain every facial feature, expression, and unique characteristic. DO NOT alter the person's identity.

TEXT OVERLAY (render exactly as written):
- Headline: "{headline}"
- Sub-headline: "{sub_headline}"

ART DIRECTION INSTRUCTIONS: "{art_direction}"

STYLE REFERENCE: {style}.
SCENE CONTEXT: {scene}.
VARIATION SEED: {seed}"#,
        headline = request.headline,
        sub_headline = request.sub_headline,
        art_direction = art_direction,
        style = analysis.visual_style,
        scene = analysis.base_prompt,
        seed = seed,
    );
    if let Some(slot) = &request.carousel {
        prompt.push_str(&format!(
            "\n\nCAROUSEL SPECIFIC: Card {} of {}. Ensure visual continuity with the rest of the sequence.",
            slot.index, slot.total
        ));
    }
    prompt
}

/// Image parts in their fixed order: the expansion's asset pick, else a
/// seed-driven round-robin over the config assets, else nothing; then the
/// logo; then the reference image, but only when no assets exist; the
/// prompt text always closes the list.
fn render_parts(
    config: &GenerationConfig,
    request: &RenderRequest,
    base_image: Option<&ImagePayload>,
    prompt: &str,
) -> Vec<Value> {
    let mut parts = Vec::new();
    let picked = request
        .asset_index
        .and_then(|index| config.asset_images.get(index));
    if let Some(asset) = picked {
        parts.push(inline_image_part(asset));
    } else if !config.asset_images.is_empty() {
        let index = request.seed_offset.unwrap_or(0) as usize % config.asset_images.len();
        parts.push(inline_image_part(&config.asset_images[index]));
    }
    if let Some(logo) = &config.logo_image {
        parts.push(inline_image_part(logo));
    }
    if config.asset_images.is_empty() {
        if let Some(base) = base_image {
            parts.push(inline_image_part(base));
        }
    }
    parts.push(json!({"text": prompt}));
    parts
}

fn parse_plan_cards(text: &str) -> Vec<AdCopy> {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|value| value.get("cards").cloned())
        .and_then(|cards| serde_json::from_value::<Vec<AdCopy>>(cards).ok())
        .unwrap_or_default()
}

fn inline_image_part(image: &ImagePayload) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": image.data,
        }
    })
}

/// Concatenated text of the first candidate, the way the upstream SDK's
/// `response.text` reads.
fn extract_text(response: &Value) -> String {
    let mut out = String::new();
    let parts = response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.pointer("/content/parts"))
        .and_then(Value::as_array);
    if let Some(parts) = parts {
        for part in parts {
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
        }
    }
    out
}

/// First inline image of the first candidate, if any.
fn extract_inline_image(response: &Value) -> Option<ImagePayload> {
    let parts = response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.pointer("/content/parts"))
        .and_then(Value::as_array)?;
    for part in parts {
        let inline = match part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(Value::as_object)
        {
            Some(inline) => inline,
            None => continue,
        };
        let data = inline.get("data").and_then(Value::as_str).unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .unwrap_or("image/png");
        return Some(ImagePayload::new(mime_type, data));
    }
    None
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        return Err(
            anyhow::Error::new(HttpStatusError::new(code, truncate_text(&body, 512)))
                .context(format!("{provider} request rejected")),
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
