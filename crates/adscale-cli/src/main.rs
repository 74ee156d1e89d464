use std::env;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use adscale_contracts::batch::{group_gallery, GeneratedImage};
use adscale_contracts::creative::{CreativeAnalysis, GenerationConfig, ImagePayload};
use adscale_contracts::events::{fresh_run_id, EventWriter};
use adscale_contracts::session::StudioSession;
use adscale_engine::{
    is_entitlement_error, ChatTurn, DryrunBackend, GeminiBackend, GenerativeBackend, ModelConfig,
    StudioEngine,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

#[derive(Debug, Parser)]
#[command(name = "adscale", version, about = "Adscale creative generation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Analyze(AnalyzeArgs),
    Generate(GenerateArgs),
    Edit(EditArgs),
    Chat(ChatArgs),
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    /// Reference creative to analyze.
    #[arg(long)]
    image: PathBuf,
    /// Write the analysis JSON here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    dryrun: bool,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    /// Reference creative the batch evolves from.
    #[arg(long)]
    image: PathBuf,
    /// Generation config JSON (copies, formats, mode, prompts).
    #[arg(long)]
    config: PathBuf,
    /// Reuse a saved analysis instead of re-analyzing the reference.
    #[arg(long)]
    analysis: Option<PathBuf>,
    /// Extra asset image, repeatable. Appended to the config's assets.
    #[arg(long)]
    asset: Vec<PathBuf>,
    /// Logo image. Overrides the config's logo.
    #[arg(long)]
    logo: Option<PathBuf>,
    /// Output directory for artifacts and manifest.json.
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    render_model: Option<String>,
    #[arg(long)]
    dryrun: bool,
}

#[derive(Debug, Parser)]
struct EditArgs {
    /// Image to edit.
    #[arg(long)]
    image: PathBuf,
    /// Edit instruction, e.g. "make the background teal".
    #[arg(long)]
    prompt: String,
    /// Where to write the edited image.
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    dryrun: bool,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    dryrun: bool,
}

const REFERENCE_IMAGE_MAX_DIM: u32 = 1024;
const REFERENCE_JPEG_QUALITY: u8 = 90;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("adscale error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Analyze(args) => run_analyze(args),
        Command::Generate(args) => run_generate(args),
        Command::Edit(args) => run_edit(args),
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
    }
}

fn run_analyze(args: AnalyzeArgs) -> Result<i32> {
    let mut models = ModelConfig::default();
    if let Some(model) = args.model {
        models.analysis_model = model;
    }
    let engine = build_engine(args.dryrun, args.events.as_deref(), models)?;

    let image = load_reference_image(&args.image, REFERENCE_IMAGE_MAX_DIM)?;
    let analysis = explain_entitlement_error(engine.analyze_image(&image))?;
    let rendered = serde_json::to_string_pretty(&analysis)?;
    match args.out {
        Some(path) => {
            fs::write(&path, format!("{rendered}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote analysis to {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(0)
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let mut models = ModelConfig::default();
    if let Some(model) = args.render_model {
        models.render_model = model;
    }
    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create {}", args.out.display()))?;
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let engine = build_engine(args.dryrun, Some(&events_path), models)?;

    let mut config = load_generation_config(&args.config)?;
    for path in &args.asset {
        config.asset_images.push(load_raw_image(path)?);
    }
    if let Some(path) = &args.logo {
        config.logo_image = Some(load_raw_image(path)?);
    }

    let base_image = load_reference_image(&args.image, REFERENCE_IMAGE_MAX_DIM)?;
    let analysis = match &args.analysis {
        Some(path) => load_analysis(path)?,
        None => {
            println!("Analyzing {}", args.image.display());
            explain_entitlement_error(engine.analyze_image(&base_image))?
        }
    };

    let results = explain_entitlement_error(engine.generate_variations(
        &analysis,
        &config,
        Some(&base_image),
    ))?;
    if results.is_empty() {
        bail!("the batch produced no images; every render came back without one");
    }

    let mut session = StudioSession::new();
    session.begin(base_image, analysis);
    session.record_results(results);

    let manifest = export_gallery(session.images(), &args.out)?;
    let manifest_path = args.out.join("manifest.json");
    fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)? + "\n")
        .with_context(|| format!("failed to write {}", manifest_path.display()))?;

    let group_count = manifest["groups"]
        .as_array()
        .map(|groups| groups.len())
        .unwrap_or_default();
    println!(
        "Exported {} image(s) in {} group(s) to {}",
        session.images().len(),
        group_count,
        args.out.display()
    );
    Ok(0)
}

fn run_edit(args: EditArgs) -> Result<i32> {
    let mut models = ModelConfig::default();
    if let Some(model) = args.model {
        models.edit_model = model;
    }
    let engine = build_engine(args.dryrun, args.events.as_deref(), models)?;

    let image = load_raw_image(&args.image)?;
    let edited = explain_entitlement_error(engine.quick_edit(&image, &args.prompt))?
        .context("the model returned no edited image")?;
    let bytes = edited.decode()?;
    fs::write(&args.out, &bytes)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    println!("Wrote edited image to {}", args.out.display());
    Ok(0)
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let mut models = ModelConfig::default();
    if let Some(model) = args.model {
        models.chat_model = model;
    }
    let engine = build_engine(args.dryrun, args.events.as_deref(), models)?;

    let stdin = io::stdin();
    let mut line = String::new();
    let mut history: Vec<ChatTurn> = Vec::new();

    println!(
        "Adscale chat started ({}). Type /help for commands.",
        engine.backend_name()
    );

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match input {
            "/quit" | "/exit" => break,
            "/help" => {
                println!("Commands: /help /reset /quit");
                continue;
            }
            "/reset" => {
                history.clear();
                println!("Conversation cleared.");
                continue;
            }
            _ => {}
        }

        match explain_entitlement_error(engine.chat(input, &history)) {
            Ok(reply) => {
                println!("{reply}");
                history.push(ChatTurn::user(input));
                history.push(ChatTurn::model(&reply));
            }
            Err(err) => eprintln!("chat failed: {err:#}"),
        }
    }

    Ok(())
}

fn build_engine(dryrun: bool, events: Option<&Path>, models: ModelConfig) -> Result<StudioEngine> {
    let backend = build_backend(dryrun)?;
    let mut engine = StudioEngine::new(backend).with_models(models);
    if let Some(path) = events {
        engine = engine.with_events(EventWriter::new(path, fresh_run_id()));
    }
    Ok(engine)
}

fn build_backend(dryrun: bool) -> Result<Arc<dyn GenerativeBackend>> {
    if dryrun {
        return Ok(Arc::new(DryrunBackend));
    }
    let api_key = resolve_api_key()?;
    let backend = match env::var("ADSCALE_API_BASE") {
        Ok(base) if !base.trim().is_empty() => GeminiBackend::with_api_base(&api_key, base.trim()),
        _ => GeminiBackend::new(&api_key),
    };
    Ok(Arc::new(backend))
}

fn resolve_api_key() -> Result<String> {
    for key in ["GEMINI_API_KEY", "GOOGLE_API_KEY"] {
        if let Ok(value) = env::var(key) {
            if !value.trim().is_empty() {
                return Ok(value.trim().to_string());
            }
        }
    }
    bail!("no API key found; set GEMINI_API_KEY or GOOGLE_API_KEY, or pass --dryrun")
}

fn explain_entitlement_error<T>(result: Result<T>) -> Result<T> {
    match result {
        Err(err) if is_entitlement_error(&err) => Err(err.context(
            "the configured API key cannot access these models; switch keys and retry",
        )),
        other => other,
    }
}

fn load_generation_config(path: &Path) -> Result<GenerationConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: GenerationConfig = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid generation config", path.display()))?;
    Ok(config)
}

fn load_analysis(path: &Path) -> Result<CreativeAnalysis> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let analysis: CreativeAnalysis = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid analysis", path.display()))?;
    Ok(analysis)
}

/// Reads an asset or edit input as-is. Assets keep their bytes (and any
/// transparency) untouched.
fn load_raw_image(path: &Path) -> Result<ImagePayload> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(ImagePayload::from_bytes(guess_image_mime(path), &bytes))
}

/// Normalizes a reference creative before upload: bounded to `max_dim` on
/// the long edge and re-encoded as JPEG. Inputs the image crate cannot
/// decode pass through untouched.
fn load_reference_image(path: &Path, max_dim: u32) -> Result<ImagePayload> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let Ok(decoded) = image::load_from_memory(&bytes) else {
        return Ok(ImagePayload::from_bytes(guess_image_mime(path), &bytes));
    };
    let bounded = if decoded.width().max(decoded.height()) > max_dim {
        decoded.resize(max_dim, max_dim, FilterType::Triangle)
    } else {
        decoded
    };
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, REFERENCE_JPEG_QUALITY)
        .encode_image(&DynamicImage::ImageRgb8(bounded.to_rgb8()))
        .context("failed to re-encode the reference image")?;
    Ok(ImagePayload::from_bytes("image/jpeg", &jpeg))
}

fn guess_image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "heic" | "heif" => "image/heic",
        _ => "image/png",
    }
}

/// Writes every artifact into `out_dir` and returns the manifest value,
/// grouped the way the gallery groups them: carousels first by appearance,
/// standalones under one bucket.
fn export_gallery(images: &[GeneratedImage], out_dir: &Path) -> Result<Value> {
    let groups = group_gallery(images);
    let mut manifest_groups = Vec::new();
    for (group_id, members) in &groups {
        let mut entries = Vec::new();
        for image in members {
            let bytes = image
                .image
                .decode()
                .with_context(|| format!("artifact {} holds undecodable image data", image.id))?;
            let file_name = format!(
                "adscale-{}.{}",
                image.id,
                extension_for_mime(&image.image.mime_type)
            );
            fs::write(out_dir.join(&file_name), &bytes)
                .with_context(|| format!("failed to write {file_name}"))?;
            entries.push(manifest_entry(image, &file_name, &bytes));
        }
        manifest_groups.push(json!({"group": group_id, "images": entries}));
    }
    Ok(json!({
        "exportedAt": now_millis(),
        "total": images.len(),
        "groups": manifest_groups,
    }))
}

fn manifest_entry(image: &GeneratedImage, file_name: &str, bytes: &[u8]) -> Value {
    json!({
        "id": image.id,
        "file": file_name,
        "prompt": image.prompt,
        "label": image.label,
        "aspectRatio": image.aspect_ratio,
        "dimensions": image.dimensions,
        "timestamp": image.timestamp,
        "carousel": image.carousel,
        "sha256": content_hash(bytes),
    })
}

fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
