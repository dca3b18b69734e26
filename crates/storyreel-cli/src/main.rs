//! Storyreel CLI
//!
//! Headless driver for the storyboard engine: reads script parts from files,
//! analyzes them into scenes and characters, generates every image under the
//! configured concurrency cap, and optionally animates completed scenes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use storyreel_core::core::analysis::{AnalysisResult, CharacterAnalysis, SceneAnalysis};
use storyreel_core::core::engine::StoryboardEngine;
use storyreel_core::core::events::EngineEvent;
use storyreel_core::core::generative::{
    AspectRatio, GeminiClient, GenerationClient, ImageEngine, MockGenerationClient, Resolution,
    VideoSettings,
};
use storyreel_core::core::settings::GenerationSettings;

#[derive(Parser, Debug)]
#[command(name = "storyreel")]
#[command(about = "Script-to-storyboard generation pipeline", long_about = None)]
struct Args {
    /// Script part files; the first part is the intro (the story's hook)
    #[arg(required = true)]
    scripts: Vec<String>,

    /// Number of scenes to request from analysis
    #[arg(long, default_value_t = 20)]
    target_scenes: u32,

    /// Maximum concurrent image generation calls
    #[arg(long, default_value_t = 3)]
    concurrency: usize,

    /// Image generation engine
    #[arg(long, value_enum, default_value_t = EngineArg::Flash)]
    engine: EngineArg,

    /// Aspect ratio for scene images
    #[arg(long, value_enum, default_value_t = AspectArg::Landscape)]
    aspect: AspectArg,

    /// Output resolution tier
    #[arg(long, value_enum, default_value_t = ResolutionArg::OneK)]
    resolution: ResolutionArg,

    /// Also animate every completed scene after image generation
    #[arg(long)]
    videos: bool,

    /// Gemini API key (falls back to the GEMINI_API_KEY environment variable)
    #[arg(long)]
    api_key: Option<String>,

    /// Use the mock client instead of the remote service
    #[arg(long)]
    dry_run: bool,

    /// Print the final entity snapshot as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EngineArg {
    Flash,
    Pro,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AspectArg {
    Square,
    Landscape,
    Portrait,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ResolutionArg {
    #[value(name = "1k")]
    OneK,
    #[value(name = "2k")]
    TwoK,
    #[value(name = "4k")]
    FourK,
}

impl From<EngineArg> for ImageEngine {
    fn from(value: EngineArg) -> Self {
        match value {
            EngineArg::Flash => ImageEngine::Flash,
            EngineArg::Pro => ImageEngine::Pro,
        }
    }
}

impl From<AspectArg> for AspectRatio {
    fn from(value: AspectArg) -> Self {
        match value {
            AspectArg::Square => AspectRatio::Square,
            AspectArg::Landscape => AspectRatio::Landscape,
            AspectArg::Portrait => AspectRatio::Portrait,
        }
    }
}

impl From<ResolutionArg> for Resolution {
    fn from(value: ResolutionArg) -> Self {
        match value {
            ResolutionArg::OneK => Resolution::OneK,
            ResolutionArg::TwoK => Resolution::TwoK,
            ResolutionArg::FourK => Resolution::FourK,
        }
    }
}

/// Placeholder analysis used by dry runs so the pipeline can be exercised
/// without network access.
fn dry_run_analysis(target_scenes: u32) -> AnalysisResult {
    AnalysisResult {
        scenes: (1..=target_scenes.min(5))
            .map(|n| SceneAnalysis {
                scene_number: n,
                original_text: format!("Placeholder excerpt for scene {}", n),
                image_prompt: format!("Placeholder storyboard frame {}", n),
                video_prompt: format!("Slow pan across storyboard frame {}", n),
            })
            .collect(),
        characters: vec![CharacterAnalysis {
            name: "Narrator".to_string(),
            description: "a placeholder figure in period dress".to_string(),
        }],
    }
}

fn build_client(args: &Args) -> anyhow::Result<Arc<dyn GenerationClient>> {
    if args.dry_run {
        let client = MockGenerationClient::new()
            .with_latency(Duration::from_millis(200))
            .with_analysis(dry_run_analysis(args.target_scenes));
        return Ok(Arc::new(client));
    }

    let api_key = match &args.api_key {
        Some(key) => key.clone(),
        None => std::env::var("GEMINI_API_KEY")
            .context("no --api-key given and GEMINI_API_KEY is not set")?,
    };
    Ok(Arc::new(GeminiClient::new(api_key)?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    let mut script_parts = Vec::with_capacity(args.scripts.len());
    for path in &args.scripts {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script part {}", path))?;
        script_parts.push(text);
    }
    if script_parts.iter().all(|p| p.trim().is_empty()) {
        bail!("all script parts are empty");
    }

    let settings = GenerationSettings::default()
        .with_engine(args.engine.into())
        .with_aspect_ratio(args.aspect.into())
        .with_resolution(args.resolution.into())
        .with_target_scene_count(args.target_scenes)
        .with_concurrency(args.concurrency);

    let client = build_client(&args)?;
    let mut engine = StoryboardEngine::new(client, settings);

    // Relay engine progress to the log as it happens
    let mut events = engine
        .take_event_receiver()
        .expect("event receiver taken once");
    let event_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                EngineEvent::AnalysisMerged { scenes, characters } => {
                    info!(scenes, characters, "analysis merged");
                }
                EngineEvent::GenerationStarted { entity_id } => {
                    info!(entity_id = %entity_id, "generating");
                }
                EngineEvent::GenerationCompleted { entity_id, .. } => {
                    info!(entity_id = %entity_id, "completed");
                }
                EngineEvent::GenerationFailed { entity_id, error } => {
                    warn!(entity_id = %entity_id, "failed: {}", error);
                }
                EngineEvent::BatchStarted {
                    targets,
                    concurrency,
                } => {
                    info!(targets, concurrency, "batch started");
                }
                EngineEvent::BatchFinished { summary } => {
                    info!(
                        completed = summary.completed,
                        failed = summary.failed,
                        skipped = summary.skipped,
                        "batch finished"
                    );
                }
                EngineEvent::VideoStarted { entity_id, .. } => {
                    info!(entity_id = %entity_id, "animating");
                }
                EngineEvent::VideoCompleted { entity_id, .. } => {
                    info!(entity_id = %entity_id, "video ready");
                }
                EngineEvent::VideoFailed { entity_id, error, .. } => {
                    warn!(entity_id = %entity_id, "video failed: {}", error);
                }
            }
        }
    });

    // 1. Analyze the script into scenes and characters
    engine.analyze_script(&script_parts).await?;

    // 2. Generate every pending image under the concurrency cap
    let summary = engine.submit_batch(engine.pending_targets())?.await?;
    if summary.failed > 0 {
        warn!(
            failed = summary.failed,
            "some generations failed; rerun with the same script to retry them"
        );
    }

    // 3. Optionally animate each completed scene's head asset
    if args.videos {
        let snapshot = engine.snapshot();
        for scene in &snapshot.scenes {
            let Some(url) = scene.image_url.clone() else {
                continue;
            };
            match engine.request_video(&scene.id, &url, "", VideoSettings::default()) {
                Ok(handle) => {
                    let _ = handle.await;
                }
                Err(e) => warn!(entity_id = %scene.id, "video request rejected: {}", e),
            }
        }
    }

    let snapshot = engine.snapshot();
    drop(engine);
    event_task.abort();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!(
            "Storyboard: {}/{} scenes completed, {} characters",
            snapshot.completed_scene_count(),
            snapshot.scenes.len(),
            snapshot.characters.len()
        );
        for scene in &snapshot.scenes {
            let Some(details) = scene.as_scene() else {
                continue;
            };
            println!(
                "  #{:<3} {:<10} {} (history: {})",
                details.scene_number,
                scene.status.to_string(),
                truncate(&details.original_text, 60),
                scene.history.len()
            );
        }
    }

    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}
