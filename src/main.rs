use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use memoir_interview::audio::{AudioInput, CaptureConfig};
use memoir_interview::collab::{SingleStoryAnalyzer, WavClipSplitter};
use memoir_interview::draft::JsonDraftStore;
use memoir_interview::{create_router, AppState, Config};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "memoir-interview", about = "Conversational recording session service")]
struct Args {
    /// Config file (without extension)
    #[arg(long, default_value = "config/interview")]
    config: String,

    /// Capture from a WAV file instead of the narrator microphone
    #[arg(long)]
    wav: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let capture = CaptureConfig {
        sample_rate: cfg.audio.sample_rate,
        channels: cfg.audio.channels,
    };
    let audio_input = match args.wav {
        Some(path) => {
            info!("Capturing from WAV file: {}", path.display());
            AudioInput::File(path)
        }
        None => AudioInput::Microphone,
    };

    if cfg.interview.live_interviewer_enabled {
        warn!("No live interviewer transport linked; using scripted follow-ups");
    }

    let draft_store = Arc::new(JsonDraftStore::new(&cfg.drafts.path)?);
    let state = AppState::new(
        Arc::new(SingleStoryAnalyzer),
        Arc::new(WavClipSplitter),
        None,
        draft_store,
        cfg.interview.clone(),
        capture,
        audio_input,
    );

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, create_router(state))
        .await
        .context("HTTP server error")?;

    Ok(())
}
