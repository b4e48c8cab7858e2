use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use server::config::ServerConfig;
use server::voices::VoiceCatalog;
use server::{build_router, AppState, Synthesizer};
#[cfg(feature = "onnx")]
use server::DynEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    async_main().await
}

#[cfg(feature = "onnx")]
fn load_synthesizer(config: &ServerConfig) -> anyhow::Result<Synthesizer> {
    use tts_core::onnx::{OnnxEngine, RESOURCE_COUNT};
    use tts_core::{LoadTracker, ModelAssets, ProgressEvent};

    let mut log_progress = |event: ProgressEvent| {
        if let ProgressEvent::Loading { current, total, resource } = event {
            info!("Loaded {resource} ({current}/{total})");
        }
    };
    let mut tracker = LoadTracker::new(RESOURCE_COUNT, &mut log_progress);
    let assets = ModelAssets::load_with(&config.model_dir, &mut tracker)?;
    let engine: DynEngine = Box::new(OnnxEngine::load(&config.model_dir, &mut tracker)?);
    Ok(assets.into_text_to_speech(engine))
}

#[cfg(not(feature = "onnx"))]
fn load_synthesizer(_config: &ServerConfig) -> anyhow::Result<Synthesizer> {
    anyhow::bail!("server was built without an inference backend; rebuild with `--features onnx`")
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting TTS server...");

    // Load configuration from environment
    let config = ServerConfig::from_env();

    info!("Loading TTS models from {}...", config.model_dir.display());
    let model_config = config.clone();
    let tts = tokio::task::spawn_blocking(move || load_synthesizer(&model_config)).await??;

    let voices = VoiceCatalog::load_dir(&config.voice_styles_dir)?;
    if voices.get(&config.default_voice).is_none() {
        tracing::warn!(
            "Default voice {} not found in {}",
            config.default_voice,
            config.voice_styles_dir.display()
        );
    }

    let state = AppState::new(tts, voices, config.clone());
    info!(
        "Server configuration loaded: port={}, sample_rate={}, rate_limit={}/min, timeout={}s",
        config.port, state.sample_rate, config.rate_limit_per_minute, config.request_timeout_secs
    );

    let app = build_router(state)?;

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT.")
    })?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
