pub mod config;
pub mod error;
pub mod validation;
pub mod voices;

use std::sync::{Arc, Mutex};

use axum::{
    extract::{ws::Message, ws::WebSocket, DefaultBodyLimit, Path, Request, State, WebSocketUpgrade},
    http::{HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use tts_core::{InferenceEngine, ProgressEvent, ProgressSink, Speech, SynthesisOptions, TextToSpeech, VoiceStyle};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::validation::{validate_synthesis_options, validate_tts_request};
use crate::voices::VoiceCatalog;

/// Engine behind the shared pipeline; any backend that can cross threads.
pub type DynEngine = Box<dyn InferenceEngine + Send>;
pub type Synthesizer = TextToSpeech<DynEngine>;

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    /// One pipeline; generations are serialized through the lock.
    pub tts: Arc<Mutex<Synthesizer>>,
    pub voices: Arc<VoiceCatalog>,
    pub sample_rate: u32,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(tts: Synthesizer, voices: VoiceCatalog, config: ServerConfig) -> Self {
        Self {
            sample_rate: tts.sample_rate(),
            tts: Arc::new(Mutex::new(tts)),
            voices: Arc::new(voices),
            config,
        }
    }

    /// Look up the voice and merge request knobs over the configured defaults.
    fn prepare(
        &self,
        voice: Option<&str>,
        total_step: Option<usize>,
        speed: Option<f32>,
        silence_duration: Option<f32>,
    ) -> Result<(Arc<VoiceStyle>, SynthesisOptions), ApiError> {
        validate_synthesis_options(total_step, speed, silence_duration)?;

        let voice = voice.unwrap_or(&self.config.default_voice);
        let style = self
            .voices
            .get(voice)
            .ok_or_else(|| ApiError::NotFound(format!("Unknown voice: {voice}")))?;

        let mut opts = self.config.default_options();
        if let Some(steps) = total_step {
            opts.total_step = steps;
        }
        if let Some(speed) = speed {
            opts.speed = speed;
        }
        if let Some(silence) = silence_duration {
            opts.silence_duration = silence;
        }
        Ok((style, opts))
    }
}

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    pub voice: Option<String>,
    pub total_step: Option<usize>,
    pub speed: Option<f32>,
    pub silence_duration: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TtsResponse {
    pub audio_base64: String,
    pub sample_rate: u32,
    pub duration_ms: u64,
    pub chunks: usize,
}

impl TtsResponse {
    fn from_speech(speech: &Speech) -> Result<Self, ApiError> {
        Ok(Self {
            audio_base64: speech.to_wav_base64()?,
            sample_rate: speech.sample_rate,
            duration_ms: speech.duration_ms(),
            chunks: speech.chunks,
        })
    }
}

/// Run one generation on the blocking pool, reporting progress to `sink`.
async fn synthesize_blocking<S>(
    state: AppState,
    text: String,
    style: Arc<VoiceStyle>,
    opts: SynthesisOptions,
    mut sink: S,
) -> Result<Speech, ApiError>
where
    S: ProgressSink + Send + 'static,
{
    let tts = state.tts.clone();
    tokio::task::spawn_blocking(move || -> Result<Speech, ApiError> {
        let mut tts = tts
            .lock()
            .map_err(|_| ApiError::InternalError("Synthesizer lock poisoned".to_string()))?;
        Ok(tts.synthesize(&text, &style, &opts, &mut sink)?)
    })
    .await
    .map_err(|e| ApiError::InternalError(format!("Task join error: {e}")))?
}

pub fn cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(false);

    let origins: Vec<HeaderValue> = allowed_origins
        .unwrap_or_default()
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    if origins.is_empty() {
        warn!("CORS_ALLOWED_ORIGINS not set or empty, allowing all origins");
        base.allow_origin(Any)
    } else {
        info!("CORS configured for {} origin(s)", origins.len());
        base.allow_origin(AllowOrigin::list(origins))
    }
}

// Request ID middleware for tracing
async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let header = HeaderValue::from_str(&request_id).ok();
    if let Some(value) = header.clone() {
        request.headers_mut().insert("x-request-id", value);
    }
    let mut response = next.run(request).await;
    if let Some(value) = header {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Build the application with every route and middleware layer.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let config = &state.config;

    let rate = config.rate_limit_per_minute.clamp(1, 60_000);
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(60_000 / rate as u64)
            .burst_size(rate)
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limit configuration"))?,
    );

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(cors_layer(config.cors_allowed_origins.as_deref()))
        .into_inner();

    let api = Router::new()
        .route("/health", get(health_check))
        .route("/voices", get(list_voices))
        .route("/tts", post(tts_endpoint))
        .route("/stream/{voice}/{text}", get(stream_ws));

    Ok(Router::new()
        .merge(api.clone()) // root paths
        .nest("/api", api) // /api prefix
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(axum::middleware::from_fn(add_request_id))
        .layer(middleware_stack)
        .with_state(state))
}

pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn list_voices(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.voices.ids())
}

pub async fn tts_endpoint(
    State(state): State<AppState>,
    Json(req): Json<TtsRequest>,
) -> Result<Json<TtsResponse>, ApiError> {
    validate_tts_request(&req.text, req.voice.as_deref())?;
    let (style, opts) = state.prepare(
        req.voice.as_deref(),
        req.total_step,
        req.speed,
        req.silence_duration,
    )?;

    let speech = synthesize_blocking(state, req.text, style, opts, tts_core::NoProgress).await?;
    info!(
        "Synthesized {} chunk(s), {} ms of audio",
        speech.chunks,
        speech.duration_ms()
    );
    Ok(Json(TtsResponse::from_speech(&speech)?))
}

async fn send_json(socket: &mut WebSocket, value: serde_json::Value) -> bool {
    match socket.send(Message::Text(value.to_string().into())).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to send WS message: {e}");
            false
        }
    }
}

async fn send_error(socket: &mut WebSocket, err: &ApiError) {
    let body = err.body();
    send_json(socket, serde_json::json!({ "error": body.error, "code": body.code })).await;
}

pub async fn stream_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path((voice, text)): Path<(String, String)>,
) -> impl IntoResponse {
    let prepared = validate_tts_request(&text, Some(&voice))
        .and_then(|_| state.prepare(Some(&voice), None, None, None));

    ws.on_upgrade(move |mut socket| async move {
        match prepared {
            Ok((style, opts)) => stream_synthesis(&mut socket, state, text, style, opts).await,
            Err(e) => send_error(&mut socket, &e).await,
        }
        let _ = socket.send(Message::Close(None)).await;
    })
}

async fn stream_synthesis(
    socket: &mut WebSocket,
    state: AppState,
    text: String,
    style: Arc<VoiceStyle>,
    opts: SynthesisOptions,
) {
    send_json(
        socket,
        serde_json::json!({
            "type": "status",
            "status": "synthesizing",
            "message": "Generating audio..."
        }),
    )
    .await;

    // Progress flows from the blocking task; the channel closes when it finishes.
    let (tx, mut rx) = mpsc::channel::<ProgressEvent>(100);
    let sink = move |event: ProgressEvent| {
        let _ = tx.blocking_send(event);
    };
    let synthesis_task = tokio::spawn(synthesize_blocking(state, text, style, opts, sink));

    let mut client_gone = false;
    while let Some(event) = rx.recv().await {
        let value = match serde_json::to_value(&event) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to serialize progress event: {e}");
                continue;
            }
        };
        if !send_json(socket, value).await {
            client_gone = true;
            break;
        }
    }
    drop(rx);

    let result = match synthesis_task.await {
        Ok(result) => result,
        Err(e) => Err(ApiError::InternalError(format!("Task join error: {e}"))),
    };
    if client_gone {
        return;
    }

    let speech = match result.and_then(|speech| TtsResponse::from_speech(&speech)) {
        Ok(response) => response,
        Err(e) => {
            send_error(socket, &e).await;
            return;
        }
    };

    let sent = send_json(
        socket,
        serde_json::json!({
            "type": "audio",
            "audio_base64": speech.audio_base64,
            "sample_rate": speech.sample_rate,
            "duration_ms": speech.duration_ms,
            "chunks": speech.chunks
        }),
    )
    .await;
    if sent {
        send_json(socket, serde_json::json!({ "type": "status", "status": "complete" })).await;
    }
}
