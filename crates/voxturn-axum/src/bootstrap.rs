//! Axum server bootstrap - the composition root.
//!
//! This module is the only place where the turn pipeline is wired to
//! concrete adapters. Tests build an [`AxumContext`] from mock ports through
//! [`AxumContext::new`]; the binary goes through [`start_server`], which
//! builds the OpenAI adapters.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use voxturn_core::{ConversationAgent, SpeechSynthesizer, Transcriber};
use voxturn_openai::{AssistantAgent, OpenAiConfig, OpenAiHttp, OpenAiSpeech, OpenAiTranscriber};
use voxturn_voice::{ChunkSynthesizer, TurnConfig, TurnDeps, TurnRegistry};

use crate::audio_store::{DEFAULT_AUDIO_TTL, MemoryAudioStore};

pub const DEFAULT_PORT: u16 = 3000;

pub const DEFAULT_INTRO_TEXT: &str = "Hi! I'm your voice assistant. Press the button, \
ask me anything, and I'll answer out loud. You can pause me at any time.";

pub const DEFAULT_TOUR_TEXT: &str = "Here's how this works. Hold the record button and speak. \
When you let go, I transcribe what you said and start answering right away, one paragraph \
at a time. Press pause whenever you want me to stop talking.";

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins (development mode).
    #[default]
    AllowAll,
    /// Allow specific origins (production mode).
    AllowOrigins(Vec<String>),
}

/// Server configuration for the Axum adapter.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Optional directory of static assets (the browser front end).
    pub static_dir: Option<PathBuf>,
    pub cors: CorsConfig,
    /// Prefix of audio URLs handed to clients. Defaults to
    /// `http://localhost:{port}`.
    pub public_base_url: Option<String>,
    /// Validity window of synthesized audio.
    pub audio_ttl: Duration,
    pub intro_text: String,
    pub tour_text: String,
    pub turn: TurnConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            static_dir: None,
            cors: CorsConfig::default(),
            public_base_url: None,
            audio_ttl: DEFAULT_AUDIO_TTL,
            intro_text: DEFAULT_INTRO_TEXT.to_string(),
            tour_text: DEFAULT_TOUR_TEXT.to_string(),
            turn: TurnConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Set the static directory for front-end serving.
    #[must_use]
    pub fn with_static_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(path.into());
        self
    }

    /// Set CORS to allow specific origins.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors = CorsConfig::AllowOrigins(origins);
        self
    }

    pub fn base_url(&self) -> String {
        self.public_base_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
    }
}

/// The external services a server talks to.
#[derive(Clone)]
pub struct ServerPorts {
    pub agent: Arc<dyn ConversationAgent>,
    pub transcriber: Arc<dyn Transcriber>,
    pub tts: Arc<dyn SpeechSynthesizer>,
}

impl ServerPorts {
    /// Ports backed by an OpenAI-compatible API.
    pub fn openai(config: OpenAiConfig) -> Result<Self> {
        let http = OpenAiHttp::new(config).context("Failed to build HTTP client")?;
        Ok(Self {
            agent: Arc::new(AssistantAgent::new(http.clone())),
            transcriber: Arc::new(OpenAiTranscriber::new(http.clone())),
            tts: Arc::new(OpenAiSpeech::new(http)),
        })
    }
}

/// Application context for the Axum adapter.
pub struct AxumContext {
    pub turns: TurnRegistry,
    pub transcriber: Arc<dyn Transcriber>,
    pub synthesizer: ChunkSynthesizer,
    pub audio: Arc<MemoryAudioStore>,
    pub intro_text: String,
    pub tour_text: String,
}

impl AxumContext {
    pub fn new(config: &ServerConfig, ports: ServerPorts) -> Self {
        let audio = Arc::new(MemoryAudioStore::new(config.base_url(), config.audio_ttl));
        let synthesizer = ChunkSynthesizer::new(ports.tts, audio.clone());
        let turns = TurnRegistry::new(
            TurnDeps {
                agent: ports.agent,
                synthesizer: synthesizer.clone(),
            },
            config.turn.clone(),
        );
        Self {
            turns,
            transcriber: ports.transcriber,
            synthesizer,
            audio,
            intro_text: config.intro_text.clone(),
            tour_text: config.tour_text.clone(),
        }
    }
}

impl std::fmt::Debug for AxumContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AxumContext")
            .field("turns", &self.turns)
            .field("audio", &self.audio)
            .finish_non_exhaustive()
    }
}

/// Build the server context against the OpenAI API.
pub fn bootstrap(config: &ServerConfig, openai: OpenAiConfig) -> Result<AxumContext> {
    info!(
        base_url = %openai.base_url,
        assistant_id = %openai.assistant_id,
        speech_model = %openai.speech_model,
        voice = %openai.voice,
        "Bootstrapping turn server"
    );
    let ports = ServerPorts::openai(openai)?;
    Ok(AxumContext::new(config, ports))
}

/// Start the web server on the configured port.
///
/// If `config.static_dir` is set, unmatched paths are served from it.
pub async fn start_server(config: ServerConfig, openai: OpenAiConfig) -> Result<()> {
    let ctx = bootstrap(&config, openai)?;

    let app = if let Some(ref static_dir) = config.static_dir {
        info!("Serving static assets from: {}", static_dir.display());
        crate::routes::create_spa_router(ctx, static_dir, &config.cors)
    } else {
        crate::routes::create_router(ctx, &config.cors)
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("voxturn server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("voxturn server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until killed.
        std::future::pending::<()>().await;
    }
}
