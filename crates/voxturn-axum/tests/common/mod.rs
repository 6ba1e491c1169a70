//! Hand-written port doubles and request helpers for route tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use bytes::Bytes;
use futures_util::stream;
use http_body_util::BodyExt;
use tokio::sync::Notify;
use tower::ServiceExt;
use voxturn_axum::{AxumContext, CorsConfig, ServerConfig, ServerPorts, create_router};
use voxturn_core::{
    AgentError, AgentEvent, AgentEventStream, ConversationAgent, ConversationId, RecordedAudio,
    RunId, SpeechSynthesizer, SynthesisError, SynthesizedAudio, Transcriber, TranscriptionError,
};

/// How the agent answers every turn.
#[derive(Clone)]
pub enum Reply {
    /// Yield these events, then end.
    Events(Vec<AgentEvent>),
    /// Report the run, then never produce anything else.
    Hang,
    /// Fail before the stream opens.
    Unreachable,
}

pub struct ScriptedAgent {
    reply: Reply,
    cancelled: Mutex<Vec<RunId>>,
}

impl ScriptedAgent {
    pub fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            cancelled: Mutex::new(Vec::new()),
        })
    }

    pub fn cancelled_runs(&self) -> Vec<RunId> {
        self.cancelled.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationAgent for ScriptedAgent {
    async fn create_conversation(&self) -> Result<ConversationId, AgentError> {
        match self.reply {
            Reply::Unreachable => Err(AgentError::Request("connection refused".into())),
            _ => Ok(ConversationId::new("thread_test")),
        }
    }

    async fn stream_reply(
        &self,
        _conversation: &ConversationId,
        _text: &str,
    ) -> Result<AgentEventStream, AgentError> {
        match &self.reply {
            Reply::Events(events) => {
                Ok(Box::pin(stream::iter(events.clone().into_iter().map(Ok))))
            }
            Reply::Hang => {
                let created = stream::iter([Ok(AgentEvent::RunCreated(RunId::new("run_hang")))]);
                Ok(Box::pin(futures_util::StreamExt::chain(created, stream::pending())))
            }
            Reply::Unreachable => Err(AgentError::Request("connection refused".into())),
        }
    }

    async fn cancel_run(&self, _conversation: &ConversationId, run: &RunId) -> Result<(), AgentError> {
        self.cancelled.lock().unwrap().push(run.clone());
        Ok(())
    }
}

/// Always hears the same thing.
pub struct FixedTranscriber(pub &'static str);

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, audio: RecordedAudio) -> Result<String, TranscriptionError> {
        if audio.bytes.is_empty() {
            return Err(TranscriptionError::EmptyAudio);
        }
        Ok(self.0.to_string())
    }
}

/// Hears `text`, but only once the test releases it.
pub struct GatedTranscriber {
    pub text: &'static str,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedTranscriber {
    pub fn new(text: &'static str) -> Arc<Self> {
        Arc::new(Self {
            text,
            entered: Notify::new(),
            release: Notify::new(),
        })
    }
}

#[async_trait]
impl Transcriber for GatedTranscriber {
    async fn transcribe(&self, _audio: RecordedAudio) -> Result<String, TranscriptionError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.text.to_string())
    }
}

/// "Synthesizes" text into its own UTF-8 bytes.
#[derive(Default)]
pub struct EchoTts {
    pub failing: bool,
}

#[async_trait]
impl SpeechSynthesizer for EchoTts {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, SynthesisError> {
        if self.failing {
            return Err(SynthesisError::Upstream {
                status: 500,
                body: "tts down".into(),
            });
        }
        Ok(SynthesizedAudio {
            bytes: Bytes::from(text.to_string()),
            content_type: "audio/mpeg".into(),
        })
    }
}

pub fn ports(agent: Arc<ScriptedAgent>) -> ServerPorts {
    ServerPorts {
        agent,
        transcriber: Arc::new(FixedTranscriber("what's the weather")),
        tts: Arc::new(EchoTts::default()),
    }
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        port: 0,
        public_base_url: Some("http://voxturn.test".into()),
        ..ServerConfig::default()
    }
}

pub fn app(ports: ServerPorts) -> Router {
    create_router(AxumContext::new(&test_config(), ports), &CorsConfig::AllowAll)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub const BOUNDARY: &str = "voxturn-test-boundary";

/// Multipart request with one file field.
pub fn post_multipart(uri: &str, field: &str, file: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"audio.wav\"\r\nContent-Type: audio/wav\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn json(response: Response<Body>) -> serde_json::Value {
    let body = body_bytes(response).await;
    serde_json::from_slice(&body).unwrap_or_else(|e| panic!("Expected valid JSON body: {e}"))
}

/// Read an NDJSON body to the end.
pub async fn records(response: Response<Body>) -> Vec<serde_json::Value> {
    let body = body_bytes(response).await;
    body.split(|&b| b == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_slice(line).unwrap())
        .collect()
}

/// Path part of an audio URL handed out by the server.
pub fn audio_path(url: &str) -> &str {
    url.strip_prefix("http://voxturn.test").unwrap()
}
