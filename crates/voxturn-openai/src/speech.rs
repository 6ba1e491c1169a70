//! Text-to-speech over `/audio/speech`.

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use voxturn_core::{SpeechSynthesizer, SynthesisError, SynthesizedAudio};

use crate::http::{OpenAiHttp, check};

const DEFAULT_CONTENT_TYPE: &str = "audio/mpeg";

#[derive(Debug, Clone)]
pub struct OpenAiSpeech {
    http: OpenAiHttp,
}

impl OpenAiSpeech {
    pub const fn new(http: OpenAiHttp) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, SynthesisError> {
        let config = self.http.config();
        let response = self
            .http
            .request(Method::POST, "/audio/speech")
            .json(&serde_json::json!({
                "model": config.speech_model,
                "voice": config.voice,
                "input": text,
                "response_format": "mp3",
            }))
            .send()
            .await
            .map_err(|e| SynthesisError::Request(e.to_string()))?;
        let response = check(response).await.map_err(|f| SynthesisError::Upstream {
            status: f.status,
            body: f.body,
        })?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Request(e.to_string()))?;

        debug!(chars = text.len(), bytes = bytes.len(), "Synthesized speech");
        Ok(SynthesizedAudio { bytes, content_type })
    }
}
