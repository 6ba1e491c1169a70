//! Speech-to-text over `/audio/transcriptions`.

use async_trait::async_trait;
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;
use voxturn_core::{RecordedAudio, Transcriber, TranscriptionError};

use crate::http::{OpenAiHttp, check};

#[derive(Debug, Deserialize)]
struct Transcription {
    text: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiTranscriber {
    http: OpenAiHttp,
}

impl OpenAiTranscriber {
    pub const fn new(http: OpenAiHttp) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, audio: RecordedAudio) -> Result<String, TranscriptionError> {
        if audio.bytes.is_empty() {
            return Err(TranscriptionError::EmptyAudio);
        }
        let size = audio.bytes.len();

        let file = Part::bytes(audio.bytes.to_vec())
            .file_name(audio.file_name)
            .mime_str(&audio.content_type)
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;
        let form = Form::new()
            .text("model", self.http.config().transcription_model.clone())
            .part("file", file);

        let response = self
            .http
            .request(Method::POST, "/audio/transcriptions")
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;
        let response = check(response)
            .await
            .map_err(|f| TranscriptionError::Upstream {
                status: f.status,
                body: f.body,
            })?;
        let body: Transcription = response
            .json()
            .await
            .map_err(|e| TranscriptionError::Decode(e.to_string()))?;

        debug!(bytes = size, chars = body.text.len(), "Transcribed recording");
        Ok(body.text.trim().to_string())
    }
}
