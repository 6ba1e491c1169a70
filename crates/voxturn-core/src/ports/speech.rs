//! Speech ports: speech-to-text and text-to-speech.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Raw recorded audio as uploaded by a client.
#[derive(Debug, Clone)]
pub struct RecordedAudio {
    pub bytes: Bytes,
    /// File name reported by the client (e.g. `audio.wav`).
    pub file_name: String,
    pub content_type: String,
}

/// Encoded audio produced by a synthesizer.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Bytes,
    /// MIME type of `bytes` (e.g. `audio/mpeg`).
    pub content_type: String,
}

#[derive(Debug, Clone, Error)]
pub enum TranscriptionError {
    #[error("No audio provided")]
    EmptyAudio,

    #[error("Transcription request failed: {0}")]
    Request(String),

    #[error("Transcription service returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Unexpected transcription response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Error)]
pub enum SynthesisError {
    #[error("Speech synthesis request failed: {0}")]
    Request(String),

    #[error("Speech service returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Failed to store synthesized audio: {0}")]
    Storage(String),
}

/// Speech-to-text engine.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a recording. Returns an empty string if nothing was said.
    async fn transcribe(&self, audio: RecordedAudio) -> Result<String, TranscriptionError>;
}

/// Text-to-speech engine.
///
/// Callers pass a single chunk of plain text; chunking and markdown
/// stripping happen upstream of this trait.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, SynthesisError>;
}
