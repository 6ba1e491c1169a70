//! Connection settings for an OpenAI-compatible API.

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";
pub const DEFAULT_SPEECH_MODEL: &str = "tts-1";
pub const DEFAULT_VOICE: &str = "alloy";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Assistant that answers every turn.
    pub assistant_id: String,
    pub transcription_model: String,
    pub speech_model: String,
    pub voice: String,
    /// Timeout for non-streaming requests. Streaming runs are unbounded.
    pub request_timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>, assistant_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            assistant_id: assistant_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            assistant_id: String::new(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            speech_model: DEFAULT_SPEECH_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}
