//! OpenAI adapters for voxturn.
//!
//! - [`AssistantAgent`]: conversational agent over Assistants threads and
//!   streaming runs
//! - [`OpenAiTranscriber`]: speech-to-text
//! - [`OpenAiSpeech`]: text-to-speech
//!
//! All three share one [`OpenAiHttp`] client.

pub mod assistant;
pub mod config;
pub mod http;
pub mod speech;
pub mod sse;
pub mod transcription;

pub use assistant::{AssistantAgent, map_event};
pub use config::OpenAiConfig;
pub use http::OpenAiHttp;
pub use speech::OpenAiSpeech;
pub use sse::{SseEvent, sse_events};
pub use transcription::OpenAiTranscriber;
