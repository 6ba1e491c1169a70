//! Core domain types and port definitions for voxturn.
//!
//! This crate has no I/O. It defines what a turn, a speech chunk and a chunk
//! record are, and the traits every external collaborator (conversational
//! agent, speech-to-text, text-to-speech, audio storage) must implement.
//! Adapters live in `voxturn-openai` and `voxturn-axum`; the streaming
//! pipeline that ties them together lives in `voxturn-voice`.

#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod error;
pub mod ports;

// Re-export commonly used types for convenience
pub use domain::{
    AudioRef, CancelOutcome, CancelStatus, ChunkRecord, ChunkTag, ConversationId, RunId,
    RunPhase, ScriptedSpeech, SessionKey, SpeechChunk, TurnId, TurnSnapshot, TurnState,
};
pub use error::TurnError;
pub use ports::{
    AgentError, AgentEvent, AgentEventStream, AudioStore, AudioStoreError, ConversationAgent,
    RecordedAudio, SpeechSynthesizer, SynthesisError, SynthesizedAudio, Transcriber,
    TranscriptionError,
};

// serde_json is only exercised by the wire-shape tests
#[cfg(test)]
use serde_json as _;
