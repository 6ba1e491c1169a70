//! Port definitions for external collaborators.
//!
//! Every remote service the turn pipeline talks to is reached through one of
//! these traits. Implementations live in adapter crates; tests substitute
//! in-process fakes.

pub mod agent;
pub mod audio_store;
pub mod speech;

pub use agent::{AgentError, AgentEvent, AgentEventStream, ConversationAgent};
pub use audio_store::{AudioStore, AudioStoreError};
pub use speech::{
    RecordedAudio, SpeechSynthesizer, SynthesisError, SynthesizedAudio, Transcriber,
    TranscriptionError,
};
