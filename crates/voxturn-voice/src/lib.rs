//! Incremental response streaming and client playback for voxturn.
//!
//! Server side: the agent's token stream is cut into paragraph chunks
//! ([`chunker`]), each chunk is synthesized ([`synthesizer`]) and emitted as
//! an ordered [`ChunkRecord`](voxturn_core::ChunkRecord) by the per-session
//! run controller ([`controller`], [`registry`]). Records travel as
//! newline-delimited JSON ([`transport`]).
//!
//! Client side: records are read back ([`client`]), their audio is queued on
//! the [`playback`] scheduler, and the [`coordinator`] reconciles user pauses
//! with in-flight reads, playback, and the server-side run.

pub mod chunker;
pub mod client;
pub mod controller;
pub mod coordinator;
pub mod error;
pub mod playback;
pub mod registry;
pub mod sink;
pub mod speakable;
pub mod synthesizer;
pub mod transport;

// Re-export key types for convenience
pub use chunker::{Chunker, FinalizedChunk};
pub use client::TurnClient;
pub use controller::{TurnConfig, TurnController, TurnDeps, TurnReservation, TurnStream};
pub use coordinator::{ActiveTurn, PlaybackState, RunCanceller, TurnCoordinator, TurnEnd};
pub use error::{ClientError, PlaybackError, TransportError};
pub use playback::{
    AudioSink, PlaybackEvent, PlaybackHandle, PlaybackOptions, PlaybackQueue, PlaybackScheduler,
    SchedulerState,
};
pub use registry::TurnRegistry;
pub use sink::LogSink;
#[cfg(feature = "speaker")]
pub use sink::SpeakerSink;
pub use synthesizer::ChunkSynthesizer;
pub use transport::{NDJSON_CONTENT_TYPE, RecordDecoder, decode_records, encode_record, encode_records};
