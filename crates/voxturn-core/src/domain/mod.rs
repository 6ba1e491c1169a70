//! Domain types shared by the server pipeline, the HTTP adapter and the
//! playback client.

pub mod chunk;
pub mod record;
pub mod turn;

pub use chunk::{AudioRef, ChunkTag, SpeechChunk};
pub use record::{CancelOutcome, CancelStatus, ChunkRecord, ScriptedSpeech};
pub use turn::{ConversationId, RunId, RunPhase, SessionKey, TurnId, TurnSnapshot, TurnState};
