//! Chunk records: the newline-delimited JSON wire form of a turn.
//!
//! Within one turn records arrive in strict ordinal order:
//!
//! ```text
//! {"type":"transcription","value":"what's the weather"}
//! {"type":"audio","index":0,"text":"Sunny.\n\n","value":"http://…/audio/…"}
//! {"type":"audio","index":1,"text":"Warm, too.","value":null}
//! ```
//!
//! A turn ends with stream close on normal completion, or with one terminal
//! `cancelled` / `error` record.

use serde::{Deserialize, Serialize};

use super::chunk::AudioRef;

/// One line of the chunk transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChunkRecord {
    /// Echo of the user's input, emitted once before agent chunks.
    Transcription { value: String },

    /// One finalized chunk. `value` is null when no audio is available.
    Audio {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<u32>,
        text: String,
        value: Option<AudioRef>,
    },

    /// Terminal: cancellation won the race.
    Cancelled,

    /// Terminal: the turn failed after streaming had begun.
    Error { message: String },
}

impl ChunkRecord {
    /// Whether this record ends the turn.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Error { .. })
    }
}

/// Result of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelStatus {
    /// The active turn was aborted.
    Cancelled,
    /// The turn had already reached a terminal phase; nothing to do.
    AlreadyFinished,
    /// No turn was ever started for this session.
    NoActiveTurn,
}

/// Body returned by the cancellation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOutcome {
    pub message: String,
    pub status: CancelStatus,
}

impl CancelOutcome {
    pub fn new(status: CancelStatus, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }
}

/// Scripted speech (introduction, tour): text plus a playable reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedSpeech {
    pub text: String,
    pub value: Option<AudioRef>,
}
