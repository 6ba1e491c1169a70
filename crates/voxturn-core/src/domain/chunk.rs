//! Speech chunks: the unit of text that is synthesized and played as one.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::record::ChunkRecord;

/// Opaque, playable audio reference (a URL with a bounded validity window).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioRef(String);

impl AudioRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AudioRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a chunk represents once its work has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkTag {
    /// The user's transcribed input echoed back before agent chunks.
    TranscriptionEcho,
    /// Agent text with (usually) synthesized audio.
    Speech,
    /// Work was skipped or discarded because the turn was cancelled.
    Cancelled,
    /// Synthesis failed; the text is still delivered without audio.
    Error,
}

/// A finalized span of agent text plus its audio reference, if any.
///
/// Immutable once created. `audio` is `None` when synthesis was skipped
/// (cancellation, nothing speakable) or failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechChunk {
    pub ordinal: u32,
    pub text: String,
    pub audio: Option<AudioRef>,
    pub tag: ChunkTag,
}

impl SpeechChunk {
    /// The user's input, echoed ahead of the agent's chunks. It sits
    /// outside the chunk ordering and never carries audio.
    pub const fn transcription_echo(text: String) -> Self {
        Self {
            ordinal: 0,
            text,
            audio: None,
            tag: ChunkTag::TranscriptionEcho,
        }
    }

    pub const fn speech(ordinal: u32, text: String, audio: Option<AudioRef>) -> Self {
        Self {
            ordinal,
            text,
            audio,
            tag: ChunkTag::Speech,
        }
    }

    pub const fn failed(ordinal: u32, text: String) -> Self {
        Self {
            ordinal,
            text,
            audio: None,
            tag: ChunkTag::Error,
        }
    }

    pub const fn cancelled(ordinal: u32, text: String) -> Self {
        Self {
            ordinal,
            text,
            audio: None,
            tag: ChunkTag::Cancelled,
        }
    }

    /// Wire form of this chunk.
    ///
    /// Cancelled chunks are never forwarded: the turn emits a single
    /// `cancelled` control record instead.
    pub fn into_record(self) -> Option<ChunkRecord> {
        match self.tag {
            ChunkTag::Cancelled => None,
            ChunkTag::TranscriptionEcho => Some(ChunkRecord::Transcription { value: self.text }),
            ChunkTag::Speech | ChunkTag::Error => Some(ChunkRecord::Audio {
                index: Some(self.ordinal),
                text: self.text,
                value: self.audio,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_chunk_keeps_text_without_audio() {
        let record = SpeechChunk::failed(3, "Hi.\n\n".into()).into_record();
        assert_eq!(
            record,
            Some(ChunkRecord::Audio {
                index: Some(3),
                text: "Hi.\n\n".into(),
                value: None,
            })
        );
    }

    #[test]
    fn echo_becomes_transcription_record() {
        let record = SpeechChunk::transcription_echo("what's the weather".into()).into_record();
        assert_eq!(
            record,
            Some(ChunkRecord::Transcription {
                value: "what's the weather".into(),
            })
        );
    }

    #[test]
    fn cancelled_chunk_is_not_forwarded() {
        assert!(SpeechChunk::cancelled(0, "gone".into()).into_record().is_none());
    }
}
