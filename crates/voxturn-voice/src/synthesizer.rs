//! Synthesizer adapter: one finalized chunk in, one playable reference out.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use voxturn_core::{AudioRef, AudioStore, SpeechChunk, SpeechSynthesizer, SynthesisError};

use crate::chunker::FinalizedChunk;
use crate::speakable::speakable;

/// Turns chunk text into an audio reference via a TTS engine and an audio
/// store. Cheap to clone.
#[derive(Clone)]
pub struct ChunkSynthesizer {
    tts: Arc<dyn SpeechSynthesizer>,
    store: Arc<dyn AudioStore>,
}

impl ChunkSynthesizer {
    pub fn new(tts: Arc<dyn SpeechSynthesizer>, store: Arc<dyn AudioStore>) -> Self {
        Self { tts, store }
    }

    /// Synthesize `text` and store the result.
    ///
    /// Returns `Ok(None)` without calling the engine when the text has
    /// nothing speakable in it. Failures are not retried.
    pub async fn synthesize(&self, text: &str) -> Result<Option<AudioRef>, SynthesisError> {
        let spoken = speakable(text);
        if spoken.is_empty() {
            return Ok(None);
        }

        let audio = self.tts.synthesize(&spoken).await?;
        let reference = self
            .store
            .put(audio)
            .await
            .map_err(|e| SynthesisError::Storage(e.to_string()))?;
        Ok(Some(reference))
    }

    /// Produce the speech chunk for `chunk`, honouring cancellation.
    ///
    /// The token is checked before the call (skip the work) and again after
    /// it (discard a result that arrived too late). A call already in flight
    /// is never interrupted. Synthesis failures degrade to a chunk with text
    /// and no audio.
    pub async fn synthesize_chunk(
        &self,
        chunk: FinalizedChunk,
        cancel: &CancellationToken,
    ) -> SpeechChunk {
        let FinalizedChunk { ordinal, text } = chunk;

        if cancel.is_cancelled() {
            debug!(ordinal, "Skipping synthesis, turn cancelled");
            return SpeechChunk::cancelled(ordinal, text);
        }

        let result = self.synthesize(&text).await;

        if cancel.is_cancelled() {
            debug!(ordinal, "Discarding synthesis result, turn cancelled mid-call");
            return SpeechChunk::cancelled(ordinal, text);
        }

        match result {
            Ok(audio) => SpeechChunk::speech(ordinal, text, audio),
            Err(e) => {
                warn!(ordinal, error = %e, "Chunk synthesis failed, emitting text only");
                SpeechChunk::failed(ordinal, text)
            }
        }
    }
}

impl std::fmt::Debug for ChunkSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkSynthesizer").finish_non_exhaustive()
    }
}
