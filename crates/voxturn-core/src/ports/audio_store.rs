//! Audio artifact storage port.

use async_trait::async_trait;
use thiserror::Error;

use super::speech::SynthesizedAudio;
use crate::domain::AudioRef;

#[derive(Debug, Clone, Error)]
pub enum AudioStoreError {
    #[error("Audio store is full")]
    Full,

    #[error("Audio store failure: {0}")]
    Backend(String),
}

/// Stores synthesized audio and hands out time-limited references to it.
#[async_trait]
pub trait AudioStore: Send + Sync {
    async fn put(&self, audio: SynthesizedAudio) -> Result<AudioRef, AudioStoreError>;
}
