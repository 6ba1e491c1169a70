//! In-memory, time-limited audio artifact store.
//!
//! Synthesized chunks are kept here and served back from `GET /audio/{id}`.
//! Every entry expires `ttl` after insertion; expired entries are purged
//! lazily whenever a new entry is stored.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;
use voxturn_core::{AudioRef, AudioStore, AudioStoreError, SynthesizedAudio};

/// Default validity window of a stored artifact.
pub const DEFAULT_AUDIO_TTL: Duration = Duration::from_secs(60 * 60);

/// Default cap on live entries.
pub const DEFAULT_MAX_ENTRIES: usize = 4096;

struct Entry {
    audio: SynthesizedAudio,
    expires_at: Instant,
}

pub struct MemoryAudioStore {
    /// Prefix of the URLs handed out, e.g. `http://localhost:3000`.
    base_url: String,
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<Uuid, Entry>>,
}

impl MemoryAudioStore {
    pub fn new(base_url: impl Into<String>, ttl: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ttl,
            max_entries: DEFAULT_MAX_ENTRIES,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Public URL of an artifact id.
    pub fn url_for(&self, id: Uuid) -> String {
        format!("{}/audio/{id}", self.base_url)
    }

    /// Fetch a live artifact. Expired entries read as missing.
    pub fn get(&self, id: Uuid) -> Option<SynthesizedAudio> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&id)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.audio.clone())
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AudioStore for MemoryAudioStore {
    async fn put(&self, audio: SynthesizedAudio) -> Result<AudioRef, AudioStoreError> {
        let now = Instant::now();
        let id = Uuid::new_v4();
        {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            let before = entries.len();
            entries.retain(|_, entry| entry.expires_at > now);
            if entries.len() < before {
                debug!(purged = before - entries.len(), "Purged expired audio");
            }
            if entries.len() >= self.max_entries {
                return Err(AudioStoreError::Full);
            }
            entries.insert(
                id,
                Entry {
                    audio,
                    expires_at: now + self.ttl,
                },
            );
        }
        Ok(AudioRef::new(self.url_for(id)))
    }
}

impl std::fmt::Debug for MemoryAudioStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAudioStore")
            .field("base_url", &self.base_url)
            .field("ttl", &self.ttl)
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn mp3(data: &'static [u8]) -> SynthesizedAudio {
        SynthesizedAudio {
            bytes: Bytes::from_static(data),
            content_type: "audio/mpeg".into(),
        }
    }

    fn id_of(reference: &AudioRef) -> Uuid {
        let (_, id) = reference.as_str().rsplit_once('/').unwrap();
        id.parse().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = MemoryAudioStore::new("http://localhost:3000/", Duration::from_secs(60));
        let reference = store.put(mp3(b"abc")).await.unwrap();
        assert!(reference.as_str().starts_with("http://localhost:3000/audio/"));

        let id = id_of(&reference);
        assert_eq!(store.get(id).unwrap().bytes, Bytes::from_static(b"abc"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.get(id).is_none());
        assert_eq!(store.len(), 1, "purge is lazy");

        store.put(mp3(b"def")).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn full_store_rejects_new_audio() {
        let store = MemoryAudioStore::new("http://x", DEFAULT_AUDIO_TTL).with_max_entries(1);
        store.put(mp3(b"a")).await.unwrap();
        assert!(matches!(store.put(mp3(b"b")).await, Err(AudioStoreError::Full)));
    }
}
