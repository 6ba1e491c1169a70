//! Audio sinks for the playback scheduler.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;
use voxturn_core::AudioRef;

use crate::error::PlaybackError;
use crate::playback::AudioSink;

/// Sink that only logs each item and waits a fixed time, as if playing it.
///
/// Used when no audio device is available (headless runs, CI).
#[derive(Debug, Clone)]
pub struct LogSink {
    duration: Duration,
}

impl LogSink {
    pub const fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

#[async_trait]
impl AudioSink for LogSink {
    async fn play(&self, audio: &AudioRef) -> Result<(), PlaybackError> {
        info!(audio = %audio, "Playing (no audio device)");
        tokio::time::sleep(self.duration).await;
        Ok(())
    }
}

#[cfg(feature = "speaker")]
pub use speaker::SpeakerSink;

#[cfg(feature = "speaker")]
mod speaker {
    use std::io::Cursor;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use rodio::{Decoder, OutputStream, Sink};
    use tracing::debug;
    use voxturn_core::AudioRef;

    use crate::error::PlaybackError;
    use crate::playback::AudioSink;

    const POLL_INTERVAL: Duration = Duration::from_millis(20);

    /// Fetches each audio reference over HTTP and plays it on the default
    /// output device via `rodio`.
    #[derive(Debug, Clone, Default)]
    pub struct SpeakerSink {
        http: reqwest::Client,
    }

    impl SpeakerSink {
        pub const fn new(http: reqwest::Client) -> Self {
            Self { http }
        }

        async fn fetch(&self, audio: &AudioRef) -> Result<Bytes, PlaybackError> {
            let response = self
                .http
                .get(audio.as_str())
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| PlaybackError::Fetch(e.to_string()))?;
            response
                .bytes()
                .await
                .map_err(|e| PlaybackError::Fetch(e.to_string()))
        }
    }

    /// Sets the stop flag when the playing future is dropped.
    struct StopOnDrop(Arc<AtomicBool>);

    impl Drop for StopOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl AudioSink for SpeakerSink {
        async fn play(&self, audio: &AudioRef) -> Result<(), PlaybackError> {
            let bytes = self.fetch(audio).await?;

            let stop = Arc::new(AtomicBool::new(false));
            let _guard = StopOnDrop(Arc::clone(&stop));
            tokio::task::spawn_blocking(move || play_blocking(bytes, &stop))
                .await
                .map_err(|e| PlaybackError::Output(e.to_string()))?
        }
    }

    /// `OutputStream` is not `Send`, so the device is opened on the blocking
    /// thread for each item.
    fn play_blocking(bytes: Bytes, stop: &AtomicBool) -> Result<(), PlaybackError> {
        let (_stream, handle) =
            OutputStream::try_default().map_err(|e| PlaybackError::Output(e.to_string()))?;
        let sink = Sink::try_new(&handle).map_err(|e| PlaybackError::Output(e.to_string()))?;
        let source =
            Decoder::new(Cursor::new(bytes)).map_err(|e| PlaybackError::Decode(e.to_string()))?;
        sink.append(source);

        while !sink.empty() {
            if stop.load(Ordering::SeqCst) {
                sink.stop();
                debug!("Playback interrupted");
                return Ok(());
            }
            std::thread::sleep(POLL_INTERVAL);
        }
        Ok(())
    }
}
