//! Turn/pause coordinator: reconciles a user pause with in-flight work.
//!
//! Two activities run per turn: the transport reader (this module's
//! [`TurnCoordinator::consume`]) and the playback scheduler. A pause must
//! stop both at once, even though the server may already have sent records
//! it has not seen the cancellation for yet. The reader therefore checks the
//! turn's speaking flag before handling each record and discards the rest of
//! the stream once it is cleared.
//!
//! Each flag has one writer: only `pause` (and `begin_turn`, which replaces
//! it) cancels a turn's token.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use voxturn_core::{CancelOutcome, ChunkRecord};

use crate::error::{ClientError, TransportError};
use crate::playback::{PlaybackHandle, SchedulerState};

/// Sends the cancellation request to the run controller.
#[async_trait]
pub trait RunCanceller: Send + Sync {
    async fn cancel_run(&self) -> Result<CancelOutcome, ClientError>;
}

/// Client-side playback state of the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// How consuming a turn's record stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEnd {
    /// The stream closed normally.
    Completed,
    /// The server sent a `cancelled` record.
    Cancelled,
    /// The user paused; remaining records were discarded.
    Paused,
    /// The server sent an `error` record or the stream broke.
    Failed(String),
}

/// A turn in progress on the client. Holds the turn's speaking flag.
#[derive(Debug, Clone)]
pub struct ActiveTurn {
    speaking: CancellationToken,
}

impl ActiveTurn {
    /// Whether the assistant may keep speaking for this turn.
    pub fn is_speaking(&self) -> bool {
        !self.speaking.is_cancelled()
    }
}

pub struct TurnCoordinator {
    playback: PlaybackHandle,
    canceller: Arc<dyn RunCanceller>,
    current: Mutex<Option<CancellationToken>>,
}

impl TurnCoordinator {
    pub fn new(playback: PlaybackHandle, canceller: Arc<dyn RunCanceller>) -> Self {
        Self {
            playback,
            canceller,
            current: Mutex::new(None),
        }
    }

    pub const fn playback(&self) -> &PlaybackHandle {
        &self.playback
    }

    /// Start a new turn: the assistant is now speaking. Any leftover audio
    /// from a previous turn is dropped.
    pub async fn begin_turn(&self) -> ActiveTurn {
        let speaking = CancellationToken::new();
        if let Some(previous) = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(speaking.clone())
        {
            previous.cancel();
        }
        self.playback.begin_turn().await;
        ActiveTurn { speaking }
    }

    /// Read a turn's records, queueing audio as it arrives.
    ///
    /// `on_record` sees every record that is processed (for transcript
    /// display). Audio records with a null reference are shown but never
    /// queued. Returns once the stream ends, a terminal record arrives, or
    /// the turn is paused; it does not wait for playback to drain.
    pub async fn consume<S, F>(&self, turn: &ActiveTurn, records: S, mut on_record: F) -> TurnEnd
    where
        S: Stream<Item = Result<ChunkRecord, TransportError>>,
        F: FnMut(&ChunkRecord),
    {
        let mut records = std::pin::pin!(records);

        loop {
            let next = tokio::select! {
                biased;
                () = turn.speaking.cancelled() => None,
                next = records.next() => Some(next),
            };
            let Some(next) = next else {
                debug!("Turn paused, discarding remaining records");
                return TurnEnd::Paused;
            };
            if !turn.is_speaking() {
                return TurnEnd::Paused;
            }

            let record = match next {
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    warn!(error = %e, "Chunk stream failed");
                    return TurnEnd::Failed(e.to_string());
                }
                None => return TurnEnd::Completed,
            };

            on_record(&record);

            match record {
                ChunkRecord::Audio {
                    value: Some(audio), ..
                } => {
                    // `on_record` may have let a pause through.
                    if !turn.is_speaking() {
                        return TurnEnd::Paused;
                    }
                    self.playback.enqueue(audio).await;
                }
                ChunkRecord::Audio { value: None, index, .. } => {
                    debug!(?index, "Chunk has no audio, skipping playback");
                }
                ChunkRecord::Transcription { .. } => {}
                ChunkRecord::Cancelled => {
                    info!("Server cancelled the turn");
                    self.playback.stop().await;
                    return TurnEnd::Cancelled;
                }
                ChunkRecord::Error { message } => {
                    warn!(%message, "Server reported a turn failure");
                    return TurnEnd::Failed(message);
                }
            }
        }
    }

    /// Consume a turn and wait until its audio has finished playing.
    ///
    /// The turn is over only once the stream has ended and the queue has
    /// drained.
    pub async fn run_turn<S, F>(&self, records: S, on_record: F) -> TurnEnd
    where
        S: Stream<Item = Result<ChunkRecord, TransportError>>,
        F: FnMut(&ChunkRecord),
    {
        let turn = self.begin_turn().await;
        let end = self.consume(&turn, records, on_record).await;
        if end == TurnEnd::Completed {
            tokio::select! {
                () = self.playback.wait_idle() => {}
                () = turn.speaking.cancelled() => return TurnEnd::Paused,
            }
        }
        end
    }

    /// Pause: stop speaking, clear the queue, halt the current item, and ask
    /// the server to cancel the run.
    ///
    /// Local effects are complete when this returns. The cancellation
    /// request runs in the background; its outcome is logged and available
    /// through the returned handle.
    pub async fn pause(&self) -> JoinHandle<Option<CancelOutcome>> {
        if let Some(speaking) = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            speaking.cancel();
        }
        self.playback.stop().await;

        let canceller = Arc::clone(&self.canceller);
        tokio::spawn(async move {
            match canceller.cancel_run().await {
                Ok(outcome) => {
                    info!(status = ?outcome.status, message = %outcome.message, "Cancel request answered");
                    Some(outcome)
                }
                Err(e) => {
                    warn!(error = %e, "Cancel request failed");
                    None
                }
            }
        })
    }

    /// Playback state as the UI should show it.
    pub fn state(&self) -> PlaybackState {
        let paused = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled);
        if paused {
            return PlaybackState::Paused;
        }
        match self.playback.state() {
            SchedulerState::Playing => PlaybackState::Playing,
            SchedulerState::Idle | SchedulerState::Locked => PlaybackState::Idle,
        }
    }
}

impl std::fmt::Debug for TurnCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnCoordinator")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
