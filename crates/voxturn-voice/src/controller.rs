//! Run controller: the lifecycle of one agent turn per conversation.
//!
//! A turn moves `Idle → Submitting → Streaming → Completed | Cancelled |
//! Failed`. While streaming, a spawned worker pulls the agent's token stream
//! into a [`Chunker`], synthesizes each finalized chunk and emits one record
//! per chunk, strictly in ordinal order: chunk N+1 is not touched until
//! chunk N's record has been sent.
//!
//! Cancellation is cooperative. Each turn gets a fresh
//! [`CancellationToken`]; it is checked at every chunk boundary, before and
//! after each synthesis call, and before each record is sent. An in-flight
//! upstream call is never interrupted, only its result is discarded.
//!
//! ```text
//!   submit() ──► TurnWorker ──records──► mpsc ──► TurnStream (HTTP body)
//!                   ▲   │
//!   cancel() ──token┘   └── agent.cancel_run() on cancellation
//! ```

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use voxturn_core::{
    AgentError, AgentEvent, AgentEventStream, CancelOutcome, CancelStatus, ChunkRecord,
    ConversationAgent, ConversationId, RunId, RunPhase, SessionKey, SpeechChunk, TurnError,
    TurnId, TurnSnapshot,
};

use crate::chunker::{Chunker, FinalizedChunk};
use crate::synthesizer::ChunkSynthesizer;

/// Tunables for the run controller.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Records buffered between the worker and the transport.
    pub record_capacity: usize,
    /// How long a cancelled turn waits for the upstream run id so the
    /// abort can target it.
    pub cancel_grace: Duration,
    /// How long the final `cancelled` or `error` record may wait for a
    /// reader that has stopped pulling before it is dropped.
    pub terminal_timeout: Duration,
    /// Sessions with no turn activity for this long are forgotten, along
    /// with their upstream conversation.
    pub idle_session_ttl: Duration,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            record_capacity: 16,
            cancel_grace: Duration::from_secs(5),
            terminal_timeout: Duration::from_secs(2),
            idle_session_ttl: Duration::from_secs(60 * 60),
        }
    }
}

/// External collaborators a controller drives.
#[derive(Clone)]
pub struct TurnDeps {
    pub agent: Arc<dyn ConversationAgent>,
    pub synthesizer: ChunkSynthesizer,
}

/// The record stream of one turn, as handed to the transport.
///
/// Dropping it before the turn ends counts as a cancellation.
#[derive(Debug)]
pub struct TurnStream {
    pub turn_id: TurnId,
    records: ReceiverStream<ChunkRecord>,
}

impl Stream for TurnStream {
    type Item = ChunkRecord;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.records).poll_next(cx)
    }
}

/// Shared state of one turn, held by the controller and its worker.
#[derive(Debug)]
struct TurnHandle {
    id: TurnId,
    cancel: CancellationToken,
    phase: watch::Sender<RunPhase>,
    upstream: Mutex<Option<(ConversationId, RunId)>>,
    conversation: Mutex<Option<ConversationId>>,
    abort_sent: AtomicBool,
    chunks_emitted: AtomicU32,
    started_at: DateTime<Utc>,
    settled_at: Mutex<Option<Instant>>,
}

impl TurnHandle {
    fn new() -> Self {
        let (phase, _) = watch::channel(RunPhase::Submitting);
        Self {
            id: TurnId::new(),
            cancel: CancellationToken::new(),
            phase,
            upstream: Mutex::new(None),
            conversation: Mutex::new(None),
            abort_sent: AtomicBool::new(false),
            chunks_emitted: AtomicU32::new(0),
            started_at: Utc::now(),
            settled_at: Mutex::new(None),
        }
    }

    fn phase(&self) -> RunPhase {
        *self.phase.borrow()
    }

    fn set_phase(&self, phase: RunPhase) {
        if phase.is_terminal() {
            *self.settled_at.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        }
        let previous = self.phase.send_replace(phase);
        debug!(turn_id = %self.id, from = %previous, to = %phase, "Turn phase changed");
    }

    fn settled_at(&self) -> Option<Instant> {
        *self.settled_at.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_conversation(&self, conversation: ConversationId) {
        *self.conversation.lock().unwrap_or_else(PoisonError::into_inner) = Some(conversation);
    }

    fn attach_run(&self, conversation: ConversationId, run: RunId) {
        debug!(turn_id = %self.id, run_id = %run, "Upstream run created");
        *self.upstream.lock().unwrap_or_else(PoisonError::into_inner) = Some((conversation, run));
    }

    fn upstream(&self) -> Option<(ConversationId, RunId)> {
        self.upstream.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Ask the agent to stop the upstream run. At most one request is sent
    /// per turn; failures are logged, never surfaced.
    async fn abort_upstream(&self, agent: &dyn ConversationAgent) {
        let Some((conversation, run)) = self.upstream() else {
            debug!(turn_id = %self.id, "Upstream run id not known yet, abort deferred");
            return;
        };
        if self.abort_sent.swap(true, Ordering::SeqCst) {
            return;
        }
        match agent.cancel_run(&conversation, &run).await {
            Ok(()) => info!(turn_id = %self.id, run_id = %run, "Upstream run aborted"),
            Err(e) => {
                warn!(turn_id = %self.id, run_id = %run, error = %e, "Failed to abort upstream run");
            }
        }
    }

    fn snapshot(&self, session: &SessionKey) -> TurnSnapshot {
        let phase = self.phase();
        TurnSnapshot {
            turn_id: self.id,
            session: session.clone(),
            phase,
            state: phase.turn_state(),
            conversation_id: self
                .conversation
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            run_id: self.upstream().map(|(_, run)| run),
            chunks_emitted: self.chunks_emitted.load(Ordering::SeqCst),
            started_at: self.started_at,
        }
    }
}

/// A turn slot claimed before its text is known, e.g. while a recording is
/// being transcribed.
///
/// The session counts as busy and `cancel` acts on the reserved turn.
/// Dropping the reservation unused settles the turn as failed (or
/// cancelled, if it was).
#[derive(Debug)]
pub struct TurnReservation {
    handle: Arc<TurnHandle>,
    armed: bool,
}

impl TurnReservation {
    pub fn turn_id(&self) -> TurnId {
        self.handle.id
    }

    fn claim(mut self) -> Arc<TurnHandle> {
        self.armed = false;
        Arc::clone(&self.handle)
    }
}

impl Drop for TurnReservation {
    fn drop(&mut self) {
        if !self.armed || !self.handle.phase().is_active() {
            return;
        }
        let phase = if self.handle.cancel.is_cancelled() {
            RunPhase::Cancelled
        } else {
            RunPhase::Failed
        };
        debug!(turn_id = %self.handle.id, %phase, "Reserved turn abandoned");
        self.handle.set_phase(phase);
    }
}

/// Owns the turns of one conversation. At most one turn is active at a time.
pub struct TurnController {
    session: SessionKey,
    deps: TurnDeps,
    config: TurnConfig,
    conversation: tokio::sync::Mutex<Option<ConversationId>>,
    current: Mutex<Option<Arc<TurnHandle>>>,
    created_at: Instant,
}

impl TurnController {
    pub fn new(session: SessionKey, deps: TurnDeps, config: TurnConfig) -> Self {
        Self {
            session,
            deps,
            config,
            conversation: tokio::sync::Mutex::new(None),
            current: Mutex::new(None),
            created_at: Instant::now(),
        }
    }

    pub const fn session(&self) -> &SessionKey {
        &self.session
    }

    /// Start a turn for `text` and return its record stream.
    ///
    /// The first record is always the transcription echo. Errors before the
    /// agent's token stream opens are returned here and no stream exists;
    /// later failures end the stream with an `error` record.
    pub async fn submit(&self, text: impl Into<String>) -> Result<TurnStream, TurnError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(TurnError::EmptyInput);
        }
        let reservation = self.reserve()?;
        self.submit_reserved(reservation, text).await
    }

    /// Start a previously reserved turn.
    ///
    /// If the reservation was cancelled in the meantime the agent is never
    /// contacted; the stream carries the echo and a `cancelled` record.
    pub async fn submit_reserved(
        &self,
        reservation: TurnReservation,
        text: impl Into<String>,
    ) -> Result<TurnStream, TurnError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(TurnError::EmptyInput);
        }

        let handle = reservation.claim();
        info!(session = %self.session, turn_id = %handle.id, "Turn submitted");

        if handle.cancel.is_cancelled() {
            info!(session = %self.session, turn_id = %handle.id, "Turn cancelled before it started");
            handle.set_phase(RunPhase::Cancelled);
            return Ok(settled_stream(&handle, text));
        }

        let (conversation, events) = match self.open_stream(&handle, &text).await {
            Ok(opened) => opened,
            Err(e) => {
                error!(session = %self.session, turn_id = %handle.id, error = %e, "Failed to start turn");
                handle.set_phase(RunPhase::Failed);
                return Err(e.into());
            }
        };

        handle.set_phase(RunPhase::Streaming);

        let (tx, rx) = mpsc::channel(self.config.record_capacity.max(1));
        let worker = TurnWorker {
            handle: Arc::clone(&handle),
            agent: Arc::clone(&self.deps.agent),
            synthesizer: self.deps.synthesizer.clone(),
            conversation,
            records: tx,
            chunker: Chunker::new(),
            cancel_grace: self.config.cancel_grace,
            terminal_timeout: self.config.terminal_timeout,
        };
        tokio::spawn(worker.run(text, events));

        Ok(TurnStream {
            turn_id: handle.id,
            records: ReceiverStream::new(rx),
        })
    }

    /// Cancel the active turn. Idempotent.
    ///
    /// Sets the turn's cancellation flag and, if the upstream run is known,
    /// asks the agent to abort it. Cancelling a finished turn reports
    /// success without doing anything.
    pub async fn cancel(&self) -> CancelOutcome {
        let Some(handle) = self.current() else {
            return CancelOutcome::new(CancelStatus::NoActiveTurn, "No turn to cancel");
        };

        if handle.phase().is_terminal() {
            debug!(session = %self.session, turn_id = %handle.id, "Cancel requested for finished turn");
            return CancelOutcome::new(CancelStatus::AlreadyFinished, "Turn already finished");
        }

        info!(session = %self.session, turn_id = %handle.id, "Cancelling turn");
        handle.cancel.cancel();
        handle.abort_upstream(self.deps.agent.as_ref()).await;
        CancelOutcome::new(CancelStatus::Cancelled, "Turn cancelled")
    }

    /// State of the current or most recent turn.
    pub fn snapshot(&self) -> Option<TurnSnapshot> {
        self.current().map(|handle| handle.snapshot(&self.session))
    }

    /// Phase of the current or most recent turn.
    pub fn phase(&self) -> RunPhase {
        self.current().map_or(RunPhase::Idle, |handle| handle.phase())
    }

    /// Resolve once the current turn has reached a terminal phase.
    pub async fn wait_finished(&self) -> RunPhase {
        let Some(handle) = self.current() else {
            return RunPhase::Idle;
        };
        let mut phase = handle.phase.subscribe();
        match phase.wait_for(|p| p.is_terminal()).await {
            Ok(p) => *p,
            Err(_) => handle.phase(),
        }
    }

    /// Whether no turn has been active for at least `ttl`.
    pub fn is_idle_for(&self, ttl: Duration) -> bool {
        let since = match self.current() {
            Some(handle) => handle.settled_at(),
            None => Some(self.created_at),
        };
        since.is_some_and(|since| since.elapsed() >= ttl)
    }

    /// Claim the session for a new turn unless one is still active (single
    /// flight).
    pub fn reserve(&self) -> Result<TurnReservation, TurnError> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().is_some_and(|h| h.phase().is_active()) {
            return Err(TurnError::TurnInProgress(self.session.clone()));
        }
        let handle = Arc::new(TurnHandle::new());
        *current = Some(Arc::clone(&handle));
        Ok(TurnReservation {
            handle,
            armed: true,
        })
    }

    fn current(&self) -> Option<Arc<TurnHandle>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn open_stream(
        &self,
        handle: &TurnHandle,
        text: &str,
    ) -> Result<(ConversationId, AgentEventStream), AgentError> {
        let conversation = self.ensure_conversation().await?;
        handle.set_conversation(conversation.clone());
        let events = self.deps.agent.stream_reply(&conversation, text).await?;
        Ok((conversation, events))
    }

    /// The upstream conversation is created lazily and reused across turns.
    async fn ensure_conversation(&self) -> Result<ConversationId, AgentError> {
        let mut conversation = self.conversation.lock().await;
        if let Some(id) = conversation.as_ref() {
            return Ok(id.clone());
        }
        let id = self.deps.agent.create_conversation().await?;
        info!(session = %self.session, conversation = %id, "Created conversation");
        *conversation = Some(id.clone());
        Ok(id)
    }
}

impl std::fmt::Debug for TurnController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnController")
            .field("session", &self.session)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

/// Record stream of a turn that ended before any work started.
fn settled_stream(handle: &TurnHandle, text: String) -> TurnStream {
    let mut records: Vec<ChunkRecord> =
        SpeechChunk::transcription_echo(text).into_record().into_iter().collect();
    records.push(ChunkRecord::Cancelled);

    let (tx, rx) = mpsc::channel(records.len());
    for record in records {
        let _ = tx.try_send(record);
    }
    TurnStream {
        turn_id: handle.id,
        records: ReceiverStream::new(rx),
    }
}

/// How the streaming phase of a turn ended.
enum Ending {
    Completed,
    Cancelled,
    /// The record receiver was dropped.
    Disconnected,
    Failed(AgentError),
}

struct TurnWorker {
    handle: Arc<TurnHandle>,
    agent: Arc<dyn ConversationAgent>,
    synthesizer: ChunkSynthesizer,
    conversation: ConversationId,
    records: mpsc::Sender<ChunkRecord>,
    chunker: Chunker,
    cancel_grace: Duration,
    terminal_timeout: Duration,
}

impl TurnWorker {
    async fn run(mut self, text: String, mut events: AgentEventStream) {
        let ending = self.stream(text, &mut events).await;
        let turn_id = self.handle.id;

        match ending {
            Ending::Completed => {
                self.handle.set_phase(RunPhase::Completed);
                info!(
                    turn_id = %turn_id,
                    chunks = self.handle.chunks_emitted.load(Ordering::SeqCst),
                    "Turn completed"
                );
            }
            Ending::Cancelled => {
                tokio::join!(
                    self.send_terminal(ChunkRecord::Cancelled),
                    self.stop_upstream(&mut events)
                );
                self.handle.set_phase(RunPhase::Cancelled);
                info!(turn_id = %turn_id, "Turn cancelled");
            }
            Ending::Disconnected => {
                info!(turn_id = %turn_id, "Client disconnected mid-turn, cancelling");
                self.handle.cancel.cancel();
                self.stop_upstream(&mut events).await;
                self.handle.set_phase(RunPhase::Cancelled);
            }
            Ending::Failed(e) => {
                error!(turn_id = %turn_id, error = %e, "Turn failed mid-stream");
                self.handle.set_phase(RunPhase::Failed);
                self.send_terminal(ChunkRecord::Error {
                    message: e.to_string(),
                })
                .await;
            }
        }
    }

    async fn stream(&mut self, text: String, events: &mut AgentEventStream) -> Ending {
        if let Some(echo) = SpeechChunk::transcription_echo(text).into_record() {
            if let Some(ending) = self.emit(echo).await {
                return ending;
            }
        }

        loop {
            let event = tokio::select! {
                biased;
                () = self.handle.cancel.cancelled() => return Ending::Cancelled,
                event = events.next() => event,
            };

            match event {
                Some(Ok(AgentEvent::RunCreated(run))) => {
                    self.handle.attach_run(self.conversation.clone(), run);
                }
                Some(Ok(AgentEvent::TextDelta(delta))) => {
                    for chunk in self.chunker.append(&delta) {
                        if let Some(ending) = self.process(chunk).await {
                            return ending;
                        }
                    }
                }
                Some(Ok(AgentEvent::Completed)) => return self.complete().await,
                Some(Err(e)) => return Ending::Failed(e),
                None => {
                    warn!(turn_id = %self.handle.id, "Agent stream closed without completion signal");
                    return self.complete().await;
                }
            }
        }
    }

    /// Flush the chunker's remainder as the final chunk.
    async fn complete(&mut self) -> Ending {
        match self.chunker.flush() {
            Some(chunk) => self.process(chunk).await.unwrap_or(Ending::Completed),
            None => Ending::Completed,
        }
    }

    /// Synthesize and emit one chunk. Returns the ending if the turn must
    /// stop here.
    async fn process(&self, chunk: FinalizedChunk) -> Option<Ending> {
        if self.handle.cancel.is_cancelled() {
            return Some(Ending::Cancelled);
        }

        let ordinal = chunk.ordinal;
        let speech = self.synthesizer.synthesize_chunk(chunk, &self.handle.cancel).await;
        let Some(record) = speech.into_record() else {
            return Some(Ending::Cancelled);
        };

        let ending = self.emit(record).await;
        if ending.is_none() {
            self.handle.chunks_emitted.fetch_add(1, Ordering::SeqCst);
            debug!(turn_id = %self.handle.id, ordinal, "Chunk emitted");
        }
        ending
    }

    /// Send a record unless the turn is cancelled first.
    async fn emit(&self, record: ChunkRecord) -> Option<Ending> {
        tokio::select! {
            biased;
            () = self.handle.cancel.cancelled() => Some(Ending::Cancelled),
            sent = self.records.send(record) => sent.err().map(|_| Ending::Disconnected),
        }
    }

    /// Best-effort delivery of the last record. A reader that stopped
    /// pulling (a paused client) must not keep the turn open.
    async fn send_terminal(&self, record: ChunkRecord) {
        match self.records.send_timeout(record, self.terminal_timeout).await {
            Ok(()) | Err(SendTimeoutError::Closed(_)) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                debug!(turn_id = %self.handle.id, "Reader stalled, terminal record dropped");
            }
        }
    }

    /// Make sure the upstream run stops. If the run id has not arrived yet,
    /// keep reading the stream for a bounded time to learn it.
    async fn stop_upstream(&self, events: &mut AgentEventStream) {
        if self.handle.upstream().is_none() {
            let wait_for_run = async {
                while let Some(event) = events.next().await {
                    match event {
                        Ok(AgentEvent::RunCreated(run)) => {
                            self.handle.attach_run(self.conversation.clone(), run);
                            return;
                        }
                        Ok(AgentEvent::TextDelta(_)) => {}
                        Ok(AgentEvent::Completed) | Err(_) => return,
                    }
                }
            };
            if tokio::time::timeout(self.cancel_grace, wait_for_run).await.is_err() {
                warn!(turn_id = %self.handle.id, "Upstream run id never arrived, cannot abort");
            }
        }
        self.handle.abort_upstream(self.agent.as_ref()).await;
    }
}
