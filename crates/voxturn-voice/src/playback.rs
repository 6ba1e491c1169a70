//! Client playback scheduler.
//!
//! Chunk audio arrives at network pace and is played strictly one item at a
//! time, in arrival order. The queue logic lives in [`PlaybackQueue`], a plain
//! state machine; [`PlaybackScheduler`] runs it on a task that owns the audio
//! sink, so the transport reader and the player only ever talk through the
//! command channel.
//!
//! ```text
//!   enqueue ─┐                      ┌─► sink.play(item) ─┐
//!   unlock  ─┼─► commands ─► actor ─┤                    │ done(generation)
//!   stop    ─┘                      └─◄──────────────────┘
//! ```
//!
//! A playback error counts as a natural end: the item is skipped and the
//! next one starts. `stop` halts the current item without waiting for it and
//! clears the queue; items that arrive after a stop are discarded until the
//! next turn begins.
//!
//! When the environment needs an explicit gesture before audio may start,
//! the first `play_next` of each turn is held back until
//! [`PlaybackHandle::unlock`] is called.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use voxturn_core::AudioRef;

use crate::error::PlaybackError;

/// Plays one audio item to completion.
///
/// The returned future may be dropped at any await point when playback is
/// stopped; implementations must silence output when that happens.
#[async_trait]
pub trait AudioSink: Send + Sync + 'static {
    async fn play(&self, audio: &AudioRef) -> Result<(), PlaybackError>;
}

/// What the scheduler should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Start playing this item.
    Play(AudioRef),
    /// The queue ran dry after playback; nothing is playing now.
    Drained,
    /// Items are waiting for the autoplay gate to open.
    Locked,
    /// The queue was stopped for this turn; the item was dropped.
    Discarded,
    /// Nothing to do (an item is already playing, or the queue is empty).
    Wait,
}

/// Ordered playback queue with an optional autoplay gate.
///
/// Invariant: at most one item is playing at any time.
#[derive(Debug, Clone)]
pub struct PlaybackQueue {
    pending: VecDeque<AudioRef>,
    playing: bool,
    gated: bool,
    unlocked: bool,
    halted: bool,
}

impl PlaybackQueue {
    /// `gated` holds the first item of each turn until [`Self::unlock`].
    pub fn new(gated: bool) -> Self {
        Self {
            pending: VecDeque::new(),
            playing: false,
            gated,
            unlocked: !gated,
            halted: false,
        }
    }

    pub fn enqueue(&mut self, audio: AudioRef) -> Advance {
        if self.halted {
            return Advance::Discarded;
        }
        self.pending.push_back(audio);
        if self.playing {
            Advance::Wait
        } else {
            self.play_next()
        }
    }

    /// Pop the head of the queue and play it.
    pub fn play_next(&mut self) -> Advance {
        if !self.unlocked && !self.pending.is_empty() {
            self.playing = false;
            return Advance::Locked;
        }
        match self.pending.pop_front() {
            Some(next) => {
                self.playing = true;
                Advance::Play(next)
            }
            None => {
                let was_playing = std::mem::replace(&mut self.playing, false);
                if was_playing {
                    Advance::Drained
                } else {
                    Advance::Wait
                }
            }
        }
    }

    /// The current item ended, naturally or with an error.
    pub fn finished(&mut self) -> Advance {
        self.play_next()
    }

    /// Open the autoplay gate for the rest of the turn.
    pub fn unlock(&mut self) -> Advance {
        self.unlocked = true;
        if self.playing {
            Advance::Wait
        } else {
            self.play_next()
        }
    }

    /// Halt and clear. Nothing more is accepted until [`Self::begin_turn`],
    /// and the gate closes again for the next turn.
    pub fn stop(&mut self) {
        self.reset();
        self.halted = true;
    }

    /// Reset for a new turn.
    pub fn begin_turn(&mut self) {
        self.reset();
        self.halted = false;
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.playing = false;
        self.unlocked = !self.gated;
    }

    pub const fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_idle(&self) -> bool {
        !self.playing && self.pending.is_empty()
    }
}

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Playing,
    /// Audio is queued but the autoplay gate is closed.
    Locked,
}

/// Notifications for the UI layer.
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    Started(AudioRef),
    Finished(AudioRef),
    /// The item errored and was skipped.
    Failed { audio: AudioRef, error: PlaybackError },
    /// Everything queued has been played.
    Drained,
    /// Playback was halted by `stop`.
    Stopped,
    /// Audio is waiting for a user gesture.
    UnlockRequired,
}

#[derive(Debug, Clone)]
pub struct PlaybackOptions {
    /// Hold the first item of each turn until `unlock`.
    pub require_unlock: bool,
    pub command_capacity: usize,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            require_unlock: false,
            command_capacity: 64,
        }
    }
}

enum Command {
    Enqueue(AudioRef),
    Unlock,
    BeginTurn,
    Stop(oneshot::Sender<()>),
    WaitIdle(oneshot::Sender<()>),
}

/// Handle to a running scheduler. Cheap to clone; the scheduler stops when
/// every handle is dropped.
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SchedulerState>,
}

impl PlaybackHandle {
    /// Append an item; starts playback if nothing is playing.
    pub async fn enqueue(&self, audio: AudioRef) {
        self.send(Command::Enqueue(audio)).await;
    }

    /// Release the autoplay gate.
    pub async fn unlock(&self) {
        self.send(Command::Unlock).await;
    }

    /// Clear leftovers and close the gate for a new turn.
    pub async fn begin_turn(&self) {
        self.send(Command::BeginTurn).await;
    }

    /// Halt the current item and clear the queue. Resolves once the
    /// scheduler has applied the stop.
    pub async fn stop(&self) {
        let (ack, done) = oneshot::channel();
        self.send(Command::Stop(ack)).await;
        let _ = done.await;
    }

    /// Resolve once everything enqueued before this call has played (or
    /// been stopped).
    pub async fn wait_idle(&self) {
        let (ack, done) = oneshot::channel();
        self.send(Command::WaitIdle(ack)).await;
        let _ = done.await;
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    async fn send(&self, command: Command) {
        if self.commands.send(command).await.is_err() {
            debug!("Playback scheduler has shut down");
        }
    }
}

struct Done {
    generation: u64,
    audio: AudioRef,
    result: Result<(), PlaybackError>,
}

/// Task that owns the queue and the sink.
pub struct PlaybackScheduler<S: AudioSink> {
    sink: Arc<S>,
    queue: PlaybackQueue,
    current: Option<JoinHandle<()>>,
    generation: u64,
    done_tx: mpsc::UnboundedSender<Done>,
    state: watch::Sender<SchedulerState>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
    idle_waiters: Vec<oneshot::Sender<()>>,
}

impl<S: AudioSink> PlaybackScheduler<S> {
    /// Start a scheduler on the current runtime.
    pub fn spawn(
        sink: S,
        options: PlaybackOptions,
    ) -> (PlaybackHandle, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (commands_tx, commands_rx) = mpsc::channel(options.command_capacity.max(1));
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let scheduler = Self {
            sink: Arc::new(sink),
            queue: PlaybackQueue::new(options.require_unlock),
            current: None,
            generation: 0,
            done_tx,
            state: state_tx,
            events: events_tx,
            idle_waiters: Vec::new(),
        };
        tokio::spawn(scheduler.run(commands_rx, done_rx));

        let handle = PlaybackHandle {
            commands: commands_tx,
            state: state_rx,
        };
        (handle, events_rx)
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut done: mpsc::UnboundedReceiver<Done>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(finished) = done.recv() => self.on_done(finished),
            }
        }
        self.halt();
        debug!("Playback scheduler stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Enqueue(audio) => {
                let advance = self.queue.enqueue(audio);
                self.apply(advance);
            }
            Command::Unlock => {
                let advance = self.queue.unlock();
                self.apply(advance);
            }
            Command::BeginTurn => {
                self.halt();
                self.queue.begin_turn();
                self.set_state(SchedulerState::Idle);
                self.release_idle_waiters();
            }
            Command::Stop(ack) => {
                self.halt();
                self.queue.stop();
                self.set_state(SchedulerState::Idle);
                self.emit(PlaybackEvent::Stopped);
                self.release_idle_waiters();
                let _ = ack.send(());
            }
            Command::WaitIdle(ack) => {
                if self.queue.is_idle() {
                    let _ = ack.send(());
                } else {
                    self.idle_waiters.push(ack);
                }
            }
        }
    }

    fn on_done(&mut self, done: Done) {
        if done.generation != self.generation || self.current.is_none() {
            // Completion of an item that was already stopped.
            return;
        }
        self.current = None;

        match done.result {
            Ok(()) => self.emit(PlaybackEvent::Finished(done.audio)),
            Err(error) => {
                warn!(audio = %done.audio, error = %error, "Playback failed, skipping item");
                self.emit(PlaybackEvent::Failed {
                    audio: done.audio,
                    error,
                });
            }
        }

        let advance = self.queue.finished();
        self.apply(advance);
    }

    fn apply(&mut self, advance: Advance) {
        match advance {
            Advance::Play(audio) => self.start(audio),
            Advance::Drained => {
                self.set_state(SchedulerState::Idle);
                self.emit(PlaybackEvent::Drained);
                self.release_idle_waiters();
            }
            Advance::Locked => {
                if self.state.send_replace(SchedulerState::Locked) != SchedulerState::Locked {
                    self.emit(PlaybackEvent::UnlockRequired);
                }
            }
            Advance::Discarded => debug!("Playback stopped for this turn, item discarded"),
            Advance::Wait => {}
        }
    }

    fn start(&mut self, audio: AudioRef) {
        self.generation += 1;
        let generation = self.generation;
        let sink = Arc::clone(&self.sink);
        let done_tx = self.done_tx.clone();

        debug!(audio = %audio, "Starting playback");
        self.emit(PlaybackEvent::Started(audio.clone()));
        self.set_state(SchedulerState::Playing);

        self.current = Some(tokio::spawn(async move {
            let result = sink.play(&audio).await;
            let _ = done_tx.send(Done {
                generation,
                audio,
                result,
            });
        }));
    }

    /// Abort the current item without waiting for its end.
    fn halt(&mut self) {
        if let Some(task) = self.current.take() {
            task.abort();
        }
        self.generation += 1;
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.send_replace(state);
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.events.send(event);
    }

    fn release_idle_waiters(&mut self) {
        for waiter in self.idle_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }
}
