//! In-process fakes for the agent, TTS, audio store and audio output.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream;
use tokio::sync::{Notify, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;
use voxturn_core::{
    AgentError, AgentEvent, AgentEventStream, AudioRef, AudioStore, AudioStoreError,
    ConversationAgent, ConversationId, RunId, SpeechSynthesizer, SynthesisError,
    SynthesizedAudio,
};
use voxturn_voice::{AudioSink, ChunkSynthesizer, PlaybackError, TurnDeps};

pub type AgentItem = Result<AgentEvent, AgentError>;

enum Script {
    Fixed(Vec<AgentItem>),
    Live(mpsc::UnboundedReceiver<AgentItem>),
    FailOpen,
}

/// Agent whose replies are scripted per turn, in submission order.
#[derive(Default)]
pub struct MockAgent {
    scripts: Mutex<VecDeque<Script>>,
    conversations: AtomicUsize,
    pub cancelled: Mutex<Vec<(ConversationId, RunId)>>,
}

impl MockAgent {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Next turn replies with exactly these events.
    pub fn script(&self, events: Vec<AgentItem>) {
        self.scripts.lock().unwrap().push_back(Script::Fixed(events));
    }

    /// Next turn replies with whatever the test sends, when it sends it.
    pub fn live(&self) -> mpsc::UnboundedSender<AgentItem> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.scripts.lock().unwrap().push_back(Script::Live(rx));
        tx
    }

    /// Next turn fails before its stream opens.
    pub fn fail_open(&self) {
        self.scripts.lock().unwrap().push_back(Script::FailOpen);
    }

    pub fn conversations_created(&self) -> usize {
        self.conversations.load(Ordering::SeqCst)
    }

    pub fn cancelled_runs(&self) -> Vec<RunId> {
        self.cancelled.lock().unwrap().iter().map(|(_, run)| run.clone()).collect()
    }
}

#[async_trait]
impl ConversationAgent for MockAgent {
    async fn create_conversation(&self) -> Result<ConversationId, AgentError> {
        let n = self.conversations.fetch_add(1, Ordering::SeqCst);
        Ok(ConversationId::new(format!("thread_{n}")))
    }

    async fn stream_reply(
        &self,
        _conversation: &ConversationId,
        _text: &str,
    ) -> Result<AgentEventStream, AgentError> {
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(Script::Fixed(events)) => Ok(stream::iter(events).boxed()),
            Some(Script::Live(rx)) => Ok(UnboundedReceiverStream::new(rx).boxed()),
            Some(Script::FailOpen) => Err(AgentError::Upstream {
                status: 500,
                body: "agent unavailable".into(),
            }),
            None => Ok(stream::iter(vec![Ok(AgentEvent::Completed)]).boxed()),
        }
    }

    async fn cancel_run(&self, conversation: &ConversationId, run: &RunId) -> Result<(), AgentError> {
        self.cancelled.lock().unwrap().push((conversation.clone(), run.clone()));
        Ok(())
    }
}

pub fn run_created(id: &str) -> AgentItem {
    Ok(AgentEvent::RunCreated(RunId::new(id)))
}

pub fn delta(text: &str) -> AgentItem {
    Ok(AgentEvent::TextDelta(text.into()))
}

pub fn completed() -> AgentItem {
    Ok(AgentEvent::Completed)
}

/// TTS that echoes its input. Text containing `hold_on` blocks until
/// [`GatedTts::release`] is notified.
#[derive(Default)]
pub struct GatedTts {
    pub calls: AtomicUsize,
    pub hold_on: Option<&'static str>,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedTts {
    pub fn holding_on(word: &'static str) -> Arc<Self> {
        Arc::new(Self {
            hold_on: Some(word),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for GatedTts {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hold_on.is_some_and(|word| text.contains(word)) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(SynthesizedAudio {
            bytes: Bytes::from(text.to_string()),
            content_type: "audio/mpeg".into(),
        })
    }
}

/// Store that turns audio bytes back into a readable reference.
pub struct EchoStore;

#[async_trait]
impl AudioStore for EchoStore {
    async fn put(&self, audio: SynthesizedAudio) -> Result<AudioRef, AudioStoreError> {
        Ok(mem_ref(&String::from_utf8_lossy(&audio.bytes)))
    }
}

pub fn mem_ref(text: &str) -> AudioRef {
    AudioRef::new(format!("mem://{text}"))
}

pub fn deps(agent: Arc<MockAgent>, tts: Arc<GatedTts>) -> TurnDeps {
    TurnDeps {
        agent,
        synthesizer: ChunkSynthesizer::new(tts, Arc::new(EchoStore)),
    }
}

/// Audio output that records what it played.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub played: Arc<Mutex<Vec<AudioRef>>>,
    pub duration: Duration,
}

impl RecordingSink {
    pub fn played(&self) -> Vec<AudioRef> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn play(&self, audio: &AudioRef) -> Result<(), PlaybackError> {
        tokio::time::sleep(self.duration).await;
        self.played.lock().unwrap().push(audio.clone());
        Ok(())
    }
}

/// Poll `check` until it holds, failing the test after two seconds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
