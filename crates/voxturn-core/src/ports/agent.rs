//! Conversational agent port.
//!
//! The agent accepts a conversation identifier plus user text and answers
//! with an incremental token stream terminated by a completion signal.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use thiserror::Error;

use crate::domain::{ConversationId, RunId};

/// One event from the agent's token stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// The upstream run was created; its id is needed to abort it.
    RunCreated(RunId),
    /// A fragment of reply text.
    TextDelta(String),
    /// The reply is complete.
    Completed,
}

/// Boxed token stream returned by [`ConversationAgent::stream_reply`].
pub type AgentEventStream = Pin<Box<dyn Stream<Item = Result<AgentEvent, AgentError>> + Send>>;

/// Errors from the conversational agent.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    /// The request could not be sent (connection, TLS, timeout).
    #[error("Agent request failed: {0}")]
    Request(String),

    /// The agent answered with a non-success status.
    #[error("Agent returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The token stream broke mid-turn.
    #[error("Agent stream failed: {0}")]
    Stream(String),

    /// A response body could not be decoded.
    #[error("Unexpected agent response: {0}")]
    Decode(String),
}

/// Backend-agnostic conversational agent.
#[async_trait]
pub trait ConversationAgent: Send + Sync {
    /// Create a new upstream conversation (thread).
    async fn create_conversation(&self) -> Result<ConversationId, AgentError>;

    /// Append `text` as the user's message and open the reply stream.
    ///
    /// Returning `Ok` means the stream is open; failures after that point
    /// arrive as `Err` items on the stream.
    async fn stream_reply(
        &self,
        conversation: &ConversationId,
        text: &str,
    ) -> Result<AgentEventStream, AgentError>;

    /// Ask the agent to abort a run that is still active.
    async fn cancel_run(&self, conversation: &ConversationId, run: &RunId)
    -> Result<(), AgentError>;
}
