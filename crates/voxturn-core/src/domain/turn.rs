//! Turn identity and lifecycle.
//!
//! A turn is one user-utterance-to-agent-reply cycle. It is owned by exactly
//! one run controller, keyed by [`SessionKey`], and moves through the
//! [`RunPhase`] state machine:
//!
//! ```text
//!   Idle → Submitting → Streaming → Completed
//!                           │    └──→ Cancelled
//!                           └───────→ Failed
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client-facing conversation key.
///
/// Selects which per-conversation run controller handles a request. Clients
/// that never send one share the `"default"` session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub const DEFAULT: &'static str = "default";

    /// Build a session key, falling back to the default for blank input.
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            Self::default()
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionKey {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-assigned, opaque turn identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(Uuid);

impl TurnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Upstream conversation (thread) identifier, stable across turns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upstream run identifier, known once the agent's token stream reports it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Run controller state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    /// No turn has been submitted yet.
    Idle,
    /// User text received, upstream stream not open yet.
    Submitting,
    /// Upstream token stream is open and chunks are being produced.
    Streaming,
    /// Upstream signalled completion and every chunk was emitted.
    Completed,
    /// Cancellation won the race; a `cancelled` record was emitted.
    Cancelled,
    /// An upstream error ended the turn.
    Failed,
}

impl RunPhase {
    /// Whether a turn in this phase blocks a new submission.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Submitting | Self::Streaming)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Coarse completion state of the turn in this phase.
    ///
    /// Returns `None` for [`RunPhase::Idle`], where no turn exists.
    pub const fn turn_state(self) -> Option<TurnState> {
        match self {
            Self::Idle => None,
            Self::Submitting | Self::Streaming => Some(TurnState::Active),
            Self::Completed => Some(TurnState::Completed),
            Self::Cancelled => Some(TurnState::Cancelled),
            Self::Failed => Some(TurnState::Failed),
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Completion state of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnState {
    Active,
    Completed,
    Cancelled,
    Failed,
}

/// Point-in-time view of a session's current (or most recent) turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnSnapshot {
    pub turn_id: TurnId,
    pub session: SessionKey,
    pub phase: RunPhase,
    pub state: Option<TurnState>,
    /// Upstream conversation, once known.
    pub conversation_id: Option<ConversationId>,
    /// Upstream run, once the token stream has reported it.
    pub run_id: Option<RunId>,
    /// Number of `audio` records delivered to the client so far.
    pub chunks_emitted: u32,
    pub started_at: DateTime<Utc>,
}
