//! Turn-level errors surfaced synchronously to the caller.

use thiserror::Error;

use crate::domain::SessionKey;
use crate::ports::AgentError;

/// Errors returned when a turn cannot be started.
///
/// Failures after the first record has been emitted never surface here;
/// they end the record stream with a best-effort `error` record.
#[derive(Debug, Clone, Error)]
pub enum TurnError {
    /// Single-flight: another turn is still submitting or streaming.
    #[error("A turn is already in progress for session '{0}'")]
    TurnInProgress(SessionKey),

    /// Nothing to say.
    #[error("Turn text is empty")]
    EmptyInput,

    /// The agent failed before the token stream opened.
    #[error(transparent)]
    Agent(#[from] AgentError),
}
