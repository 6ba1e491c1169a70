//! Error types for the transport codec, playback, and the turn client.

/// Errors decoding the newline-delimited chunk transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A line was not a valid chunk record.
    #[error("Malformed chunk record {line:?}: {source}")]
    Malformed {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    /// The underlying byte stream failed.
    #[error("Chunk stream read failed: {0}")]
    Read(String),
}

/// Errors playing one audio item. The scheduler treats every one of them
/// like a natural end and moves on.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlaybackError {
    /// The audio reference could not be fetched.
    #[error("Failed to fetch audio: {0}")]
    Fetch(String),

    /// The fetched bytes are not a playable format.
    #[error("Failed to decode audio: {0}")]
    Decode(String),

    /// No output device, or the device failed mid-play.
    #[error("Audio output failed: {0}")]
    Output(String),
}

/// Errors talking to the turn server.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Request to turn server failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Turn server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}
