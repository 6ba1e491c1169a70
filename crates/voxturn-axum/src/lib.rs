//! Axum HTTP adapter for voxturn.
//!
//! Exposes the turn pipeline over HTTP: recording upload and typed turns
//! streamed back as NDJSON, cancellation, turn status, scripted speech, and
//! the synthesized audio itself.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Dev-dependencies only used by integration tests
#[cfg(test)]
use futures_util as _;
#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use serde_json as _;
#[cfg(test)]
use tempfile as _;
#[cfg(test)]
use tower as _;

pub mod audio_store;
pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

// Re-export primary types
pub use audio_store::MemoryAudioStore;
pub use bootstrap::{AxumContext, CorsConfig, ServerConfig, ServerPorts, bootstrap, start_server};
pub use error::HttpError;
pub use routes::{create_router, create_spa_router};
pub use state::AppState;
