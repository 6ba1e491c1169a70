//! HTTP request handlers for the Axum web server.
//!
//! Each submodule contains handlers for one API area. Turn endpoints select
//! their conversation with an optional `?session=` query parameter.

use serde::Deserialize;
use voxturn_core::SessionKey;

pub mod audio;
pub mod cancel;
pub mod scripted;
pub mod turn;

/// `?session=` query parameter.
#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    pub session: Option<String>,
}

impl SessionQuery {
    pub fn key(&self) -> SessionKey {
        self.session.as_deref().map_or_else(SessionKey::default, SessionKey::new)
    }
}
