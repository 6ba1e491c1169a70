//! Scripted speech: the introduction and the guided tour.

use axum::Json;
use axum::extract::State;
use tracing::warn;
use voxturn_core::ScriptedSpeech;

use crate::state::AppState;

/// `POST /introduction`
pub async fn introduction(State(state): State<AppState>) -> Json<ScriptedSpeech> {
    Json(speak(&state, &state.intro_text).await)
}

/// `POST /tour`
pub async fn tour(State(state): State<AppState>) -> Json<ScriptedSpeech> {
    Json(speak(&state, &state.tour_text).await)
}

/// A synthesis failure still returns the text, with a null reference.
async fn speak(state: &AppState, text: &str) -> ScriptedSpeech {
    let value = match state.synthesizer.synthesize(text).await {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Failed to synthesize scripted speech");
            None
        }
    };
    ScriptedSpeech {
        text: text.to_string(),
        value,
    }
}
