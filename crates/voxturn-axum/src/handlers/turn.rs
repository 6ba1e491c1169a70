//! Turn endpoints: recording upload, typed text, and turn status.
//!
//! Both submission endpoints answer with a chunked NDJSON body that carries
//! the turn's records as they are produced. Dropping the connection
//! mid-turn cancels the turn.

use axum::Json;
use axum::body::Body;
use axum::extract::{Multipart, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{debug, info};
use voxturn_core::{RecordedAudio, SessionKey, TurnSnapshot};
use voxturn_voice::{NDJSON_CONTENT_TYPE, TurnStream, encode_records};

use super::SessionQuery;
use crate::error::HttpError;
use crate::state::AppState;

/// Multipart field carrying the recording.
const AUDIO_FIELD: &str = "audio";

#[derive(Debug, Deserialize)]
pub struct SubmitTextRequest {
    pub text: String,
}

/// `POST /upload` (multipart `audio`)
pub async fn upload(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    multipart: Multipart,
) -> Result<Response, HttpError> {
    let session = query.key();
    let controller = state.turns.controller(&session);
    // The session is busy from here on; cancel-run acts on this turn.
    let reservation = controller.reserve()?;

    let audio = read_recording(multipart).await?;
    debug!(session = %session, bytes = audio.bytes.len(), file = %audio.file_name, "Received recording");

    let transcript = state.transcriber.transcribe(audio).await?;
    info!(session = %session, chars = transcript.len(), "Transcribed recording");

    let turn = controller.submit_reserved(reservation, transcript).await?;
    Ok(stream_response(turn))
}

/// `POST /turns` (`{ "text": ... }`)
pub async fn submit_text(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    Json(req): Json<SubmitTextRequest>,
) -> Result<Response, HttpError> {
    let turn = state.turns.submit(&query.key(), req.text).await?;
    Ok(stream_response(turn))
}

/// `GET /turn`
pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<TurnSnapshot>, HttpError> {
    let session: SessionKey = query.key();
    state
        .turns
        .snapshot(&session)
        .map(Json)
        .ok_or_else(|| HttpError::NotFound(format!("No turn for session '{session}'")))
}

fn stream_response(turn: TurnStream) -> Response {
    let turn_id = turn.turn_id.to_string();
    (
        [
            (header::CONTENT_TYPE, NDJSON_CONTENT_TYPE.to_string()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
            (header::HeaderName::from_static("x-turn-id"), turn_id),
        ],
        Body::from_stream(encode_records(turn)),
    )
        .into_response()
}

async fn read_recording(mut multipart: Multipart) -> Result<RecordedAudio, HttpError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| HttpError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("audio.wav").to_string();
        let content_type = field.content_type().unwrap_or("audio/wav").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| HttpError::BadRequest(e.body_text()))?;
        return Ok(RecordedAudio {
            bytes,
            file_name,
            content_type,
        });
    }
    Err(HttpError::BadRequest("No audio file provided".into()))
}
