//! `GET /audio/{id}`: serve a stored artifact while it is still valid.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::error::HttpError;
use crate::state::AppState;

pub async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, HttpError> {
    let audio = Uuid::parse_str(&id)
        .ok()
        .and_then(|id| state.audio.get(id))
        .ok_or_else(|| HttpError::NotFound(format!("Audio {id} not found or expired")))?;

    Ok((
        [
            (header::CONTENT_TYPE, audio.content_type),
            (header::CACHE_CONTROL, "private, max-age=3600".to_string()),
        ],
        Body::from(audio.bytes),
    )
        .into_response())
}
