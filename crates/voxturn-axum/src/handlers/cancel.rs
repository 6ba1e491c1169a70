//! `POST /cancel-run`
//!
//! Takes no body; the session comes from the query string. Older clients
//! still post a JSON body, which is ignored.

use axum::Json;
use axum::extract::{Query, State};
use tracing::info;
use voxturn_core::CancelOutcome;

use super::SessionQuery;
use crate::state::AppState;

pub async fn cancel_run(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Json<CancelOutcome> {
    let session = query.key();
    let outcome = state.turns.cancel(&session).await;
    info!(session = %session, status = ?outcome.status, "Cancel requested");
    Json(outcome)
}
