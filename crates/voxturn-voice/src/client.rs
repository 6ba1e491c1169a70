//! HTTP client for the turn server.

use async_trait::async_trait;
use futures_util::Stream;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use voxturn_core::{CancelOutcome, ChunkRecord, RecordedAudio, ScriptedSpeech, SessionKey, TurnSnapshot};

use crate::coordinator::RunCanceller;
use crate::error::{ClientError, TransportError};
use crate::transport::decode_records;

/// Error body returned by the server on non-success statuses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Talks to one session of a turn server.
#[derive(Debug, Clone)]
pub struct TurnClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionKey,
}

impl TurnClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, session: SessionKey) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            session,
        }
    }

    pub const fn session(&self) -> &SessionKey {
        &self.session
    }

    /// Upload a recording and stream the turn's records.
    pub async fn upload(
        &self,
        audio: RecordedAudio,
    ) -> Result<impl Stream<Item = Result<ChunkRecord, TransportError>>, ClientError> {
        let part = Part::bytes(audio.bytes.to_vec())
            .file_name(audio.file_name)
            .mime_str(&audio.content_type)?;
        let form = Form::new().part("audio", part);

        let response = self
            .http
            .post(self.url("/upload"))
            .query(&[("session", self.session.as_str())])
            .multipart(form)
            .send()
            .await?;
        Ok(records(check(response).await?))
    }

    /// Submit typed text as a turn and stream its records.
    pub async fn submit_text(
        &self,
        text: &str,
    ) -> Result<impl Stream<Item = Result<ChunkRecord, TransportError>>, ClientError> {
        let response = self
            .http
            .post(self.url("/turns"))
            .query(&[("session", self.session.as_str())])
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;
        Ok(records(check(response).await?))
    }

    /// Ask the server to cancel this session's active turn.
    pub async fn cancel(&self) -> Result<CancelOutcome, ClientError> {
        let response = self
            .http
            .post(self.url("/cancel-run"))
            .query(&[("session", self.session.as_str())])
            .send()
            .await?;
        json(response).await
    }

    pub async fn turn_status(&self) -> Result<TurnSnapshot, ClientError> {
        let response = self
            .http
            .get(self.url("/turn"))
            .query(&[("session", self.session.as_str())])
            .send()
            .await?;
        json(response).await
    }

    pub async fn introduction(&self) -> Result<ScriptedSpeech, ClientError> {
        self.scripted("/introduction").await
    }

    pub async fn tour(&self) -> Result<ScriptedSpeech, ClientError> {
        self.scripted("/tour").await
    }

    async fn scripted(&self, path: &str) -> Result<ScriptedSpeech, ClientError> {
        let response = self.http.post(self.url(path)).send().await?;
        json(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl RunCanceller for TurnClient {
    async fn cancel_run(&self) -> Result<CancelOutcome, ClientError> {
        self.cancel().await
    }
}

fn records(
    response: reqwest::Response,
) -> impl Stream<Item = Result<ChunkRecord, TransportError>> {
    decode_records(Box::pin(response.bytes_stream()))
}

/// Turn a non-success response into [`ClientError::Status`].
async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body).map_or(body, |b| b.error);
    debug!(status = status.as_u16(), %message, "Turn server rejected request");
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

async fn json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    Ok(check(response).await?.json().await?)
}
