//! Conversational agent backed by the Assistants API (v2) streaming runs.
//!
//! A conversation is a thread. Each turn appends the user's message to the
//! thread and starts a streaming run; the run's server-sent events are mapped
//! onto [`AgentEvent`]s:
//!
//! | SSE event                          | Agent event             |
//! |------------------------------------|-------------------------|
//! | `thread.run.created`               | `RunCreated(run.id)`    |
//! | `thread.message.delta` (text)      | `TextDelta(value)`      |
//! | `thread.run.completed`             | `Completed`             |
//! | `thread.run.failed`, `error`, …    | `Err(AgentError::Stream)` |

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, trace};
use voxturn_core::{
    AgentError, AgentEvent, AgentEventStream, ConversationAgent, ConversationId, RunId,
};

use crate::http::{OpenAiHttp, UpstreamFailure, check};
use crate::sse::{SseEvent, sse_events};

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    last_error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    delta: DeltaBody,
}

#[derive(Debug, Deserialize)]
struct DeltaBody {
    #[serde(default)]
    content: Vec<DeltaContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DeltaContent {
    Text { text: DeltaText },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct DeltaText {
    #[serde(default)]
    value: String,
}

/// [`ConversationAgent`] over OpenAI threads and runs.
#[derive(Debug, Clone)]
pub struct AssistantAgent {
    http: OpenAiHttp,
}

impl AssistantAgent {
    pub const fn new(http: OpenAiHttp) -> Self {
        Self { http }
    }
}

fn upstream(failure: UpstreamFailure) -> AgentError {
    AgentError::Upstream {
        status: failure.status,
        body: failure.body,
    }
}

fn request_error(e: &reqwest::Error) -> AgentError {
    AgentError::Request(e.to_string())
}

#[async_trait]
impl ConversationAgent for AssistantAgent {
    async fn create_conversation(&self) -> Result<ConversationId, AgentError> {
        let response = self
            .http
            .assistants(Method::POST, "/threads")
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| request_error(&e))?;
        let thread: Created = check(response)
            .await
            .map_err(upstream)?
            .json()
            .await
            .map_err(|e| AgentError::Decode(e.to_string()))?;
        Ok(ConversationId::new(thread.id))
    }

    async fn stream_reply(
        &self,
        conversation: &ConversationId,
        text: &str,
    ) -> Result<AgentEventStream, AgentError> {
        let thread = conversation.as_str();

        let response = self
            .http
            .assistants(Method::POST, &format!("/threads/{thread}/messages"))
            .json(&serde_json::json!({ "role": "user", "content": text }))
            .send()
            .await
            .map_err(|e| request_error(&e))?;
        check(response).await.map_err(upstream)?;

        let response = self
            .http
            .assistants_stream(Method::POST, &format!("/threads/{thread}/runs"))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&serde_json::json!({
                "assistant_id": self.http.config().assistant_id,
                "stream": true,
            }))
            .send()
            .await
            .map_err(|e| request_error(&e))?;
        let response = check(response).await.map_err(upstream)?;
        debug!(thread, "Assistant run stream opened");

        let events = sse_events(Box::pin(response.bytes_stream())).filter_map(|frame| async move {
            match frame {
                Ok(event) => map_event(&event),
                Err(e) => Some(Err(AgentError::Stream(e))),
            }
        });
        Ok(Box::pin(events))
    }

    async fn cancel_run(&self, conversation: &ConversationId, run: &RunId) -> Result<(), AgentError> {
        let path = format!("/threads/{}/runs/{}/cancel", conversation.as_str(), run.as_str());
        let response = self
            .http
            .assistants(Method::POST, &path)
            .send()
            .await
            .map_err(|e| request_error(&e))?;
        check(response).await.map_err(upstream)?;
        Ok(())
    }
}

/// Map one server-sent event onto the agent's event model. Events that carry
/// nothing the turn needs map to `None`.
pub fn map_event(event: &SseEvent) -> Option<Result<AgentEvent, AgentError>> {
    let name = event.event.as_deref()?;
    match name {
        "thread.run.created" => Some(parse::<RunObject>(&event.data).map(|run| AgentEvent::RunCreated(RunId::new(run.id)))),
        "thread.message.delta" => match parse::<MessageDelta>(&event.data) {
            Ok(message) => {
                let text: String = message
                    .delta
                    .content
                    .into_iter()
                    .filter_map(|part| match part {
                        DeltaContent::Text { text } => Some(text.value),
                        DeltaContent::Other => None,
                    })
                    .collect();
                (!text.is_empty()).then_some(Ok(AgentEvent::TextDelta(text)))
            }
            Err(e) => Some(Err(e)),
        },
        "thread.run.completed" => Some(Ok(AgentEvent::Completed)),
        "thread.run.failed" => Some(Err(run_failure(&event.data))),
        "thread.run.cancelled" | "thread.run.expired" | "thread.run.incomplete" => {
            Some(Err(AgentError::Stream(format!("run ended early ({name})"))))
        }
        "thread.run.requires_action" => Some(Err(AgentError::Stream(
            "run requires tool outputs, which are not supported".into(),
        ))),
        "error" => {
            let message = parse::<ApiError>(&event.data)
                .map_or_else(|_| event.data.clone(), |e| e.message);
            Some(Err(AgentError::Stream(message)))
        }
        _ => {
            trace!(event = name, "Ignoring assistant event");
            None
        }
    }
}

fn parse<T: for<'de> Deserialize<'de>>(data: &str) -> Result<T, AgentError> {
    serde_json::from_str(data).map_err(|e| AgentError::Decode(format!("{e}: {data}")))
}

fn run_failure(data: &str) -> AgentError {
    let detail = parse::<RunObject>(data).ok().and_then(|run| {
        let status = run.status.unwrap_or_default();
        run.last_error.map(|e| match e.code {
            Some(code) => format!("{status}: {code}: {}", e.message),
            None => format!("{status}: {}", e.message),
        })
    });
    AgentError::Stream(detail.unwrap_or_else(|| "run failed".to_string()))
}
