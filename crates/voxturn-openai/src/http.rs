//! Shared HTTP plumbing: authentication headers and status checks.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response};

use crate::config::OpenAiConfig;

const BETA_HEADER: &str = "OpenAI-Beta";
const ASSISTANTS_V2: &str = "assistants=v2";

/// Non-success response: status plus raw body.
#[derive(Debug)]
pub(crate) struct UpstreamFailure {
    pub status: u16,
    pub body: String,
}

/// Thin wrapper over a `reqwest::Client` bound to one API configuration.
#[derive(Debug, Clone)]
pub struct OpenAiHttp {
    client: reqwest::Client,
    config: Arc<OpenAiConfig>,
}

impl OpenAiHttp {
    pub fn new(config: OpenAiConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: OpenAiConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    /// Authenticated request with the default timeout.
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.streaming(method, path).timeout(self.config.request_timeout)
    }

    /// Authenticated request without a total timeout, for event streams.
    pub(crate) fn streaming(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.config.url(path))
            .bearer_auth(&self.config.api_key)
    }

    /// Assistants endpoints additionally need the beta header.
    pub(crate) fn assistants(&self, method: Method, path: &str) -> RequestBuilder {
        self.request(method, path).header(BETA_HEADER, ASSISTANTS_V2)
    }

    pub(crate) fn assistants_stream(&self, method: Method, path: &str) -> RequestBuilder {
        self.streaming(method, path).header(BETA_HEADER, ASSISTANTS_V2)
    }
}

/// Pass successful responses through; read the body of failed ones.
pub(crate) async fn check(response: Response) -> Result<Response, UpstreamFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(UpstreamFailure {
        status: status.as_u16(),
        body,
    })
}
