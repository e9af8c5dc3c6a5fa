use async_trait::async_trait;
use macae_core::{MacaeError, MacaeResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// One completion call: a system message, a user prompt and a temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System message framing the agent's role.
    pub system: String,
    /// The user-facing prompt.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Opaque handle to the LLM / AI-project backend.
///
/// The orchestration core never calls this itself; agent bodies do. One
/// client is shared by every agent of a session and closed when that
/// session's agent cache is cleared.
#[async_trait]
pub trait ProjectClient: Send + Sync {
    /// Run one completion and return the reply text.
    async fn complete(&self, request: CompletionRequest) -> MacaeResult<String>;

    /// Release the client. Later calls to `complete` fail.
    async fn close(&self) -> MacaeResult<()> {
        Ok(())
    }
}

/// The `[client]` section of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Resource endpoint, e.g. `https://example.openai.azure.com`.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Model deployment name.
    #[serde(default)]
    pub deployment: Option<String>,
    /// API version query parameter.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Key sent in the `api-key` header.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_api_version() -> String {
    "2024-08-01-preview".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            deployment: None,
            api_version: default_api_version(),
            api_key: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ClientConfig {
    /// Endpoint, deployment and key are all present.
    pub fn is_configured(&self) -> bool {
        non_blank(&self.endpoint).is_some()
            && non_blank(&self.deployment).is_some()
            && non_blank(&self.api_key).is_some()
    }

    /// Deployment-scoped chat completions URL.
    pub fn chat_url(&self) -> MacaeResult<String> {
        let endpoint = non_blank(&self.endpoint)
            .ok_or_else(|| MacaeError::Config("client endpoint is not set".into()))?;
        let deployment = non_blank(&self.deployment)
            .ok_or_else(|| MacaeError::Config("client deployment is not set".into()))?;
        Ok(format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint.trim_end_matches('/'),
            deployment,
            self.api_version
        ))
    }

    /// Apply the `AZURE_OPENAI_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply the `AZURE_OPENAI_*` overrides from an arbitrary key lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("AZURE_OPENAI_ENDPOINT") {
            self.endpoint = Some(v);
        }
        if let Some(v) = lookup("AZURE_OPENAI_DEPLOYMENT_NAME") {
            self.deployment = Some(v);
        }
        if let Some(v) = lookup("AZURE_OPENAI_API_VERSION") {
            self.api_version = v;
        }
        if let Some(v) = lookup("AZURE_OPENAI_API_KEY") {
            self.api_key = Some(v);
        }
    }
}

/// [`ProjectClient`] speaking the Azure-OpenAI chat completions protocol.
pub struct ChatCompletionsClient {
    url: String,
    api_key: String,
    timeout: Duration,
    http: reqwest::Client,
    closed: AtomicBool,
}

impl ChatCompletionsClient {
    /// Build a client; fails unless endpoint, deployment and key are set.
    pub fn new(config: &ClientConfig) -> MacaeResult<Self> {
        let url = config.chat_url()?;
        let api_key = non_blank(&config.api_key)
            .ok_or_else(|| MacaeError::Config("client api_key is not set".into()))?
            .to_string();
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MacaeError::Client(e.to_string()))?;
        Ok(Self {
            url,
            api_key,
            timeout,
            http,
            closed: AtomicBool::new(false),
        })
    }

    /// Whether [`ProjectClient::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn map_send_error(&self, e: reqwest::Error) -> MacaeError {
        if e.is_timeout() {
            MacaeError::Timeout {
                operation: "chat_completions".to_string(),
                millis: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            MacaeError::Client(e.to_string())
        }
    }
}

#[async_trait]
impl ProjectClient for ChatCompletionsClient {
    async fn complete(&self, request: CompletionRequest) -> MacaeResult<String> {
        if self.is_closed() {
            return Err(MacaeError::Client("client is closed".into()));
        }

        let body = serde_json::json!({
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.prompt},
            ],
            "temperature": request.temperature,
        });

        let resp = self
            .http
            .post(&self.url)
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| MacaeError::Client(e.to_string()))?;

        if !status.is_success() {
            return Err(MacaeError::Client(format!(
                "Chat completions error {}: {}",
                status, resp_body
            )));
        }

        debug!(status = %status, "Chat completion received");
        parse_chat_response(&resp_body)
    }

    async fn close(&self) -> MacaeResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Extract the first choice's message content.
pub fn parse_chat_response(body: &serde_json::Value) -> MacaeResult<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| MacaeError::Client("response has no message content".into()))
}
