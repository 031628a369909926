//! Cohere Chat client.
//!
//! A thin, single-call wrapper around `POST /v1/chat`. It knows nothing
//! about stages or agents: callers build a [`ChatRequest`], and the client
//! adds the model identifier and sampling parameters from [`LlmSettings`].
//! Tool-call loops live in the caller.

mod protocol;

use reqwest::{Client, Url};
use tracing::{debug, instrument};

use scribe_shared::{LlmSettings, Result, ScribeError};

pub use protocol::{
    ChatRequest, ChatResponse, ChatTurn, ParameterDefinition, ToolCall, ToolDefinition,
    ToolResult,
};
use protocol::{ErrorBody, WireRequest};

/// Path of the chat endpoint relative to the base URL.
const CHAT_PATH: &str = "v1/chat";

/// User-Agent string for provider requests.
const USER_AGENT: &str = concat!("Scribe/", env!("CARGO_PKG_VERSION"));

/// Client for one language-model provider account.
#[derive(Debug, Clone)]
pub struct CohereClient {
    http: Client,
    endpoint: Url,
    settings: LlmSettings,
}

impl CohereClient {
    /// Build a client from resolved settings.
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let endpoint = settings
            .base_url
            .join(CHAT_PATH)
            .map_err(|e| ScribeError::config(format!("invalid LLM endpoint: {e}")))?;

        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ScribeError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint,
            settings: settings.clone(),
        })
    }

    /// Model identifier every call is sent with.
    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// Issue one chat call.
    #[instrument(skip_all, fields(model = %self.settings.model, tools = request.tools.len(), tool_results = request.tool_results.len()))]
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let body = WireRequest {
            model: &self.settings.model,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            chat: request,
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ScribeError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.message)
                .unwrap_or(text);
            return Err(ScribeError::Llm(format!("HTTP {status}: {message}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ScribeError::parse(format!("invalid chat response: {e}")))?;

        debug!(
            chars = parsed.text.len(),
            tool_calls = parsed.tool_calls.len(),
            finish_reason = parsed.finish_reason.as_deref().unwrap_or("-"),
            "chat call completed"
        );

        Ok(parsed)
    }
}
