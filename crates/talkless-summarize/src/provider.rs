//! LLM provider abstraction.
//!
//! Each provider exposes one operation: given a model, temperature, and
//! prompt, return a completion or a typed error. The error class drives the
//! caller's recovery: transient errors are retried with backoff, quota and
//! permanent errors fail the group's summary.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use talkless_core::{Result, SummarizationConfig, TalklessError};

/// Classification of a completion failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionErrorKind {
    /// Worth retrying with backoff (network errors, 5xx).
    Transient,
    /// Retrying cannot help (bad request, auth failure).
    Permanent,
    /// The provider's budget is exhausted (429).
    Quota,
}

impl fmt::Display for CompletionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionErrorKind::Transient => write!(f, "transient"),
            CompletionErrorKind::Permanent => write!(f, "permanent"),
            CompletionErrorKind::Quota => write!(f, "quota"),
        }
    }
}

/// A typed completion failure.
#[derive(Debug, Clone)]
pub struct CompletionError {
    /// Failure class.
    pub kind: CompletionErrorKind,
    /// Provider-reported detail.
    pub message: String,
}

impl CompletionError {
    /// Shorthand constructor.
    pub fn new(kind: CompletionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Parameters for one completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// The full prompt text.
    pub prompt: String,
}

/// A text completion capability.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Produce a completion for `request`.
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<String, CompletionError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

fn classify_status(status: reqwest::StatusCode) -> CompletionErrorKind {
    if status.as_u16() == 429 {
        CompletionErrorKind::Quota
    } else if status.is_server_error() {
        CompletionErrorKind::Transient
    } else {
        CompletionErrorKind::Permanent
    }
}

fn classify_request_error(e: &reqwest::Error) -> CompletionErrorKind {
    // Connection failures and timeouts are worth retrying; anything the
    // server actively rejected is not.
    if e.is_timeout() || e.is_connect() || e.is_request() {
        CompletionErrorKind::Transient
    } else {
        CompletionErrorKind::Permanent
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible chat completions
// ---------------------------------------------------------------------------

const OPENAI_BASE_URL: &str = "https://api.openai.com";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Client for any provider exposing the `/v1/chat/completions` shape.
pub struct OpenAiCompleter {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiCompleter {
    /// Create a client with the given key and per-call timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TalklessError::Config`] if the HTTP client cannot be built.
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TalklessError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key,
            base_url: OPENAI_BASE_URL.to_string(),
        })
    }

    /// Override the base URL (local gateways, test servers).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Completer for OpenAiCompleter {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<String, CompletionError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::new(classify_request_error(&e), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CompletionError::new(
                classify_status(status),
                format!("HTTP {status}: {detail}"),
            ));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            CompletionError::new(CompletionErrorKind::Permanent, format!("bad response: {e}"))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                CompletionError::new(CompletionErrorKind::Permanent, "empty choices array")
            })
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// ---------------------------------------------------------------------------
// Anthropic messages
// ---------------------------------------------------------------------------

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 1024;

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: String,
}

/// Client for the Anthropic messages API.
pub struct AnthropicCompleter {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicCompleter {
    /// Create a client with the given key and per-call timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TalklessError::Config`] if the HTTP client cannot be built.
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TalklessError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key,
            base_url: ANTHROPIC_BASE_URL.to_string(),
        })
    }

    /// Override the base URL (local gateways, test servers).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Completer for AnthropicCompleter {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<String, CompletionError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = AnthropicRequest {
            model: &request.model,
            max_tokens: ANTHROPIC_MAX_TOKENS,
            temperature: request.temperature,
            messages: vec![AnthropicMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::new(classify_request_error(&e), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CompletionError::new(
                classify_status(status),
                format!("HTTP {status}: {detail}"),
            ));
        }

        let parsed: AnthropicResponse = response.json().await.map_err(|e| {
            CompletionError::new(CompletionErrorKind::Permanent, format!("bad response: {e}"))
        })?;

        parsed
            .content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| {
                CompletionError::new(CompletionErrorKind::Permanent, "empty content array")
            })
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

/// Build the provider named by configuration.
///
/// # Errors
///
/// Returns [`TalklessError::Config`] for an unknown provider name or a
/// missing credential — both abort the run before any work is done.
pub fn build_completer(config: &SummarizationConfig) -> Result<Arc<dyn Completer>> {
    let timeout = Duration::from_secs(config.llm_timeout_secs);
    match config.provider.as_str() {
        "openai" => {
            let key = std::env::var("OPENAI_API_KEY").map_err(|_| {
                TalklessError::Config("OPENAI_API_KEY is not set for provider openai".into())
            })?;
            Ok(Arc::new(OpenAiCompleter::new(key, timeout)?))
        }
        "anthropic" => {
            let key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
                TalklessError::Config("ANTHROPIC_API_KEY is not set for provider anthropic".into())
            })?;
            Ok(Arc::new(AnthropicCompleter::new(key, timeout)?))
        }
        other => Err(TalklessError::Config(format!(
            "unknown summarization provider: {other}"
        ))),
    }
}
