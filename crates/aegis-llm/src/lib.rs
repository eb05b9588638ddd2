//! LLM Client (C4): an abstract chat-completion client with retry,
//! per-call timeout, and an overall deadline across retries.
//!
//! Grounded on the teacher's `sandbox::execution::execute_with_controls`
//! retry/backoff/circuit-breaker shape (duplicated here rather than pulled
//! in as a dependency, since this crate sits below `aegis-core` in the
//! workspace graph and must not depend back up on it) and on
//! `nix-env-manager::attic::AtticClient`'s `reqwest::Client` construction
//! style for the concrete HTTP-backed provider.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// The caller supplies the full message set on every call — there is no
    /// server-side conversation state, so repeating the same request is
    /// idempotent from the caller's standpoint (§4.4).
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub text: String,
    pub usage: Usage,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("call timed out")]
    Timeout,
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl LlmError {
    /// Authentication and validation failures are not retried (§4.4).
    fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Timeout | LlmError::Transient(_))
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub per_call_timeout: Duration,
    pub backoff_base: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            per_call_timeout: Duration::from_secs(30),
            backoff_base: Duration::from_millis(500),
        }
    }
}

/// Wraps any [`LlmClient`] with exponential backoff, a per-attempt timeout,
/// and an overall deadline spanning every retry (§4.4). The wrapped client
/// is expected to classify its own failures into [`LlmError`] variants;
/// this wrapper only decides whether to retry and how long to wait.
pub struct RetryingLlmClient<C> {
    inner: C,
    config: RetryConfig,
}

impl<C: LlmClient> RetryingLlmClient<C> {
    pub fn new(inner: C, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let overall_deadline = tokio::time::Instant::now()
            + self.config.per_call_timeout * (self.config.max_retries + 1);
        let max_attempts = self.config.max_retries + 1;
        let mut last_err: Option<LlmError> = None;

        for attempt in 1..=max_attempts {
            if tokio::time::Instant::now() >= overall_deadline {
                break;
            }
            let call = self.inner.chat(request.clone_for_retry());
            let outcome = tokio::time::timeout(self.config.per_call_timeout, call).await;

            match outcome {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(err)) if !err.is_retryable() => return Err(err),
                Ok(Err(err)) => {
                    warn!(attempt, error = %err, "llm call failed, considering retry");
                    last_err = Some(err);
                }
                Err(_elapsed) => {
                    warn!(attempt, "llm call timed out");
                    last_err = Some(LlmError::Timeout);
                }
            }

            if attempt < max_attempts {
                let backoff = self.config.backoff_base * 2u32.pow(attempt - 1);
                tokio::time::sleep(backoff).await;
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: max_attempts,
            last: last_err.map(|e| e.to_string()).unwrap_or_else(|| "deadline exceeded".to_string()),
        })
    }
}

impl ChatRequest {
    fn clone_for_retry(&self) -> ChatRequest {
        ChatRequest {
            messages: self.messages.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// An HTTP-backed client against any OpenAI-compatible chat-completions
/// endpoint. The concrete provider is pluggable: only `base_url` changes
/// between providers that speak this wire shape.
pub struct HttpChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpChatClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .user_agent(concat!("aegis-llm/", env!("CARGO_PKG_VERSION")))
                .build()
                .expect("reqwest client builds"),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[async_trait]
impl LlmClient for HttpChatClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        if request.messages.is_empty() {
            return Err(LlmError::Validation("chat request must carry at least one message".to_string()));
        }

        let wire = WireRequest {
            model: &request.model,
            messages: request.messages.iter().map(|m| WireMessage { role: role_str(m.role), content: &m.content }).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&wire)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Transient(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LlmError::Auth(format!("provider returned {status}")));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(LlmError::Transient(format!("provider returned {status}")));
        }
        if !status.is_success() {
            return Err(LlmError::Validation(format!("provider returned {status}")));
        }

        let parsed: WireResponse = response.json().await.map_err(|e| LlmError::Transient(e.to_string()))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Transient("provider returned no choices".to_string()))?;

        Ok(ChatResponse {
            text,
            usage: Usage {
                prompt_tokens: parsed.usage.as_ref().and_then(|u| u.prompt_tokens),
                completion_tokens: parsed.usage.and_then(|u| u.completion_tokens),
            },
        })
    }
}

/// A canned in-memory client for tests and for environments with no
/// configured provider. Never retries — every call succeeds immediately.
pub struct StubLlmClient {
    pub response: String,
}

#[async_trait]
impl LlmClient for StubLlmClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        if request.messages.is_empty() {
            return Err(LlmError::Validation("chat request must carry at least one message".to_string()));
        }
        Ok(ChatResponse {
            text: self.response.clone(),
            usage: Usage::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyClient {
        calls: Arc<AtomicU32>,
        fail_times: u32,
    }

    #[async_trait]
    impl LlmClient for FlakyClient {
        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, LlmError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                Err(LlmError::Transient("simulated outage".to_string()))
            } else {
                Ok(ChatResponse { text: "recovered".to_string(), usage: Usage::default() })
            }
        }
    }

    struct AuthFailingClient;

    #[async_trait]
    impl LlmClient for AuthFailingClient {
        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, LlmError> {
            Err(LlmError::Auth("bad key".to_string()))
        }
    }

    fn sample_request() -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage::user("hello")],
            model: "test-model".to_string(),
            temperature: 0.2,
            max_tokens: 256,
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let client = RetryingLlmClient::new(
            FlakyClient { calls: calls.clone(), fail_times: 2 },
            RetryConfig { max_retries: 3, per_call_timeout: Duration::from_millis(100), backoff_base: Duration::from_millis(1) },
        );
        let response = client.chat(sample_request()).await.unwrap();
        assert_eq!(response.text, "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn auth_failures_are_not_retried() {
        let client = RetryingLlmClient::new(AuthFailingClient, RetryConfig::default());
        let err = client.chat(sample_request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Auth(_)));
    }

    #[tokio::test]
    async fn stub_client_rejects_empty_messages() {
        let client = StubLlmClient { response: "x".to_string() };
        let request = ChatRequest { messages: vec![], model: "m".to_string(), temperature: 0.0, max_tokens: 1 };
        let err = client.chat(request).await.unwrap_err();
        assert!(matches!(err, LlmError::Validation(_)));
    }
}
