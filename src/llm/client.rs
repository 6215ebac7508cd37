//! Messages-endpoint client with rate-limit backoff.
//!
//! One concern lives here: turning a transcript + tool catalog into a model
//! response, reliably. HTTP 429 is retried with exponential backoff
//! honoring the server's `retry-after` hint; every other error class
//! propagates immediately — retrying a 400 or a 500 only hides bugs.

use std::time::Duration;

use reqwest::Client as HttpClient;

use crate::config::LlmSettings;

use super::errors::LlmError;
use super::types::{ChatMessage, MessagesRequest, MessagesResponse, ToolDefinition};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Base delay for 429 backoff; doubles per attempt unless the server sends
/// a `retry-after` hint.
const BACKOFF_BASE: Duration = Duration::from_secs(1);

// ─── LlmClient ───────────────────────────────────────────────────────────────

/// Client for the model's chat/tool-use endpoint.
pub struct LlmClient {
    http: HttpClient,
    settings: LlmSettings,
}

impl LlmClient {
    /// Build a client from settings. Connectivity is checked on first use.
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionFailed {
                endpoint: settings.base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { http, settings })
    }

    /// The configured model identifier.
    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// Send one inference request.
    ///
    /// Retries only HTTP 429, up to `max_retries` extra attempts. Retry
    /// exhaustion yields [`LlmError::RateLimited`], which callers surface
    /// as "busy" rather than a generic failure.
    pub async fn send(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        system: Option<&str>,
    ) -> Result<MessagesResponse, LlmError> {
        let url = format!("{}/v1/messages", self.settings.base_url.trim_end_matches('/'));

        let body = MessagesRequest {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            system: system.map(|s| s.to_string()),
            messages: messages.to_vec(),
            tools: if tools.is_empty() {
                None
            } else {
                Some(tools.to_vec())
            },
        };

        tracing::info!(
            model = %body.model,
            message_count = body.messages.len(),
            tool_count = tools.len(),
            "sending model request"
        );

        let max_attempts = self.settings.max_retries + 1;
        for attempt in 0..max_attempts {
            let response = self
                .http
                .post(&url)
                .header("x-api-key", &self.settings.api_key)
                .header("anthropic-version", &self.settings.api_version)
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        LlmError::Timeout {
                            duration_secs: self.settings.request_timeout_secs,
                        }
                    } else {
                        LlmError::ConnectionFailed {
                            endpoint: url.clone(),
                            reason: e.to_string(),
                        }
                    }
                })?;

            let status = response.status();

            if status.as_u16() == 429 {
                let retry_after = parse_retry_after(response.headers());
                // Drain the body so the connection can be reused.
                let _ = response.text().await;

                if attempt + 1 >= max_attempts {
                    tracing::warn!(attempts = max_attempts, "rate limit retries exhausted");
                    return Err(LlmError::RateLimited {
                        attempts: max_attempts,
                    });
                }

                let delay = backoff_delay(attempt, retry_after);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    honored_hint = retry_after.is_some(),
                    "rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if !status.is_success() {
                let body_text = response.text().await.unwrap_or_default();
                return Err(LlmError::Http {
                    status: status.as_u16(),
                    body: body_text,
                });
            }

            return response
                .json::<MessagesResponse>()
                .await
                .map_err(|e| LlmError::Decode {
                    reason: e.to_string(),
                });
        }

        // Unreachable: the loop either returns or exhausts on a 429 above.
        Err(LlmError::RateLimited {
            attempts: max_attempts,
        })
    }
}

// ─── Backoff ─────────────────────────────────────────────────────────────────

/// A numeric `retry-after` header, in seconds.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Delay before retry `attempt` (0-based): the server's hint when present,
/// otherwise `BACKOFF_BASE * 2^attempt`.
fn backoff_delay(attempt: u32, retry_after: Option<Duration>) -> Duration {
    retry_after.unwrap_or_else(|| BACKOFF_BASE * 2u32.saturating_pow(attempt))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
