//! LLM gateway error types.

use thiserror::Error;

/// Errors that can occur when calling the model endpoint.
#[derive(Debug, Error)]
pub enum LlmError {
    /// TCP/TLS connection to the endpoint failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// The endpoint did not respond within the configured timeout.
    #[error("model request timed out after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    /// Non-2xx HTTP response other than 429.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// HTTP 429 persisted through every retry. Surfaced to callers as
    /// "service busy", distinct from generic failures.
    #[error("rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// The response body was not a valid messages payload.
    #[error("failed to decode model response: {reason}")]
    Decode { reason: String },
}

impl LlmError {
    /// Whether this is the distinct rate-limit kind.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, LlmError::RateLimited { .. })
    }
}
