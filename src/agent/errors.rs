//! Agent-level error types.
//!
//! Everything below the orchestrator degrades instead of failing; only two
//! conditions escalate to the caller, and they stay distinguishable so the
//! router can answer "busy, retry later" instead of a generic 500.

use thiserror::Error;

use crate::llm::LlmError;

/// Errors surfaced by the orchestrator.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model endpoint stayed rate-limited through every retry.
    #[error("model service is busy, retry later")]
    RateLimited { attempts: u32 },

    /// Hard model-transport failure (connection, timeout, non-429 HTTP).
    #[error("model call failed: {0}")]
    Model(LlmError),
}

impl From<LlmError> for AgentError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::RateLimited { attempts } => AgentError::RateLimited { attempts },
            other => AgentError::Model(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_stays_distinct() {
        let err: AgentError = LlmError::RateLimited { attempts: 4 }.into();
        assert!(matches!(err, AgentError::RateLimited { attempts: 4 }));

        let err: AgentError = LlmError::Http {
            status: 500,
            body: "boom".into(),
        }
        .into();
        assert!(matches!(err, AgentError::Model(_)));
    }
}
