//! MCP client error types.

use thiserror::Error;

/// Errors that can occur during MCP client operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// HTTP-level communication error (connect, timeout, non-2xx).
    #[error("transport error: {reason}")]
    Transport { reason: String },

    /// The response body did not contain a decodable SSE frame.
    #[error("invalid SSE frame: {reason}")]
    SseFrame { reason: String },

    /// Server returned a JSON-RPC error response.
    #[error("server error [{code}]: {message}")]
    Server {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// The initialization handshake failed.
    #[error("session initialization failed: {reason}")]
    InitFailed { reason: String },

    /// A call did not complete within its timeout.
    #[error("'{method}' timed out after {timeout_secs}s")]
    Timeout { method: String, timeout_secs: u64 },

    /// The pool could not produce a usable session.
    #[error("session creation failed: {reason}")]
    SessionCreate { reason: String },
}
