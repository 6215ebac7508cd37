//! Tool dispatch — the seam between the agent loop and the session pool.
//!
//! The loop fans tool calls out through [`ToolDispatcher`] so its batching
//! and transcript contracts stay testable without a live protocol server.
//! The production implementation leases one pooled session per call.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::mcp_client::SessionPool;
use crate::plan::ToolDiag;

// ─── ToolDispatcher ─────────────────────────────────────────────────────────

/// Executes one tool call and reports its outcome.
///
/// Implementations never fail: any error collapses into the returned value's
/// `error` key and a failed diagnostic, so a single bad tool cannot abort
/// the run.
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    async fn dispatch(&self, tool: &str, arguments: Value) -> (Value, ToolDiag);
}

// ─── PooledDispatcher ───────────────────────────────────────────────────────

/// Dispatcher backed by the MCP session pool.
///
/// Each call holds its lease only for the single `tools/call` it performs.
pub struct PooledDispatcher {
    pool: Arc<SessionPool>,
}

impl PooledDispatcher {
    pub fn new(pool: Arc<SessionPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ToolDispatcher for PooledDispatcher {
    async fn dispatch(&self, tool: &str, arguments: Value) -> (Value, ToolDiag) {
        let start = Instant::now();

        let result = match self.pool.acquire().await {
            Ok(mut lease) => lease.call_tool(tool, arguments).await,
            Err(e) => {
                tracing::warn!(tool, error = %e, "could not lease a session for tool call");
                json!({"error": e.to_string()})
            }
        };

        let ms = start.elapsed().as_millis() as u64;
        let error = result.get("error").map(|v| match v.as_str() {
            Some(s) => s.to_string(),
            None => v.to_string(),
        });
        let diag = ToolDiag {
            tool: tool.to_string(),
            ok: error.is_none(),
            ms: Some(ms),
            error,
        };

        if diag.ok {
            tracing::info!(tool, ms, "tool call ok");
        } else {
            tracing::warn!(tool, ms, error = diag.error.as_deref(), "tool call failed");
        }

        (result, diag)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::McpSettings;
    use crate::mcp_client::SessionPool;

    #[tokio::test]
    async fn test_dispatch_collapses_pool_failure_to_diagnostic() {
        // A pool whose factory always fails: dispatch must yield an {"error"}
        // value and a failed diagnostic, never an Err.
        let factory: crate::mcp_client::SessionFactory =
            Arc::new(|| Box::pin(async { None }));
        let pool = SessionPool::new(2, factory);
        let dispatcher = PooledDispatcher::new(pool);

        let (value, diag) = dispatcher
            .dispatch("flight_search", json!({"origin": "IST"}))
            .await;

        assert!(value.get("error").is_some());
        assert_eq!(diag.tool, "flight_search");
        assert!(!diag.ok);
        assert!(diag.ms.is_some());
        assert!(diag.error.is_some());
    }

    #[tokio::test]
    async fn test_dispatch_tool_error_marks_diag_failed() {
        // Stub sessions are "initialized" but point at an unreachable
        // endpoint, so the tool call itself collapses to {"error"}.
        let settings = Arc::new(McpSettings {
            endpoint: "http://127.0.0.1:1/mcp".to_string(),
            handshake_timeout_secs: 1,
            call_timeout_secs: 1,
            ..Default::default()
        });
        let factory: crate::mcp_client::SessionFactory = Arc::new(move || {
            let settings = Arc::clone(&settings);
            Box::pin(async move {
                Some(crate::mcp_client::McpClient::stub_initialized(&settings))
            })
        });
        let pool = SessionPool::new(2, factory);
        pool.warmup(1).await;
        let dispatcher = PooledDispatcher::new(pool);

        let (value, diag) = dispatcher.dispatch("hotel_search", json!({})).await;
        assert!(value.get("error").is_some());
        assert!(!diag.ok);
    }
}
