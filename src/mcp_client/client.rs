//! MCP client — one handshaken session against the remote tool server.
//!
//! Lifecycle: `initialize` → `notifications/initialized` → `tools/list` /
//! `tools/call`. The client never propagates a raw error from a tool call:
//! transport failures, server-side errors, and timeouts all collapse to an
//! `{"error": ...}` value so the orchestrator can proceed with degraded data.

use serde_json::{json, Value};

use crate::config::McpSettings;

use super::errors::McpError;
use super::transport::{extract_result, HttpTransport, TimeoutClass};
use super::types::{InitializeResult, ServerInfo, ToolDescriptor, ToolsListResult};

// ─── McpClient ───────────────────────────────────────────────────────────────

/// A single protocol session: transport plus handshake state.
///
/// Invariant: no method but `initialize` is sent before `initialized` is
/// true — `list_tools` and `call_tool` initialize lazily when needed.
pub struct McpClient {
    transport: HttpTransport,
    initialized: bool,
    capabilities: Value,
    server_info: Option<ServerInfo>,
}

impl McpClient {
    /// Create an uninitialized session. No I/O happens here.
    pub fn new(settings: &McpSettings) -> Result<Self, McpError> {
        Ok(Self {
            transport: HttpTransport::new(settings)?,
            initialized: false,
            capabilities: Value::Null,
            server_info: None,
        })
    }

    /// Whether the handshake has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The server-assigned session id, if one was issued.
    pub fn session_id(&self) -> Option<String> {
        self.transport.session_id()
    }

    /// Server capabilities from the initialize response.
    pub fn capabilities(&self) -> &Value {
        &self.capabilities
    }

    /// Server identity from the initialize response.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    // ─── Handshake ───────────────────────────────────────────────────────

    /// Perform the initialization handshake. Idempotent.
    ///
    /// On success sends a fire-and-forget `notifications/initialized`
    /// (failures there are logged, not raised). Never returns an error:
    /// any transport or protocol failure yields `false`, leaving the
    /// session eligible for re-initialization.
    pub async fn initialize(&mut self) -> bool {
        if self.initialized {
            return true;
        }

        let params = json!({
            "protocolVersion": self.transport.protocol_version(),
            "capabilities": {
                "roots": {"listChanged": true},
                "sampling": {}
            },
            "clientInfo": {
                "name": "tripsmith",
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let response = match self
            .transport
            .request("initialize", Some(params), TimeoutClass::Handshake)
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, "initialize failed");
                return false;
            }
        };

        let result = match extract_result(response) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "initialize rejected by server");
                return false;
            }
        };

        match serde_json::from_value::<InitializeResult>(result) {
            Ok(init) => {
                self.capabilities = init.capabilities;
                self.server_info = init.server_info;
                self.initialized = true;
                tracing::info!(
                    server = self
                        .server_info
                        .as_ref()
                        .and_then(|s| s.name.as_deref())
                        .unwrap_or("unknown"),
                    session_id = self.session_id().as_deref().unwrap_or("-"),
                    "MCP session initialized"
                );

                // Completes the handshake; the server does not reply.
                if let Err(e) = self
                    .transport
                    .notify("notifications/initialized", Some(json!({})))
                    .await
                {
                    tracing::warn!(error = %e, "failed to send initialized notification");
                }
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse initialize response");
                false
            }
        }
    }

    // ─── Tool discovery ──────────────────────────────────────────────────

    /// List available tools. Lazily initializes; empty on any failure.
    pub async fn list_tools(&mut self) -> Vec<ToolDescriptor> {
        if !self.initialized && !self.initialize().await {
            tracing::warn!("cannot list tools: session not initialized");
            return Vec::new();
        }

        let response = match self
            .transport
            .request("tools/list", Some(json!({})), TimeoutClass::Handshake)
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, "tools/list failed");
                return Vec::new();
            }
        };

        match extract_result(response)
            .and_then(|v| {
                serde_json::from_value::<ToolsListResult>(v).map_err(|e| McpError::SseFrame {
                    reason: format!("invalid tools/list result: {e}"),
                })
            }) {
            Ok(listing) => {
                tracing::info!(tool_count = listing.tools.len(), "fetched tool catalog");
                listing.tools
            }
            Err(e) => {
                tracing::warn!(error = %e, "tools/list returned an error");
                Vec::new()
            }
        }
    }

    // ─── Tool execution ──────────────────────────────────────────────────

    /// Call a tool. Lazily initializes.
    ///
    /// Returns the tool's result value on success, or `{"error": <string>}`
    /// for transport failures, timeouts, and server-side tool errors alike —
    /// callers check for the `error` key, never for an `Err`.
    pub async fn call_tool(&mut self, tool_name: &str, arguments: Value) -> Value {
        if !self.initialized && !self.initialize().await {
            return json!({"error": "MCP session not initialized"});
        }

        let params = json!({
            "name": tool_name,
            "arguments": arguments,
        });

        tracing::debug!(tool = tool_name, "calling MCP tool");

        let response = match self
            .transport
            .request("tools/call", Some(params), TimeoutClass::ToolCall)
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(tool = tool_name, error = %e, "tool call failed");
                return json!({"error": e.to_string()});
            }
        };

        match extract_result(response) {
            Ok(result) => {
                tracing::debug!(tool = tool_name, "tool call succeeded");
                result
            }
            Err(e) => {
                tracing::warn!(tool = tool_name, error = %e, "tool returned an error");
                json!({"error": e.to_string()})
            }
        }
    }

    // ─── Test support ────────────────────────────────────────────────────

    /// Construct a session that reports itself initialized without touching
    /// the network. Pool and dispatch tests use this in their factories.
    #[cfg(test)]
    pub(crate) fn stub_initialized(settings: &McpSettings) -> Self {
        let mut client = Self::new(settings).expect("stub transport");
        client.initialized = true;
        client
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_client_is_uninitialized() {
        let client = McpClient::new(&McpSettings::default()).unwrap();
        assert!(!client.is_initialized());
        assert!(client.session_id().is_none());
        assert!(client.server_info().is_none());
        assert!(client.capabilities().is_null());
    }

    #[tokio::test]
    async fn test_call_tool_unreachable_server_yields_error_value() {
        // Nothing listens on this port; the call must collapse to {"error"}.
        let settings = McpSettings {
            endpoint: "http://127.0.0.1:1/mcp".to_string(),
            handshake_timeout_secs: 1,
            call_timeout_secs: 1,
            ..Default::default()
        };
        let mut client = McpClient::new(&settings).unwrap();
        let result = client.call_tool("flight_search", serde_json::json!({})).await;

        let map = result.as_object().expect("object result");
        assert_eq!(map.len(), 1, "exactly the error key");
        assert!(map.contains_key("error"));
        assert!(!client.is_initialized());
    }

    #[tokio::test]
    async fn test_list_tools_unreachable_server_yields_empty() {
        let settings = McpSettings {
            endpoint: "http://127.0.0.1:1/mcp".to_string(),
            handshake_timeout_secs: 1,
            call_timeout_secs: 1,
            ..Default::default()
        };
        let mut client = McpClient::new(&settings).unwrap();
        assert!(client.list_tools().await.is_empty());
    }

    #[tokio::test]
    async fn test_initialize_unreachable_server_returns_false() {
        let settings = McpSettings {
            endpoint: "http://127.0.0.1:1/mcp".to_string(),
            handshake_timeout_secs: 1,
            ..Default::default()
        };
        let mut client = McpClient::new(&settings).unwrap();
        assert!(!client.initialize().await);
        // Still eligible for re-initialization.
        assert!(!client.is_initialized());
    }
}
