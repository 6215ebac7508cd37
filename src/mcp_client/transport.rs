//! JSON-RPC over HTTP with SSE-framed responses.
//!
//! The tool proxy speaks JSON-RPC 2.0 POSTed to a fixed endpoint, but frames
//! each response body as a single Server-Sent Event:
//!
//! ```text
//! event: message
//! data: {"jsonrpc":"2.0","id":1,"result":{...}}
//! ```
//!
//! The server may assign a session id via the `mcp-session-id` response
//! header on the first reply; it must be echoed on every later call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use reqwest::Client as HttpClient;

use crate::config::McpSettings;

use super::errors::McpError;
use super::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout, shared by both request classes.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Header carrying the server-assigned session id.
const SESSION_ID_HEADER: &str = "mcp-session-id";

/// Header carrying the protocol version on every call.
const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

// ─── Transport ───────────────────────────────────────────────────────────────

/// One session's JSON-RPC transport.
///
/// Owns the request-id counter: ids strictly increase within the session and
/// are never reused, which also serializes calls logically even though the
/// transport itself is stateless HTTP.
pub struct HttpTransport {
    /// Client for handshake calls (`initialize`, `tools/list`).
    http: HttpClient,
    /// Client for `tools/call` — longer timeout, tool latency dominates.
    http_call: HttpClient,
    endpoint: String,
    api_key: Option<String>,
    protocol_version: String,
    handshake_timeout_secs: u64,
    call_timeout_secs: u64,
    session_id: Mutex<Option<String>>,
    next_id: AtomicU64,
}

/// Which timeout class a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    Handshake,
    ToolCall,
}

impl HttpTransport {
    /// Build a transport from settings. No I/O happens until the first call.
    pub fn new(settings: &McpSettings) -> Result<Self, McpError> {
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(settings.handshake_timeout_secs))
            .build()
            .map_err(|e| McpError::Transport {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let http_call = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(settings.call_timeout_secs))
            .build()
            .map_err(|e| McpError::Transport {
                reason: format!("failed to build tool-call HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            http_call,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            protocol_version: settings.protocol_version.clone(),
            handshake_timeout_secs: settings.handshake_timeout_secs,
            call_timeout_secs: settings.call_timeout_secs,
            session_id: Mutex::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    /// Generate the next request id. Strictly increasing, never reused.
    pub fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// The session id assigned by the server, if any.
    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().ok().and_then(|g| g.clone())
    }

    /// The protocol version this transport advertises.
    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    /// Send a JSON-RPC request and parse the SSE-framed response.
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
        class: TimeoutClass,
    ) -> Result<JsonRpcResponse, McpError> {
        let id = self.next_request_id();
        let req = JsonRpcRequest::new(id, method, params);

        let (client, timeout_secs) = match class {
            TimeoutClass::Handshake => (&self.http, self.handshake_timeout_secs),
            TimeoutClass::ToolCall => (&self.http_call, self.call_timeout_secs),
        };

        let mut builder = client
            .post(&self.endpoint)
            .header("accept", "application/json, text/event-stream")
            .header(PROTOCOL_VERSION_HEADER, &self.protocol_version)
            .json(&req);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        if let Some(session) = self.session_id() {
            builder = builder.header(SESSION_ID_HEADER, session);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                McpError::Timeout {
                    method: method.to_string(),
                    timeout_secs,
                }
            } else {
                McpError::Transport {
                    reason: e.to_string(),
                }
            }
        })?;

        // The session id arrives in a response header and must be echoed on
        // every later call.
        if let Some(session) = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if let Ok(mut guard) = self.session_id.lock() {
                *guard = Some(session.to_string());
            }
        }

        let status = response.status();
        let body = response.text().await.map_err(|e| McpError::Transport {
            reason: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(McpError::Transport {
                reason: format!("HTTP {}: {}", status.as_u16(), truncate(&body, 300)),
            });
        }

        let value = parse_sse_frame(&body)?;
        serde_json::from_value(value).map_err(|e| McpError::SseFrame {
            reason: format!("frame is not a JSON-RPC response: {e}"),
        })
    }

    /// Send a JSON-RPC notification. No response body is expected.
    pub async fn notify(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        let note = JsonRpcNotification::new(method, params);

        let mut builder = self
            .http
            .post(&self.endpoint)
            .header("accept", "application/json, text/event-stream")
            .header(PROTOCOL_VERSION_HEADER, &self.protocol_version)
            .json(&note);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        if let Some(session) = self.session_id() {
            builder = builder.header(SESSION_ID_HEADER, session);
        }

        builder
            .send()
            .await
            .map_err(|e| McpError::Transport {
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

// ─── SSE framing ─────────────────────────────────────────────────────────────

/// Extract the JSON payload from a single-event SSE frame.
///
/// The proxy frames every response as `event: message\ndata: <json>\n\n`.
/// A bare JSON body is accepted too, so the parser survives proxies that
/// skip framing for errors.
pub fn parse_sse_frame(body: &str) -> Result<serde_json::Value, McpError> {
    for line in body.lines() {
        if let Some(data) = line.strip_prefix("data:") {
            return serde_json::from_str(data.trim()).map_err(|e| McpError::SseFrame {
                reason: format!("invalid JSON in data line: {e}"),
            });
        }
    }

    let trimmed = body.trim();
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed).map_err(|e| McpError::SseFrame {
            reason: format!("invalid JSON body: {e}"),
        });
    }

    Err(McpError::SseFrame {
        reason: format!("no data line in response: {}", truncate(body, 200)),
    })
}

/// Extract the result from a JSON-RPC response, converting errors to `McpError`.
pub fn extract_result(response: JsonRpcResponse) -> Result<serde_json::Value, McpError> {
    if let Some(err) = response.error {
        return Err(McpError::Server {
            code: err.code,
            message: err.message,
            data: err.data,
        });
    }

    response.result.ok_or(McpError::Server {
        code: super::types::error_codes::INTERNAL_ERROR,
        message: "response missing both result and error".into(),
        data: None,
    })
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push_str("...");
        out
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
