//! MCP client — JSON-RPC over HTTP/SSE against the remote tool proxy.
//!
//! This module handles:
//! - The protocol handshake (initialize → notifications/initialized →
//!   tools/list → tools/call) and per-session state
//! - SSE response framing and session-id header echo
//! - A bounded pool of pre-initialized sessions with lease semantics
//! - The cached tool catalog and its bridge to the LLM function schema
//!
//! Everything here is best-effort by design: tool availability degrades,
//! it never takes the orchestrator down with it.

pub mod client;
pub mod errors;
pub mod pool;
pub mod registry;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::McpClient;
pub use errors::McpError;
pub use pool::{mcp_session_factory, PoolStats, SessionFactory, SessionLease, SessionPool};
pub use registry::ToolRegistry;
pub use types::ToolDescriptor;
