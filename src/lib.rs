//! tripsmith — tool-orchestration core for an AI travel planner.
//!
//! Answers natural-language travel requests by running an LLM agent that
//! calls remote data-retrieval tools (flight/hotel/weather/bus search)
//! over a JSON-RPC/SSE protocol, returning a schema-validated trip plan.
//!
//! The crate is a library: HTTP routing, request schemas, conversation
//! bookkeeping, and the travel-domain prompt text live in the embedding
//! service. Wiring order for callers:
//!
//! 1. [`config::load_settings`] (or `Settings::default()` in tests)
//! 2. [`mcp_client::SessionPool::from_settings`] + `warmup`
//! 3. [`mcp_client::ToolRegistry`], [`cache::PlanCache`], [`llm::LlmClient`]
//! 4. [`agent::Orchestrator`] over a [`agent::PooledDispatcher`]

pub mod agent;
pub mod cache;
pub mod config;
pub mod llm;
pub mod mcp_client;
pub mod plan;

// Re-exports for convenience
pub use agent::{AgentError, Orchestrator, ParsedTripQuery, PlanRequest, ReviseRequest};
pub use cache::PlanCache;
pub use config::Settings;
pub use llm::LlmClient;
pub use mcp_client::{SessionPool, ToolRegistry};
pub use plan::TripPlan;

/// Initialize the tracing subscriber for binaries embedding this crate.
///
/// Respects `RUST_LOG`; defaults to info-level crate logs with warnings
/// from dependencies.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tripsmith=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
