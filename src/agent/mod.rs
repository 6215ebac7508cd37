//! Agent core — the multi-turn orchestration layer.
//!
//! Submodules:
//! - `orchestrator`: the bounded model/tool loop and its fallback paths
//! - `dispatch`: the tool-execution seam between the loop and the session pool
//! - `enrichment`: deterministic direct tool calls when the model skipped tools
//! - `types`: request and pre-parsed-query types
//! - `errors`: agent-level error types

pub mod dispatch;
pub mod enrichment;
pub mod errors;
pub mod orchestrator;
pub mod types;

// Re-exports for convenience
pub use dispatch::{PooledDispatcher, ToolDispatcher};
pub use errors::AgentError;
pub use orchestrator::Orchestrator;
pub use types::{ParsedTripQuery, PlanRequest, ReviseRequest};
