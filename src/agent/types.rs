//! Shared types for the agent core.

use serde::{Deserialize, Serialize};

// ─── Requests ───────────────────────────────────────────────────────────────

/// A plan-generation request as handed over by the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    /// Free-text travel request.
    pub prompt: String,
    /// Response language hint, e.g. `"en"` or `"tr"`.
    #[serde(default)]
    pub language: Option<String>,
    /// Pricing currency hint, e.g. `"TRY"`.
    #[serde(default)]
    pub currency: Option<String>,
}

/// A revision request against an existing plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviseRequest {
    #[serde(rename = "planId")]
    pub plan_id: String,
    pub instruction: String,
}

// ─── Pre-parsed query ───────────────────────────────────────────────────────

/// Structured fields an upstream prompt-parsing collaborator may supply.
///
/// When present, the orchestrator prefers these over re-deriving trip
/// parameters from the model's own output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedTripQuery {
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    /// `YYYY-MM-DD`.
    #[serde(default)]
    pub start_date: Option<String>,
    /// `YYYY-MM-DD`.
    #[serde(default)]
    pub end_date: Option<String>,
    /// Trip length in days when no end date was given.
    #[serde(default)]
    pub duration_days: Option<i64>,
    #[serde(default)]
    pub adults: Option<i64>,
    #[serde(default)]
    pub children: Option<i64>,
}

// ─── Tests ──────────────────────────────────────────────────────────────────
