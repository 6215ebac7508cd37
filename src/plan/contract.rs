//! The normalized trip plan contract.
//!
//! Every plan returned by the orchestrator has exactly this shape — all nine
//! top-level keys present regardless of how incomplete the model's raw output
//! was. The normalizer fills defaults; nothing here is allowed to be missing.
//!
//! Serialization notes: the wire format is camelCase with `ISO`-suffixed date
//! fields (`dateISO`, `departISO`), matching what downstream route handlers
//! and frontends consume. Fields that need the suffix carry explicit renames
//! because `rename_all = "camelCase"` would produce `dateIso`.

use serde::{Deserialize, Serialize};

// ─── Diagnostics & Sources ──────────────────────────────────────────────────

/// Where a piece of plan data came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One tool invocation's outcome, appended in call order to
/// `metadata.toolDiagnostics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDiag {
    /// Dotted tool identifier, e.g. `"flights.search"`.
    pub tool: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ─── Flights ────────────────────────────────────────────────────────────────

/// One leg of a flight itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightSegment {
    #[serde(rename = "fromIata")]
    pub from_iata: String,
    #[serde(rename = "toIata")]
    pub to_iata: String,
    #[serde(rename = "departISO")]
    pub depart_iso: String,
    #[serde(rename = "arriveISO")]
    pub arrive_iso: String,
    pub airline: String,
    #[serde(rename = "flightNumber")]
    pub flight_number: String,
    #[serde(rename = "durationMinutes")]
    pub duration_minutes: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cabin: Option<String>,
}

/// A bookable flight option (one or more segments).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightOption {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub segments: Vec<FlightSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baggage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refundable: Option<bool>,
    #[serde(rename = "bookingUrl", default, skip_serializing_if = "Option::is_none")]
    pub booking_url: Option<String>,
}

/// The flights section of a plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightsSection {
    #[serde(default)]
    pub outbound: Option<FlightOption>,
    #[serde(default)]
    pub inbound: Option<FlightOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternatives: Option<Vec<FlightOption>>,
}

// ─── Lodging ────────────────────────────────────────────────────────────────

/// A bookable hotel option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotelOption {
    pub provider: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "checkInISO")]
    pub check_in_iso: String,
    #[serde(rename = "checkOutISO")]
    pub check_out_iso: String,
    #[serde(rename = "priceTotal", default, skip_serializing_if = "Option::is_none")]
    pub price_total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amenities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(rename = "bookingUrl", default, skip_serializing_if = "Option::is_none")]
    pub booking_url: Option<String>,
}

/// The lodging section of a plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LodgingSection {
    #[serde(default)]
    pub selected: Option<HotelOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternatives: Option<Vec<HotelOption>>,
}

// ─── Transport ──────────────────────────────────────────────────────────────

/// A local transport pass (metro card, city pass).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportPass {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(rename = "coverageNotes", default, skip_serializing_if = "Option::is_none")]
    pub coverage_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Ground transport mode for intercity legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitMode {
    Bus,
    Train,
}

/// An intercity ground-transport option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntercityLeg {
    pub mode: TransitMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(rename = "departISO", default, skip_serializing_if = "Option::is_none")]
    pub depart_iso: Option<String>,
    #[serde(rename = "arriveISO", default, skip_serializing_if = "Option::is_none")]
    pub arrive_iso: Option<String>,
    #[serde(rename = "durationMinutes", default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(rename = "bookingUrl", default, skip_serializing_if = "Option::is_none")]
    pub booking_url: Option<String>,
}

/// The transport section of a plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportSection {
    #[serde(default)]
    pub local_passes: Vec<TransportPass>,
    #[serde(default)]
    pub intercity: Vec<IntercityLeg>,
}

// ─── Weather ────────────────────────────────────────────────────────────────

/// One day of weather for the destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyWeather {
    #[serde(rename = "dateISO")]
    pub date_iso: String,
    #[serde(rename = "highC", default, skip_serializing_if = "Option::is_none")]
    pub high_c: Option<f64>,
    #[serde(rename = "lowC", default, skip_serializing_if = "Option::is_none")]
    pub low_c: Option<f64>,
    #[serde(
        rename = "precipitationChance",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub precipitation_chance: Option<f64>,
    pub source: String,
    #[serde(rename = "isForecast")]
    pub is_forecast: bool,
}

// ─── Day-by-day itinerary ───────────────────────────────────────────────────

/// Time-of-day bucket for an itinerary block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockLabel {
    #[serde(rename = "morning")]
    Morning,
    #[serde(rename = "afternoon")]
    Afternoon,
    #[serde(rename = "evening")]
    Evening,
    #[serde(rename = "late-night")]
    LateNight,
    #[serde(rename = "transit")]
    Transit,
    #[serde(rename = "check-in")]
    CheckIn,
    #[serde(rename = "check-out")]
    CheckOut,
}

/// A block of activities within one day.
///
/// Items are deliberately loose (`serde_json::Value`): the model mixes
/// activities, transfers, and buffers in one list and the frontend renders
/// them by their `type` discriminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayBlock {
    pub label: BlockLabel,
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One day of the itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    #[serde(rename = "dateISO")]
    pub date_iso: String,
    #[serde(default)]
    pub blocks: Vec<DayBlock>,
    #[serde(rename = "dailyTips", default, skip_serializing_if = "Option::is_none")]
    pub daily_tips: Option<Vec<String>>,
}

// ─── Pricing ────────────────────────────────────────────────────────────────

/// Per-category price estimates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingBreakdown {
    #[serde(default)]
    pub flights: Option<f64>,
    #[serde(default)]
    pub lodging: Option<f64>,
    #[serde(default)]
    pub activities: Option<f64>,
    #[serde(default)]
    pub transport: Option<f64>,
    #[serde(default)]
    pub fees_and_taxes: Option<f64>,
}

/// Confidence in the pricing estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// The pricing section of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub currency: String,
    pub breakdown: PricingBreakdown,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_estimated: Option<f64>,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<String>>,
}

// ─── Query ──────────────────────────────────────────────────────────────────

/// The structured interpretation of the user's request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuery {
    #[serde(rename = "originCity")]
    pub origin_city: String,
    #[serde(rename = "originIata", default, skip_serializing_if = "Option::is_none")]
    pub origin_iata: Option<String>,
    #[serde(rename = "destinationCity")]
    pub destination_city: String,
    #[serde(
        rename = "destinationIata",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub destination_iata: Option<String>,
    #[serde(rename = "startDateISO")]
    pub start_date_iso: String,
    #[serde(rename = "endDateISO")]
    pub end_date_iso: String,
    pub nights: i64,
    pub adults: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// The original request plus its structured interpretation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub raw: String,
    pub parsed: ParsedQuery,
}

// ─── Metadata ───────────────────────────────────────────────────────────────

/// Plan provenance and diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "generatedAtISO")]
    pub generated_at_iso: String,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
    #[serde(rename = "toolDiagnostics", default)]
    pub tool_diagnostics: Vec<ToolDiag>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(rename = "revisionOf", default, skip_serializing_if = "Option::is_none")]
    pub revision_of: Option<String>,
    #[serde(rename = "planId")]
    pub plan_id: String,
}

// ─── TripPlan ───────────────────────────────────────────────────────────────

/// The complete normalized trip plan.
///
/// Invariant: built once per run by the normalizer and immutable afterwards
/// (the orchestrator only appends run diagnostics to `metadata` before
/// handing the plan out).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripPlan {
    pub query: Query,
    pub summary: String,
    pub flights: FlightsSection,
    pub lodging: LodgingSection,
    pub transport: TransportSection,
    pub weather: Vec<DailyWeather>,
    pub days: Vec<DayPlan>,
    pub pricing: Pricing,
    pub metadata: Metadata,
}

// ─── Tests ──────────────────────────────────────────────────────────────────
