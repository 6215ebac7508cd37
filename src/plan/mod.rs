//! Trip plan contract and the normalization layer that produces it.
//!
//! Submodules:
//! - `contract`: the strict, always-fully-shaped plan types returned to callers
//! - `normalize`: total coercion from untrusted model JSON into the contract

pub mod contract;
pub mod normalize;

// Re-exports for convenience
pub use contract::{
    BlockLabel, Confidence, DailyWeather, DayBlock, DayPlan, FlightOption, FlightSegment,
    FlightsSection, HotelOption, IntercityLeg, LodgingSection, Metadata, ParsedQuery, Pricing,
    PricingBreakdown, Query, SourceRef, ToolDiag, TransitMode, TransportPass, TransportSection,
    TripPlan,
};
pub use normalize::{extract_json_object, normalize_amount, normalize_to_contract, NormalizeError};
