//! Deterministic plan enrichment through direct tool calls.
//!
//! A model can fabricate a plausible plan without ever invoking a tool.
//! When a run finishes with zero tool diagnostics, the orchestrator runs
//! this pass: direct flight/hotel/weather/bus searches using the request
//! parameters it already knows, mapped into the plan sections. The same
//! pass fills the best-effort fallback plan after an aborted run.
//!
//! Each call produces one `{tool, ok, ms, error?}` diagnostic under the
//! adapter's dotted name; failures never abort the pass.

use serde_json::{json, Value};

use crate::plan::{
    DailyWeather, FlightOption, FlightSegment, FlightsSection, HotelOption, IntercityLeg,
    LodgingSection, ToolDiag, TransitMode, TripPlan,
};

use super::dispatch::ToolDispatcher;
use super::types::ParsedTripQuery;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Bus options kept from a search result.
const MAX_BUS_OPTIONS: usize = 5;

// ─── Parameters ──────────────────────────────────────────────────────────────

/// Trip parameters the enrichment calls are built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentParams {
    pub origin: String,
    pub destination: String,
    pub depart_iso: String,
    pub return_iso: String,
    pub adults: i64,
}

impl EnrichmentParams {
    /// Resolve parameters, preferring the upstream parser's fields over the
    /// plan's own (model-derived) parsed query.
    pub fn resolve(parsed: Option<&ParsedTripQuery>, plan: &TripPlan) -> Self {
        if let Some(p) = parsed {
            if p.origin.is_some() || p.destination.is_some() {
                return Self {
                    origin: p.origin.clone().unwrap_or_default(),
                    destination: p.destination.clone().unwrap_or_default(),
                    depart_iso: p.start_date.clone().unwrap_or_default(),
                    return_iso: p.end_date.clone().unwrap_or_default(),
                    adults: p.adults.unwrap_or(1).max(1),
                };
            }
        }

        let q = &plan.query.parsed;
        Self {
            origin: q
                .origin_iata
                .clone()
                .unwrap_or_else(|| q.origin_city.clone()),
            destination: q
                .destination_iata
                .clone()
                .unwrap_or_else(|| q.destination_city.clone()),
            depart_iso: q.start_date_iso.clone(),
            return_iso: q.end_date_iso.clone(),
            adults: q.adults.max(1),
        }
    }
}

/// Fold the upstream parser's fields into the plan's parsed query where the
/// model left gaps, recomputing nights when both dates are known.
pub fn apply_parsed_query(plan: &mut TripPlan, parsed: &ParsedTripQuery) {
    let q = &mut plan.query.parsed;
    if q.origin_city.is_empty() {
        if let Some(origin) = &parsed.origin {
            q.origin_city = origin.clone();
        }
    }
    if q.destination_city.is_empty() {
        if let Some(dest) = &parsed.destination {
            q.destination_city = dest.clone();
        }
    }
    if q.start_date_iso.is_empty() {
        if let Some(start) = &parsed.start_date {
            q.start_date_iso = start.clone();
        }
    }
    if q.end_date_iso.is_empty() {
        if let Some(end) = &parsed.end_date {
            q.end_date_iso = end.clone();
        }
    }
    if let Some(adults) = parsed.adults {
        q.adults = adults.max(1);
    }
    if parsed.children.is_some() {
        q.children = parsed.children;
    }

    if let (Ok(start), Ok(end)) = (
        chrono::NaiveDate::parse_from_str(&q.start_date_iso, "%Y-%m-%d"),
        chrono::NaiveDate::parse_from_str(&q.end_date_iso, "%Y-%m-%d"),
    ) {
        let nights = (end - start).num_days();
        if nights > 0 {
            q.nights = nights;
        }
    }
}

// ─── Enrichment pass ─────────────────────────────────────────────────────────

/// Run the direct search calls concurrently and fold results into the plan.
///
/// Diagnostics come back in a fixed order (flights, hotels, weather, bus)
/// regardless of completion order.
pub async fn enrich(
    dispatcher: &dyn ToolDispatcher,
    params: &EnrichmentParams,
    plan: &mut TripPlan,
) -> Vec<ToolDiag> {
    tracing::info!(
        origin = %params.origin,
        destination = %params.destination,
        depart = %params.depart_iso,
        "running deterministic enrichment pass"
    );

    let flights_call = labeled_call(
        dispatcher,
        "flight_search",
        "flights.search",
        json!({
            "origin": params.origin,
            "destination": params.destination,
            "departure_date": params.depart_iso,
            "return_date": params.return_iso,
            "adults": params.adults,
        }),
    );
    let hotels_call = labeled_call(
        dispatcher,
        "hotel_search",
        "hotels.search",
        json!({
            "destination_name": params.destination,
            "check_in_date": params.depart_iso,
            "check_out_date": params.return_iso,
            "adults": params.adults,
            "rooms": 1,
        }),
    );
    let weather_call = labeled_call(
        dispatcher,
        "flight_weather_forecast",
        "weather.forecast",
        json!({
            "location": params.destination,
            "start_date": params.depart_iso,
            "end_date": params.return_iso,
        }),
    );
    let bus_call = labeled_call(
        dispatcher,
        "bus_search",
        "bus.search",
        json!({
            "origin": params.origin,
            "destination": params.destination,
            "departure_date": params.depart_iso,
            "adults": params.adults,
        }),
    );

    let ((flights_data, flights_diag), (hotels_data, hotels_diag), (weather_data, weather_diag), (bus_data, bus_diag)) =
        tokio::join!(flights_call, hotels_call, weather_call, bus_call);

    if flights_diag.ok {
        if let Some(mapped) = map_flights(&flights_data) {
            plan.flights = mapped;
        } else {
            tracing::warn!("flight data returned but nothing mapped");
        }
    }
    if hotels_diag.ok {
        if let Some(mapped) = map_hotels(&hotels_data) {
            plan.lodging = mapped;
        } else {
            tracing::warn!("hotel data returned but nothing mapped");
        }
    }
    if weather_diag.ok {
        let mapped = map_weather(&weather_data);
        if !mapped.is_empty() {
            plan.weather = mapped;
        }
    }
    if bus_diag.ok {
        let mapped = map_bus(&bus_data);
        if !mapped.is_empty() {
            plan.transport.intercity = mapped;
        }
    }

    vec![flights_diag, hotels_diag, weather_diag, bus_diag]
}

/// Dispatch under the catalog tool name but report the adapter's dotted
/// diagnostic label.
async fn labeled_call(
    dispatcher: &dyn ToolDispatcher,
    tool: &str,
    label: &str,
    args: Value,
) -> (Value, ToolDiag) {
    let (value, mut diag) = dispatcher.dispatch(tool, args).await;
    diag.tool = label.to_string();
    (value, diag)
}

// ─── Payload mappers ─────────────────────────────────────────────────────────

/// Unwrap the MCP content-array envelope: `{"content":[{"type":"text",
/// "text":"<json>"}]}` yields the parsed inner JSON; anything else passes
/// through unchanged.
fn unwrap_content_text(data: &Value) -> Value {
    if let Some(items) = data.get("content").and_then(Value::as_array) {
        for item in items {
            if item.get("type").and_then(Value::as_str) == Some("text") {
                if let Some(text) = item.get("text").and_then(Value::as_str) {
                    if let Ok(parsed) = serde_json::from_str::<Value>(text) {
                        return parsed;
                    }
                }
            }
        }
    }
    data.clone()
}

/// `DD.MM.YYYY` + `HH:MM` into an ISO timestamp; empty on any parse failure.
fn parse_dt(date: Option<&str>, time: Option<&str>) -> String {
    let (Some(date), Some(time)) = (date, time) else {
        return String::new();
    };
    match chrono::NaiveDateTime::parse_from_str(
        &format!("{date} {time}"),
        "%d.%m.%Y %H:%M",
    ) {
        Ok(dt) => format!("{}Z", dt.format("%Y-%m-%dT%H:%M:%S")),
        Err(_) => String::new(),
    }
}

/// Map a flight-search payload into the flights section.
pub(crate) fn map_flights(data: &Value) -> Option<FlightsSection> {
    let data = unwrap_content_text(data);
    let root = data.get("data").unwrap_or(&data);
    let flights = root.get("flights")?;

    let departures = flights
        .get("departure")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let returns = flights
        .get("return")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if departures.is_empty() && returns.is_empty() {
        return None;
    }

    let map_option = |opt: &Value| -> FlightOption {
        let mut segments: Vec<FlightSegment> = opt
            .get("segments")
            .and_then(Value::as_array)
            .map(|segs| {
                segs.iter()
                    .map(|s| {
                        let dep = s.get("departure_datetime").cloned().unwrap_or(Value::Null);
                        let arr = s.get("arrival_datetime").cloned().unwrap_or(Value::Null);
                        FlightSegment {
                            from_iata: str_at(s, "origin"),
                            to_iata: str_at(s, "destination"),
                            depart_iso: parse_dt(
                                dep.get("date").and_then(Value::as_str),
                                dep.get("time").and_then(Value::as_str),
                            ),
                            arrive_iso: parse_dt(
                                arr.get("date").and_then(Value::as_str),
                                arr.get("time").and_then(Value::as_str),
                            ),
                            airline: first_str_at(s, &["marketing_airline", "operating_airline"]),
                            flight_number: str_at(s, "flight_number"),
                            duration_minutes: s
                                .get("duration")
                                .and_then(|d| d.get("total_minutes"))
                                .and_then(Value::as_i64)
                                .unwrap_or(0),
                            cabin: s
                                .get("cabin_class")
                                .and_then(Value::as_str)
                                .map(str::to_string),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        if segments.is_empty() {
            segments.push(FlightSegment {
                from_iata: String::new(),
                to_iata: String::new(),
                depart_iso: String::new(),
                arrive_iso: String::new(),
                airline: String::new(),
                flight_number: String::new(),
                duration_minutes: 0,
                cabin: None,
            });
        }

        let price_info = opt.get("price_breakdown").cloned().unwrap_or(Value::Null);
        FlightOption {
            provider: opt
                .get("booking_provider")
                .and_then(Value::as_str)
                .unwrap_or("mcp")
                .to_string(),
            price: price_info.get("total").and_then(crate::plan::normalize_amount),
            currency: price_info
                .get("currency")
                .or_else(|| root.get("currency"))
                .and_then(Value::as_str)
                .map(str::to_string),
            segments,
            baggage: None,
            refundable: None,
            booking_url: root
                .get("short_search_url")
                .or_else(|| root.get("search_url"))
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    };

    let alternatives: Vec<FlightOption> = departures
        .iter()
        .skip(1)
        .take(3)
        .map(&map_option)
        .collect();

    Some(FlightsSection {
        outbound: departures.first().map(&map_option),
        inbound: returns.first().map(&map_option),
        alternatives: if alternatives.is_empty() {
            None
        } else {
            Some(alternatives)
        },
    })
}

/// Map a hotel-search payload into the lodging section.
pub(crate) fn map_hotels(data: &Value) -> Option<LodgingSection> {
    let data = unwrap_content_text(data);
    let options = ["options", "results", "hotels"]
        .iter()
        .find_map(|k| data.get(*k).and_then(Value::as_array))?;
    let first = options.first()?;

    Some(LodgingSection {
        selected: Some(HotelOption {
            provider: first
                .get("provider")
                .and_then(Value::as_str)
                .unwrap_or("mcp")
                .to_string(),
            name: str_at(first, "name"),
            address: opt_str_at(first, "address"),
            check_in_iso: str_at(first, "checkInISO"),
            check_out_iso: str_at(first, "checkOutISO"),
            price_total: first
                .get("priceTotal")
                .and_then(crate::plan::normalize_amount)
                .or_else(|| first.get("price").and_then(crate::plan::normalize_amount)),
            currency: opt_str_at(first, "currency"),
            rating: first.get("rating").and_then(crate::plan::normalize_amount),
            amenities: first.get("amenities").and_then(Value::as_array).map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            }),
            neighborhood: opt_str_at(first, "neighborhood"),
            booking_url: opt_str_at(first, "bookingUrl"),
        }),
        alternatives: None,
    })
}

/// Map a weather-forecast payload into daily weather entries.
pub(crate) fn map_weather(data: &Value) -> Vec<DailyWeather> {
    let data = unwrap_content_text(data);
    let days = ["days", "forecast"]
        .iter()
        .find_map(|k| data.get(*k).and_then(Value::as_array));
    let Some(days) = days else {
        return Vec::new();
    };

    days.iter()
        .map(|d| DailyWeather {
            date_iso: first_str_at(d, &["dateISO", "date"]),
            high_c: d
                .get("highC")
                .or_else(|| d.get("high"))
                .and_then(crate::plan::normalize_amount),
            low_c: d
                .get("lowC")
                .or_else(|| d.get("low"))
                .and_then(crate::plan::normalize_amount),
            precipitation_chance: d
                .get("precipitationChance")
                .or_else(|| d.get("precipChance"))
                .and_then(crate::plan::normalize_amount),
            source: d
                .get("source")
                .and_then(Value::as_str)
                .unwrap_or("MCP")
                .to_string(),
            is_forecast: true,
        })
        .collect()
}

/// Map a bus-search payload into intercity legs (top options only).
pub(crate) fn map_bus(data: &Value) -> Vec<IntercityLeg> {
    let data = unwrap_content_text(data);
    let buses = ["buses", "options", "results"]
        .iter()
        .find_map(|k| data.get(*k).and_then(Value::as_array));
    let Some(buses) = buses else {
        return Vec::new();
    };

    buses
        .iter()
        .take(MAX_BUS_OPTIONS)
        .map(|bus| IntercityLeg {
            mode: TransitMode::Bus,
            operator: Some(first_str_at(bus, &["operator", "company"]))
                .filter(|s| !s.is_empty())
                .or(Some("Unknown".to_string())),
            depart_iso: ["departure_time", "departureTime"]
                .iter()
                .find_map(|k| bus.get(*k).and_then(Value::as_str))
                .map(str::to_string),
            arrive_iso: ["arrival_time", "arrivalTime"]
                .iter()
                .find_map(|k| bus.get(*k).and_then(Value::as_str))
                .map(str::to_string),
            duration_minutes: bus
                .get("duration")
                .or_else(|| bus.get("duration_minutes"))
                .and_then(Value::as_i64),
            price: bus.get("price").and_then(crate::plan::normalize_amount),
            currency: opt_str_at(bus, "currency"),
            booking_url: ["booking_url", "bookingUrl"]
                .iter()
                .find_map(|k| bus.get(*k).and_then(Value::as_str))
                .map(str::to_string),
        })
        .collect()
}

// ─── Small helpers ───────────────────────────────────────────────────────────

fn str_at(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn opt_str_at(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_str_at(value: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::normalize_to_contract;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Dispatcher serving canned responses; unknown tools time out (error).
    struct CannedDispatcher {
        responses: HashMap<&'static str, Value>,
    }

    #[async_trait]
    impl ToolDispatcher for CannedDispatcher {
        async fn dispatch(&self, tool: &str, _arguments: Value) -> (Value, ToolDiag) {
            match self.responses.get(tool) {
                Some(value) => (
                    value.clone(),
                    ToolDiag {
                        tool: tool.to_string(),
                        ok: true,
                        ms: Some(5),
                        error: None,
                    },
                ),
                None => (
                    json!({"error": format!("'{tool}' timed out after 60s")}),
                    ToolDiag {
                        tool: tool.to_string(),
                        ok: false,
                        ms: Some(60_000),
                        error: Some(format!("'{tool}' timed out after 60s")),
                    },
                ),
            }
        }
    }

    fn flight_payload() -> Value {
        json!({
            "data": {
                "currency": "TRY",
                "short_search_url": "https://example.test/f/abc",
                "flights": {
                    "departure": [{
                        "booking_provider": "enuygun",
                        "price_breakdown": {"total": "7,880 TL", "currency": "TRY"},
                        "segments": [{
                            "origin": "IST",
                            "destination": "CDG",
                            "departure_datetime": {"date": "15.11.2025", "time": "08:05"},
                            "arrival_datetime": {"date": "15.11.2025", "time": "11:35"},
                            "marketing_airline": "Turkish Airlines",
                            "flight_number": "TK1821",
                            "duration": {"total_minutes": 210},
                            "cabin_class": "economy"
                        }]
                    }],
                    "return": [{
                        "price_breakdown": {"total": 8120},
                        "segments": [{
                            "origin": "CDG",
                            "destination": "IST",
                            "departure_datetime": {"date": "20.11.2025", "time": "13:40"},
                            "arrival_datetime": {"date": "20.11.2025", "time": "19:00"},
                            "operating_airline": "Turkish Airlines",
                            "flight_number": "TK1822",
                            "duration": {"total_minutes": 200}
                        }]
                    }]
                }
            }
        })
    }

    fn hotel_payload() -> Value {
        // MCP content-array envelope around the actual JSON.
        json!({
            "content": [{
                "type": "text",
                "text": "{\"options\": [{\"name\": \"Hotel Lutetia\", \"rating\": \"9.4/10\", \"priceTotal\": \"62,286 TRY\", \"currency\": \"TRY\"}]}"
            }]
        })
    }

    fn weather_payload() -> Value {
        json!({
            "days": [
                {"date": "2025-11-15", "high": 12, "low": 6, "precipChance": 40},
                {"date": "2025-11-16", "high": 13, "low": 7}
            ]
        })
    }

    #[test]
    fn test_parse_dt() {
        assert_eq!(
            parse_dt(Some("15.11.2025"), Some("08:05")),
            "2025-11-15T08:05:00Z"
        );
        assert_eq!(parse_dt(Some("15.11.2025"), None), "");
        assert_eq!(parse_dt(Some("2025-11-15"), Some("08:05")), "");
    }

    #[test]
    fn test_map_flights_full_payload() {
        let section = map_flights(&flight_payload()).expect("mapped");
        let outbound = section.outbound.expect("outbound");
        assert_eq!(outbound.provider, "enuygun");
        assert_eq!(outbound.price, Some(7880.0));
        assert_eq!(outbound.currency.as_deref(), Some("TRY"));
        assert_eq!(outbound.segments[0].depart_iso, "2025-11-15T08:05:00Z");
        assert_eq!(outbound.segments[0].airline, "Turkish Airlines");
        assert_eq!(
            outbound.booking_url.as_deref(),
            Some("https://example.test/f/abc")
        );

        let inbound = section.inbound.expect("inbound");
        assert_eq!(inbound.provider, "mcp");
        assert_eq!(inbound.price, Some(8120.0));
        assert_eq!(inbound.segments[0].airline, "Turkish Airlines");
        assert!(section.alternatives.is_none());
    }

    #[test]
    fn test_map_flights_empty_payload() {
        assert!(map_flights(&json!({})).is_none());
        assert!(map_flights(&json!({"flights": {}})).is_none());
    }

    #[test]
    fn test_map_hotels_unwraps_content_envelope() {
        let section = map_hotels(&hotel_payload()).expect("mapped");
        let hotel = section.selected.expect("selected");
        assert_eq!(hotel.name, "Hotel Lutetia");
        assert_eq!(hotel.rating, Some(9.4));
        assert_eq!(hotel.price_total, Some(62286.0));
        assert_eq!(hotel.provider, "mcp");
    }

    #[test]
    fn test_map_weather() {
        let days = map_weather(&weather_payload());
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date_iso, "2025-11-15");
        assert_eq!(days[0].high_c, Some(12.0));
        assert_eq!(days[0].precipitation_chance, Some(40.0));
        assert_eq!(days[0].source, "MCP");
        assert!(days[0].is_forecast);
    }

    #[test]
    fn test_map_bus_caps_options() {
        let buses: Vec<Value> = (0..8)
            .map(|i| json!({"operator": format!("Op{i}"), "price": 100 + i}))
            .collect();
        let legs = map_bus(&json!({"buses": buses}));
        assert_eq!(legs.len(), MAX_BUS_OPTIONS);
        assert_eq!(legs[0].operator.as_deref(), Some("Op0"));
        assert_eq!(legs[0].mode, TransitMode::Bus);
    }

    #[tokio::test]
    async fn test_enrich_flight_timeout_keeps_other_sections() {
        // flight_search is not in the canned set, so it fails; hotels and
        // weather succeed. The plan must carry lodging + weather, no
        // outbound flight, and a failed flights.search diagnostic.
        let dispatcher = CannedDispatcher {
            responses: HashMap::from([
                ("hotel_search", hotel_payload()),
                ("flight_weather_forecast", weather_payload()),
            ]),
        };
        let mut plan = normalize_to_contract(&json!({}));
        let params = EnrichmentParams {
            origin: "Istanbul".into(),
            destination: "Paris".into(),
            depart_iso: "2025-11-15".into(),
            return_iso: "2025-11-20".into(),
            adults: 2,
        };

        let diags = enrich(&dispatcher, &params, &mut plan).await;

        assert!(plan.lodging.selected.is_some());
        assert_eq!(plan.weather.len(), 2);
        assert!(plan.flights.outbound.is_none());

        assert_eq!(diags.len(), 4);
        assert_eq!(diags[0].tool, "flights.search");
        assert!(!diags[0].ok);
        assert!(diags[0].error.is_some());
        assert_eq!(diags[1].tool, "hotels.search");
        assert!(diags[1].ok);
        assert_eq!(diags[2].tool, "weather.forecast");
        assert!(diags[2].ok);
        assert_eq!(diags[3].tool, "bus.search");
        assert!(!diags[3].ok);
    }

    #[tokio::test]
    async fn test_enrich_maps_all_sections_on_success() {
        let dispatcher = CannedDispatcher {
            responses: HashMap::from([
                ("flight_search", flight_payload()),
                ("hotel_search", hotel_payload()),
                ("flight_weather_forecast", weather_payload()),
                (
                    "bus_search",
                    json!({"buses": [{"operator": "FlixBus", "price": "450 TL"}]}),
                ),
            ]),
        };
        let mut plan = normalize_to_contract(&json!({}));
        let params = EnrichmentParams::default();

        let diags = enrich(&dispatcher, &params, &mut plan).await;

        assert!(diags.iter().all(|d| d.ok));
        assert!(plan.flights.outbound.is_some());
        assert!(plan.lodging.selected.is_some());
        assert_eq!(plan.transport.intercity.len(), 1);
        assert_eq!(plan.transport.intercity[0].price, Some(450.0));
    }

    #[test]
    fn test_params_prefer_upstream_parser() {
        let plan = normalize_to_contract(&json!({
            "query": {"parsed": {"originCity": "Ankara", "destinationCity": "Rome"}}
        }));
        let parsed = ParsedTripQuery {
            origin: Some("Istanbul".into()),
            destination: Some("Paris".into()),
            start_date: Some("2025-11-15".into()),
            end_date: Some("2025-11-20".into()),
            adults: Some(2),
            ..Default::default()
        };

        let params = EnrichmentParams::resolve(Some(&parsed), &plan);
        assert_eq!(params.origin, "Istanbul");
        assert_eq!(params.destination, "Paris");
        assert_eq!(params.adults, 2);

        let params = EnrichmentParams::resolve(None, &plan);
        assert_eq!(params.origin, "Ankara");
        assert_eq!(params.destination, "Rome");
        assert_eq!(params.adults, 1);
    }

    #[test]
    fn test_apply_parsed_query_fills_gaps_and_nights() {
        let mut plan = normalize_to_contract(&json!({
            "query": {"parsed": {"originCity": "Istanbul"}}
        }));
        let parsed = ParsedTripQuery {
            origin: Some("Izmir".into()),
            destination: Some("Berlin".into()),
            start_date: Some("2025-10-15".into()),
            end_date: Some("2025-10-18".into()),
            adults: Some(2),
            ..Default::default()
        };

        apply_parsed_query(&mut plan, &parsed);
        let q = &plan.query.parsed;
        // Existing value wins; gaps are filled.
        assert_eq!(q.origin_city, "Istanbul");
        assert_eq!(q.destination_city, "Berlin");
        assert_eq!(q.start_date_iso, "2025-10-15");
        assert_eq!(q.nights, 3);
        assert_eq!(q.adults, 2);
    }
}
