//! Total coercion from untrusted model JSON into the plan contract.
//!
//! The model's final output is JSON in intent but not in discipline: numbers
//! arrive as currency strings (`"7,880 TL"`), ratings as `"9.4/10"`, lists as
//! single objects, labels as clock times or Turkish synonyms, and whole
//! substructures go missing. Every coercion lives here, one decode-with-default
//! per field, so the rest of the crate only ever sees a fully-shaped
//! [`TripPlan`].
//!
//! `normalize_to_contract` never fails: for any decodable JSON object it
//! returns a valid contract value. The only aborting condition is
//! [`NormalizeError::Unparsable`] from [`extract_json_object`], which callers
//! handle separately from data-quality issues.

use chrono::{Days, NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use super::contract::{
    BlockLabel, Confidence, DailyWeather, DayBlock, DayPlan, FlightOption, FlightSegment,
    FlightsSection, HotelOption, IntercityLeg, LodgingSection, Metadata, ParsedQuery, Pricing,
    PricingBreakdown, Query, SourceRef, ToolDiag, TransitMode, TransportPass, TransportSection,
    TripPlan,
};

// ─── Errors ─────────────────────────────────────────────────────────────────

/// Raised only when the model output contains no decodable JSON object at all.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("no JSON object found in model output: {preview}")]
    Unparsable { preview: String },
}

// ─── JSON extraction ────────────────────────────────────────────────────────

/// Parse the model's final text as a JSON object.
///
/// First recovery for prose-wrapped output is brace extraction: the outermost
/// `{...}` span is re-parsed. Anything less decodable than that is the one
/// condition that aborts the run.
pub fn extract_json_object(text: &str) -> Result<Value, NormalizeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(NormalizeError::Unparsable {
            preview: "<empty>".to_string(),
        });
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() {
            return Ok(value);
        }
    }

    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    if let (Some(s), Some(e)) = (start, end) {
        if e > s {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[s..=e]) {
                if value.is_object() {
                    return Ok(value);
                }
            }
        }
    }

    Err(NormalizeError::Unparsable {
        preview: preview(trimmed),
    })
}

fn preview(text: &str) -> String {
    let mut p: String = text.chars().take(200).collect();
    if text.chars().count() > 200 {
        p.push_str("...");
    }
    p
}

// ─── Scalar coercions ───────────────────────────────────────────────────────

/// Coerce a possibly-messy value into a numeric amount.
///
/// Currency strings are stripped of everything but digits and the decimal
/// point (`"7,880 TL"` → 7880.0); `x/y` ratings keep the numerator
/// (`"9.4/10"` → 9.4). Unparsable input yields `None`, never an error.
pub fn normalize_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => amount_from_str(s),
        _ => None,
    }
}

fn amount_from_str(s: &str) -> Option<f64> {
    let numeric_part = match s.find('/') {
        Some(idx) => &s[..idx],
        None => s,
    };
    let cleaned: String = numeric_part
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

/// Amounts that may arrive nested (`{"total": ..}` / `{"amount": ..}`) or flat.
fn extract_amount(value: Option<&Value>) -> Option<f64> {
    let value = value?;
    if let Some(map) = value.as_object() {
        for key in ["total", "amount", "price"] {
            if let Some(inner) = map.get(key) {
                if let Some(n) = normalize_amount(inner) {
                    return Some(n);
                }
            }
        }
        return None;
    }
    normalize_amount(value)
}

fn coerce_i64(value: Option<&Value>) -> Option<i64> {
    let value = value?;
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            if let Ok(n) = s.trim().parse::<i64>() {
                return Some(n);
            }
            // Ranges like "3-4 gün": take the largest embedded integer.
            s.split(|c: char| !c.is_ascii_digit())
                .filter(|part| !part.is_empty())
                .filter_map(|part| part.parse::<i64>().ok())
                .max()
        }
        _ => None,
    }
}

/// Single-object-vs-list ambiguity collapses to a list, possibly empty.
fn as_list(value: Option<&Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
    }
}

fn as_map(value: Option<&Value>) -> Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

/// First non-empty string among a list of aliased keys.
fn first_str(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(Value::String(s)) = map.get(*key) {
            if !s.is_empty() {
                return Some(s.clone());
            }
        }
    }
    None
}

fn str_or_empty(map: &Map<String, Value>, keys: &[&str]) -> String {
    first_str(map, keys).unwrap_or_default()
}

fn opt_str(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    first_str(map, keys)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    as_list(value)
        .into_iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .collect()
}

fn opt_string_list(value: Option<&Value>) -> Option<Vec<String>> {
    match value {
        Some(Value::Array(_)) => Some(string_list(value)),
        _ => None,
    }
}

// ─── Dates ──────────────────────────────────────────────────────────────────

/// `start + add_days`, both `YYYY-MM-DD`. Anything unparsable yields `None`.
fn derive_end_date(start: &str, add_days: i64) -> Option<String> {
    if add_days < 0 {
        return None;
    }
    let date = NaiveDate::parse_from_str(start, "%Y-%m-%d").ok()?;
    let end = date.checked_add_days(Days::new(add_days as u64))?;
    Some(end.format("%Y-%m-%d").to_string())
}

// ─── Contract assembly ──────────────────────────────────────────────────────

/// Deterministically produce the full contract from loosely-typed JSON.
pub fn normalize_to_contract(obj: &Value) -> TripPlan {
    let root = as_map(Some(obj));
    let now_iso = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    let query = coerce_query(&root);
    let flights = coerce_flights_section(&root);
    let lodging = coerce_lodging_section(&root);
    let transport = coerce_transport_section(&root);
    let weather = coerce_weather(&root, &query.parsed.start_date_iso);
    let days = as_list(root.get("days")).iter().map(coerce_day).collect();
    let pricing = coerce_pricing(&root);
    let metadata = coerce_metadata(&root, &now_iso);
    let summary = str_or_empty(&root, &["summary", "overview"]);

    TripPlan {
        query,
        summary,
        flights,
        lodging,
        transport,
        weather,
        days,
        pricing,
        metadata,
    }
}

// ─── Query ──────────────────────────────────────────────────────────────────

fn coerce_query(root: &Map<String, Value>) -> Query {
    let query = as_map(root.get("query"));
    let raw = str_or_empty(&query, &["raw"]);
    let raw = if raw.is_empty() {
        str_or_empty(root, &["prompt"])
    } else {
        raw
    };
    let parsed = as_map(query.get("parsed"));

    let origin_city = {
        let from_parsed = str_or_empty(&parsed, &["originCity", "from"]);
        if from_parsed.is_empty() {
            str_or_empty(root, &["from"])
        } else {
            from_parsed
        }
    };
    let destination_city = {
        let from_parsed = str_or_empty(&parsed, &["destinationCity", "to"]);
        if from_parsed.is_empty() {
            str_or_empty(root, &["to"])
        } else {
            from_parsed
        }
    };
    let start_date_iso = {
        let from_parsed = str_or_empty(&parsed, &["startDateISO", "startDate"]);
        if from_parsed.is_empty() {
            str_or_empty(root, &["startDate", "date"])
        } else {
            from_parsed
        }
    };
    let mut end_date_iso = {
        let from_parsed = str_or_empty(&parsed, &["endDateISO", "endDate"]);
        if from_parsed.is_empty() {
            str_or_empty(root, &["endDate"])
        } else {
            from_parsed
        }
    };

    let nights = coerce_i64(parsed.get("nights"))
        .or_else(|| coerce_i64(root.get("nights")))
        .unwrap_or(0);
    let adults = coerce_i64(parsed.get("adults"))
        .or_else(|| coerce_i64(root.get("adults")))
        .unwrap_or(1);
    let duration = coerce_i64(parsed.get("duration"));

    // A missing end date is derived, not trusted from the model: a trip of
    // `duration` days ends duration-1 days after it starts; `nights` counts
    // the gap directly.
    if end_date_iso.is_empty() && !start_date_iso.is_empty() {
        let derived = match duration {
            Some(d) if d > 0 => derive_end_date(&start_date_iso, d - 1),
            _ if nights > 0 => derive_end_date(&start_date_iso, nights),
            _ => None,
        };
        if let Some(end) = derived {
            end_date_iso = end;
        }
    }

    Query {
        raw,
        parsed: ParsedQuery {
            origin_city,
            origin_iata: opt_str(&parsed, &["originIata"]),
            destination_city,
            destination_iata: opt_str(&parsed, &["destinationIata"]),
            start_date_iso,
            end_date_iso,
            nights,
            adults,
            children: coerce_i64(parsed.get("children")),
            budget: parsed.get("budget").filter(|v| !v.is_null()).cloned(),
            preferences: opt_string_list(parsed.get("preferences")),
            constraints: opt_string_list(parsed.get("constraints")),
            language: opt_str(&parsed, &["language"]),
            currency: opt_str(&parsed, &["currency"]),
        },
    }
}

// ─── Flights ────────────────────────────────────────────────────────────────

fn coerce_flights_section(root: &Map<String, Value>) -> FlightsSection {
    let flights = as_map(root.get("flights"));

    let outbound = ["outbound", "go", "flight"]
        .iter()
        .find_map(|k| flights.get(*k).and_then(coerce_flight));
    let inbound = ["inbound", "return"]
        .iter()
        .find_map(|k| flights.get(*k).and_then(coerce_flight));

    let alternatives: Vec<FlightOption> = as_list(flights.get("alternatives"))
        .iter()
        .filter_map(coerce_flight)
        .collect();

    FlightsSection {
        outbound,
        inbound,
        alternatives: if alternatives.is_empty() {
            None
        } else {
            Some(alternatives)
        },
    }
}

const SEGMENT_KEYS: &[&str] = &[
    "fromIata",
    "toIata",
    "departISO",
    "arriveISO",
    "airline",
    "flightNumber",
    "durationMinutes",
    "cabin",
];

fn coerce_flight(value: &Value) -> Option<FlightOption> {
    let map = value.as_object()?;

    let mut segments_in = as_list(map.get("segments"));
    if segments_in.is_empty() {
        // A flat flight object carrying segment fields is promoted to a
        // single-segment itinerary.
        let mut flat = Map::new();
        for key in SEGMENT_KEYS {
            if let Some(v) = map.get(*key) {
                flat.insert((*key).to_string(), v.clone());
            }
        }
        if !flat.is_empty() {
            segments_in.push(Value::Object(flat));
        }
    }
    let segments: Vec<FlightSegment> = segments_in.iter().map(coerce_segment).collect();

    let provider = first_str(map, &["provider", "airline"]).unwrap_or_else(|| "unknown".into());

    Some(FlightOption {
        provider,
        price: map.get("price").and_then(normalize_amount),
        currency: opt_str(map, &["currency"]),
        segments,
        baggage: opt_str(map, &["baggage"]),
        refundable: map.get("refundable").and_then(Value::as_bool),
        booking_url: opt_str(map, &["bookingUrl"]),
    })
}

fn coerce_segment(value: &Value) -> FlightSegment {
    let map = as_map(Some(value));
    FlightSegment {
        from_iata: str_or_empty(&map, &["fromIata", "from"]),
        to_iata: str_or_empty(&map, &["toIata", "to"]),
        depart_iso: str_or_empty(&map, &["departISO", "depart"]),
        arrive_iso: str_or_empty(&map, &["arriveISO", "arrival"]),
        airline: str_or_empty(&map, &["airline"]),
        flight_number: str_or_empty(&map, &["flightNumber", "number"]),
        duration_minutes: coerce_i64(map.get("durationMinutes"))
            .or_else(|| coerce_i64(map.get("duration")))
            .unwrap_or(0),
        cabin: opt_str(&map, &["cabin"]),
    }
}

// ─── Lodging ────────────────────────────────────────────────────────────────

fn coerce_lodging_section(root: &Map<String, Value>) -> LodgingSection {
    let src = match root.get("lodging").and_then(Value::as_object) {
        Some(m) => m.clone(),
        None => as_map(root.get("hotel")),
    };

    let selected = match src.get("selected") {
        Some(v) if !v.is_null() => coerce_hotel(v),
        _ if src.contains_key("selected") || src.contains_key("alternatives") => None,
        // A bare hotel object in place of the section.
        _ => coerce_hotel(&Value::Object(src.clone())),
    };

    let alternatives: Vec<HotelOption> = as_list(src.get("alternatives"))
        .iter()
        .filter_map(coerce_hotel)
        .collect();

    LodgingSection {
        selected,
        alternatives: if alternatives.is_empty() {
            None
        } else {
            Some(alternatives)
        },
    }
}

fn coerce_hotel(value: &Value) -> Option<HotelOption> {
    let map = value.as_object()?;
    if map.is_empty() {
        return None;
    }

    // Ratings arrive as numbers, numeric strings, or "9.4/10".
    let rating = map.get("rating").and_then(normalize_amount);
    let price_total = map
        .get("priceTotal")
        .and_then(normalize_amount)
        .or_else(|| map.get("price").and_then(normalize_amount));

    Some(HotelOption {
        provider: first_str(map, &["provider"]).unwrap_or_else(|| "unknown".into()),
        name: str_or_empty(map, &["name", "hotel"]),
        address: opt_str(map, &["address"]),
        check_in_iso: str_or_empty(map, &["checkInISO", "checkIn"]),
        check_out_iso: str_or_empty(map, &["checkOutISO", "checkOut"]),
        price_total,
        currency: opt_str(map, &["currency"]),
        rating,
        amenities: opt_string_list(map.get("amenities")),
        neighborhood: opt_str(map, &["neighborhood"]),
        booking_url: opt_str(map, &["bookingUrl"]),
    })
}

// ─── Transport ──────────────────────────────────────────────────────────────

fn coerce_transport_section(root: &Map<String, Value>) -> TransportSection {
    let src = as_map(root.get("transport"));
    TransportSection {
        local_passes: as_list(src.get("localPasses"))
            .iter()
            .filter_map(coerce_pass)
            .collect(),
        intercity: as_list(src.get("intercity"))
            .iter()
            .filter_map(coerce_leg)
            .collect(),
    }
}

fn coerce_pass(value: &Value) -> Option<TransportPass> {
    let map = value.as_object()?;
    if map.is_empty() {
        return None;
    }
    Some(TransportPass {
        name: str_or_empty(map, &["name"]),
        price: map.get("price").and_then(normalize_amount),
        currency: opt_str(map, &["currency"]),
        coverage_notes: opt_str(map, &["coverageNotes"]),
        url: opt_str(map, &["url"]),
    })
}

fn coerce_leg(value: &Value) -> Option<IntercityLeg> {
    let map = value.as_object()?;
    if map.is_empty() {
        return None;
    }
    let mode = match first_str(map, &["mode"]).as_deref() {
        Some("train") => TransitMode::Train,
        _ => TransitMode::Bus,
    };
    Some(IntercityLeg {
        mode,
        operator: opt_str(map, &["operator", "company"]),
        depart_iso: opt_str(map, &["departISO", "departureTime", "departure_time"]),
        arrive_iso: opt_str(map, &["arriveISO", "arrivalTime", "arrival_time"]),
        duration_minutes: coerce_i64(map.get("durationMinutes"))
            .or_else(|| coerce_i64(map.get("duration")))
            .or_else(|| coerce_i64(map.get("duration_minutes"))),
        price: map.get("price").and_then(normalize_amount),
        currency: opt_str(map, &["currency"]),
        booking_url: opt_str(map, &["bookingUrl", "booking_url"]),
    })
}

// ─── Weather ────────────────────────────────────────────────────────────────

fn coerce_weather(root: &Map<String, Value>, fallback_date: &str) -> Vec<DailyWeather> {
    as_list(root.get("weather"))
        .iter()
        .filter_map(|v| v.as_object())
        .map(|map| {
            let date = first_str(map, &["dateISO", "date"])
                .unwrap_or_else(|| fallback_date.to_string());
            DailyWeather {
                date_iso: date,
                high_c: map
                    .get("highC")
                    .and_then(normalize_amount)
                    .or_else(|| map.get("high").and_then(normalize_amount)),
                low_c: map
                    .get("lowC")
                    .and_then(normalize_amount)
                    .or_else(|| map.get("low").and_then(normalize_amount)),
                precipitation_chance: map
                    .get("precipitationChance")
                    .and_then(normalize_amount)
                    .or_else(|| map.get("precipChance").and_then(normalize_amount)),
                source: first_str(map, &["source"]).unwrap_or_else(|| "LLM".into()),
                is_forecast: map
                    .get("isForecast")
                    .and_then(Value::as_bool)
                    .unwrap_or(true),
            }
        })
        .collect()
}

// ─── Days ───────────────────────────────────────────────────────────────────

fn coerce_day(value: &Value) -> DayPlan {
    let map = as_map(Some(value));
    let blocks_src = map
        .get("blocks")
        .or_else(|| map.get("timeline"))
        .or_else(|| map.get("blocksList"));
    DayPlan {
        date_iso: str_or_empty(&map, &["dateISO", "date"]),
        blocks: as_list(blocks_src).iter().map(coerce_block).collect(),
        daily_tips: opt_string_list(map.get("dailyTips")),
    }
}

fn coerce_block(value: &Value) -> DayBlock {
    let Some(map) = value.as_object() else {
        return DayBlock {
            label: BlockLabel::Transit,
            items: Vec::new(),
            notes: None,
        };
    };
    let label_raw = map.get("label").or_else(|| map.get("time"));
    DayBlock {
        label: coerce_label(label_raw),
        items: as_list(map.get("items")),
        notes: opt_str(map, &["notes"]),
    }
}

/// Time-of-day labels arrive as the canonical set, Turkish synonyms, or
/// clock times; anything else falls into the `morning` bucket.
fn coerce_label(value: Option<&Value>) -> BlockLabel {
    let Some(s) = value.and_then(Value::as_str) else {
        return BlockLabel::Morning;
    };
    let lower = s.trim().to_lowercase();

    match lower.as_str() {
        "morning" | "sabah" => return BlockLabel::Morning,
        "afternoon" | "öğleden sonra" | "öğle" => return BlockLabel::Afternoon,
        "evening" | "akşam" => return BlockLabel::Evening,
        "late-night" | "gece" => return BlockLabel::LateNight,
        "transit" | "ulaşım" | "varış" | "dönüş" => return BlockLabel::Transit,
        "check-in" => return BlockLabel::CheckIn,
        "check-out" => return BlockLabel::CheckOut,
        _ => {}
    }

    // Clock time "HH:MM" bucketed by hour.
    if lower.len() <= 5 && lower.contains(':') {
        if let Some(hour) = lower
            .split(':')
            .next()
            .and_then(|h| h.parse::<u32>().ok())
        {
            return match hour {
                0..=5 => BlockLabel::LateNight,
                6..=11 => BlockLabel::Morning,
                12..=17 => BlockLabel::Afternoon,
                _ => BlockLabel::Evening,
            };
        }
    }

    BlockLabel::Morning
}

// ─── Pricing ────────────────────────────────────────────────────────────────

fn coerce_pricing(root: &Map<String, Value>) -> Pricing {
    let src = as_map(root.get("pricing"));

    let breakdown = match src.get("breakdown").and_then(Value::as_object) {
        Some(b) => PricingBreakdown {
            flights: extract_amount(b.get("flights")),
            lodging: extract_amount(b.get("lodging")),
            activities: extract_amount(b.get("activities")),
            transport: extract_amount(b.get("transport")),
            fees_and_taxes: extract_amount(b.get("feesAndTaxes")),
        },
        None => PricingBreakdown {
            flights: extract_amount(src.get("flights").or_else(|| src.get("flights_try"))),
            lodging: extract_amount(src.get("lodging").or_else(|| src.get("lodging_try"))),
            activities: extract_amount(
                src.get("activities").or_else(|| src.get("activities_try")),
            ),
            transport: extract_amount(
                src.get("transport").or_else(|| src.get("transport_try")),
            ),
            fees_and_taxes: extract_amount(
                src.get("feesAndTaxes").or_else(|| src.get("fees_try")),
            ),
        },
    };

    let currency = first_str(&src, &["currency"])
        .or_else(|| first_str(root, &["currency"]))
        .unwrap_or_else(|| "USD".into());

    let total_estimated = extract_amount(src.get("totalEstimated").or_else(|| src.get("total")));

    let confidence = match first_str(&src, &["confidence"]).as_deref() {
        Some("medium") => Confidence::Medium,
        Some("high") => Confidence::High,
        _ => Confidence::Low,
    };

    let notes = string_list(src.get("notes"));

    Pricing {
        currency,
        breakdown,
        total_estimated,
        confidence,
        notes: if notes.is_empty() { None } else { Some(notes) },
    }
}

// ─── Metadata ───────────────────────────────────────────────────────────────

fn coerce_metadata(root: &Map<String, Value>, now_iso: &str) -> Metadata {
    let src = as_map(root.get("metadata"));

    let sources: Vec<SourceRef> = as_list(src.get("sources"))
        .iter()
        .filter_map(|v| match v {
            // Bare provider names become full refs.
            Value::String(s) => Some(SourceRef {
                provider: s.clone(),
                id: None,
                url: None,
            }),
            Value::Object(map) => Some(SourceRef {
                provider: str_or_empty(map, &["provider"]),
                id: opt_str(map, &["id"]),
                url: opt_str(map, &["url"]),
            }),
            _ => None,
        })
        .collect();

    let tool_diagnostics: Vec<ToolDiag> = as_list(src.get("toolDiagnostics"))
        .iter()
        .filter_map(|v| v.as_object())
        .map(|map| ToolDiag {
            tool: str_or_empty(map, &["tool"]),
            ok: map.get("ok").and_then(Value::as_bool).unwrap_or(false),
            ms: coerce_i64(map.get("ms")).and_then(|n| u64::try_from(n).ok()),
            error: opt_str(map, &["error"]),
        })
        .collect();

    Metadata {
        generated_at_iso: first_str(&src, &["generatedAtISO"])
            .unwrap_or_else(|| now_iso.to_string()),
        sources,
        tool_diagnostics,
        warnings: string_list(src.get("warnings")),
        revision_of: opt_str(&src, &["revisionOf"]),
        plan_id: first_str(&src, &["planId"])
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
