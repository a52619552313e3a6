//! StokerCloud payload types and parsing.

use std::fmt;

use serde_json::Value;

use crate::error::StokerError;

/// `frontdata` item id carrying the hopper content.
const FRONTDATA_HOPPER_ID: &str = "hoppercontent";

/// `hopperdata` item id and unit used when `frontdata` has no hopper item.
const HOPPERDATA_CONTENT_ID: &str = "3";
const HOPPERDATA_KG_UNIT: &str = "LNG_KG";

/// Keys a controller data body carries when the token was not accepted.
const TOKEN_REJECTION_KEYS: [&str; 3] = ["notloggedin", "error", "errorcode"];

/// Login response keys that may hold the token.
const TOKEN_KEYS: [&str; 3] = ["token", "Token", "TOKEN"];

/// Where in the payload a reading was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopperSource {
    /// `frontdata` item `hoppercontent`.
    FrontData,
    /// `hopperdata` item `3` in `LNG_KG`.
    HopperData,
}

impl fmt::Display for HopperSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrontData => write!(f, "frontdata.hoppercontent"),
            Self::HopperData => write!(f, "hopperdata id=3"),
        }
    }
}

/// One hopper level reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HopperReading {
    /// Pellets in the hopper, kilograms.
    pub kg: f64,
    /// Payload location the value came from.
    pub source: HopperSource,
}

/// Pull the token out of a login response body.
pub fn extract_token(body: &Value) -> Option<String> {
    TOKEN_KEYS
        .iter()
        .filter_map(|key| body.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

/// Whether a controller data body signals a rejected token.
pub fn is_token_rejection(body: &Value) -> bool {
    let Some(object) = body.as_object() else {
        return false;
    };

    if object.contains_key("frontdata") || object.contains_key("hopperdata") {
        return false;
    }

    TOKEN_REJECTION_KEYS.iter().any(|key| match object.get(*key) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    })
}

/// Find the hopper content in a controller data body.
///
/// Looks at `frontdata` first and falls back to `hopperdata`.
pub fn extract_hopper_reading(body: &Value) -> Result<HopperReading, StokerError> {
    if let Some(item) = find_item(body, "frontdata", |item| {
        id_of(item).as_deref() == Some(FRONTDATA_HOPPER_ID)
    }) {
        return reading_from(item, HopperSource::FrontData);
    }

    if let Some(item) = find_item(body, "hopperdata", |item| {
        id_of(item).as_deref() == Some(HOPPERDATA_CONTENT_ID)
            && item.get("unit").and_then(Value::as_str) == Some(HOPPERDATA_KG_UNIT)
    }) {
        return reading_from(item, HopperSource::HopperData);
    }

    Err(StokerError::ParseError(format!(
        "no hopper value in frontdata/hopperdata (frontdata={}, hopperdata={})",
        summarize(body.get("frontdata")),
        summarize(body.get("hopperdata")),
    )))
}

/// Parse a payload number, accepting a decimal comma.
pub fn parse_kg(value: &Value) -> Result<f64, StokerError> {
    let kg = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    };

    match kg {
        Some(kg) if kg.is_finite() => Ok(kg),
        _ => Err(StokerError::ParseError(format!(
            "hopper value {} is not a number",
            value
        ))),
    }
}

fn find_item<'a>(
    body: &'a Value,
    section: &str,
    matches: impl Fn(&Value) -> bool,
) -> Option<&'a Value> {
    body.get(section)?.as_array()?.iter().find(|item| matches(*item))
}

fn id_of(item: &Value) -> Option<String> {
    match item.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn reading_from(item: &Value, source: HopperSource) -> Result<HopperReading, StokerError> {
    let raw = item.get("value").unwrap_or(&Value::Null);
    let kg = parse_kg(raw)?;
    Ok(HopperReading { kg, source })
}

fn summarize(section: Option<&Value>) -> String {
    match section {
        None => "missing".to_string(),
        Some(Value::Array(items)) => format!("{} items", items.len()),
        Some(other) => format!("unexpected {}", kind_of(other)),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
