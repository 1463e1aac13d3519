//! Parsing of raw reasoning-service output into the loosely typed response model.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::warn;

const FENCE: &str = "```";

/// Raised when the reasoning output cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedResponse {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("Invalid response format: missing matching_results")]
    MissingMatchingResults,
    #[error("Invalid response format: matching result is not an object")]
    InvalidMatchingResult,
}

/// Validated response: at least one matching result is guaranteed.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    primary: MatchingResult,
    additional: usize,
}

impl ParsedResponse {
    /// The first matching result; single-profile evaluations only consume this one.
    pub fn primary(&self) -> &MatchingResult {
        &self.primary
    }

    pub fn into_primary(self) -> MatchingResult {
        self.primary
    }

    /// Number of matching results beyond the first (ignored by the pipeline).
    pub fn additional_results(&self) -> usize {
        self.additional
    }
}

/// One profile's evaluation as returned by the reasoning service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchingResult {
    pub profile_id: Option<String>,
    pub matched_petitions: Vec<MatchedEntry>,
    pub rejected_petitions: Vec<RejectedEntry>,
}

/// Wire shape shared by the score-only, match-strength and points-based variants.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MatchedEntry {
    #[serde(default, deserialize_with = "lenient_u32")]
    pub petition_id: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub visa_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub match_strength: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub confidence_level: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub match_percentage: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub points_earned: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_points: Option<f64>,
    #[serde(default, deserialize_with = "lenient_object")]
    pub points_breakdown: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub reasoning: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub disqualifiers: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub recommendations: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub tie_breaker_rank: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RejectedEntry {
    #[serde(default, deserialize_with = "lenient_u32")]
    pub petition_id: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub visa_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub failed_requirements: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub confidence_level: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub match_percentage: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub points_earned: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_points: Option<f64>,
    #[serde(default, deserialize_with = "lenient_object")]
    pub points_breakdown: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub reasoning: Option<Vec<String>>,
}

/// Parse raw reasoning output, tolerating a single wrapping code fence.
pub fn parse_response(raw: &str) -> Result<ParsedResponse, MalformedResponse> {
    let content = strip_fence(raw);
    let document: Value = serde_json::from_str(content)
        .map_err(|err| MalformedResponse::InvalidJson(err.to_string()))?;

    let mut results = match document {
        Value::Object(mut object) => match object.remove("matching_results") {
            Some(Value::Array(results)) if !results.is_empty() => results,
            _ => return Err(MalformedResponse::MissingMatchingResults),
        },
        _ => return Err(MalformedResponse::MissingMatchingResults),
    };

    let additional = results.len() - 1;
    let first = results.swap_remove(0);
    let primary = match first {
        Value::Object(object) => read_matching_result(object),
        _ => return Err(MalformedResponse::InvalidMatchingResult),
    };

    Ok(ParsedResponse {
        primary,
        additional,
    })
}

/// Remove a wrapping fence: when the trimmed text opens with one, the first and last lines go.
fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.starts_with(FENCE) {
        return trimmed;
    }

    let body = match trimmed.find('\n') {
        Some(index) => &trimmed[index + 1..],
        None => return "",
    };
    match body.rfind('\n') {
        Some(index) => body[..index].trim(),
        None => "",
    }
}

fn read_matching_result(mut object: Map<String, Value>) -> MatchingResult {
    let profile_id = match object.remove("profile_id") {
        Some(Value::String(id)) => Some(id),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    };

    MatchingResult {
        profile_id,
        matched_petitions: read_entries(object.remove("matched_petitions"), "matched"),
        rejected_petitions: read_entries(object.remove("rejected_petitions"), "rejected"),
    }
}

fn read_entries<T>(value: Option<Value>, kind: &'static str) -> Vec<T>
where
    T: for<'de> Deserialize<'de>,
{
    let entries = match value {
        Some(Value::Array(entries)) => entries,
        Some(Value::Null) | None => return Vec::new(),
        Some(_) => {
            warn!(kind, "petition list is not an array; ignoring it");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                warn!(kind, index, error = %err, "skipping unreadable petition entry");
                None
            }
        })
        .collect()
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_from_value))
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(number_from_value)
        .filter(|number| number.fract() == 0.0)
        .map(|number| number as i64))
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(number_from_value)
        .filter(|number| number.fract() == 0.0 && *number >= 0.0 && *number <= u32::MAX as f64)
        .map(|number| number as u32))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => Some(text),
        _ => None,
    })
}

/// A bare string reads as a one-element list; non-string items are dropped.
fn lenient_strings<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => Some(vec![text]),
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(text) => Some(text),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    })
}

fn lenient_object<'de, D>(deserializer: D) -> Result<Option<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Object(object)) => Some(object),
        _ => None,
    })
}

/// Accepts JSON numbers, numeric strings, and percentages such as `"82.5%"`.
pub(crate) fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let text = text.trim();
            let text = text.strip_suffix('%').unwrap_or(text).trim_end();
            text.parse::<f64>().ok().filter(|number| number.is_finite())
        }
        _ => None,
    }
}
