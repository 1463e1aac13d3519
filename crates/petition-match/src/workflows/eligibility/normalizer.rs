//! Conversion of any supported response shape into canonical eligibility results.
//!
//! Score derivation follows one fixed priority for every shape: an explicit match
//! percentage, then the points ratio, then the match-strength table.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::debug;

use super::domain::{Petition, PetitionId, PetitionSummary};
use super::parser::{number_from_value, MatchedEntry, MatchingResult, RejectedEntry};
use super::result::{
    BreakdownEntry, ConfidenceLevel, EligibilityResult, MatchStrength, PointsBreakdown,
};

const PASSING_SCORE: u8 = 50;

/// Normalize the first matching result against the petitions that were requested.
///
/// Matched entries are emitted before rejected ones, each in response order. References
/// to petitions outside `petitions` and repeated petition ids are dropped.
pub fn normalize(result: &MatchingResult, petitions: &[Petition]) -> Vec<EligibilityResult> {
    let lookup: HashMap<PetitionId, &Petition> = petitions
        .iter()
        .map(|petition| (petition.petition_id, petition))
        .collect();
    let mut emitted: HashSet<PetitionId> = HashSet::new();
    let mut results = Vec::with_capacity(
        result.matched_petitions.len() + result.rejected_petitions.len(),
    );

    for entry in &result.matched_petitions {
        if let Some(petition) = claim(&lookup, &mut emitted, entry.petition_id) {
            results.push(from_matched(entry, petition));
        }
    }

    for entry in &result.rejected_petitions {
        if let Some(petition) = claim(&lookup, &mut emitted, entry.petition_id) {
            results.push(from_rejected(entry, petition));
        }
    }

    results
}

fn claim<'a>(
    lookup: &HashMap<PetitionId, &'a Petition>,
    emitted: &mut HashSet<PetitionId>,
    raw_id: Option<u32>,
) -> Option<&'a Petition> {
    let Some(id) = raw_id.map(PetitionId) else {
        debug!("dropping response entry without a petition id");
        return None;
    };
    let Some(petition) = lookup.get(&id).copied() else {
        debug!(petition_id = %id, "dropping reference to a petition outside the request");
        return None;
    };
    if !emitted.insert(id) {
        debug!(petition_id = %id, "dropping repeated petition entry");
        return None;
    }
    Some(petition)
}

fn from_matched(entry: &MatchedEntry, petition: &Petition) -> EligibilityResult {
    let strength = entry
        .match_strength
        .as_deref()
        .and_then(MatchStrength::from_label);

    let (score, eligible) = match numeric_score(
        entry.match_percentage,
        entry.points_earned,
        entry.total_points,
    ) {
        Some(score) => (
            score,
            strength != Some(MatchStrength::Rejected) && score >= PASSING_SCORE,
        ),
        None => strength_score(strength),
    };

    let reasoning = entry.reasoning.clone().unwrap_or_default();
    let breakdown = match non_empty(entry.points_breakdown.as_ref()) {
        Some(points) => points_breakdown(points, petition),
        None => reasoning_breakdown(entry.reasoning.as_deref()),
    };

    EligibilityResult {
        petition_id: petition.petition_id,
        petition: PetitionSummary {
            country: prefer(&entry.country, &petition.country),
            visa_type: prefer(&entry.visa_type, &petition.visa_type),
            category: petition.category.clone(),
        },
        score,
        eligible,
        match_strength: strength,
        confidence_level: entry
            .confidence_level
            .as_deref()
            .and_then(ConfidenceLevel::from_label),
        overall_reason: Some(reasoning.join(" ")),
        reasoning: Some(reasoning),
        breakdown: Some(breakdown),
        disqualifiers: Some(entry.disqualifiers.clone().unwrap_or_default()),
        recommendations: Some(entry.recommendations.clone().unwrap_or_default()),
        points_earned: entry.points_earned,
        total_points: entry.total_points,
        match_percentage: entry.match_percentage,
        points_breakdown: entry.points_breakdown.as_ref().map(preserve_points),
        tie_breaker_rank: entry.tie_breaker_rank,
        error: None,
    }
}

fn from_rejected(entry: &RejectedEntry, petition: &Petition) -> EligibilityResult {
    let score = numeric_score(
        entry.match_percentage,
        entry.points_earned,
        entry.total_points,
    )
    .unwrap_or(0);

    let reason = entry.reason.clone();
    let reasoning = entry
        .reasoning
        .clone()
        .or_else(|| reason.clone().map(|reason| vec![reason]))
        .unwrap_or_default();
    let disqualifiers = entry
        .failed_requirements
        .clone()
        .filter(|failed| !failed.is_empty())
        .or_else(|| reason.map(|reason| vec![reason]))
        .unwrap_or_default();
    let breakdown = non_empty(entry.points_breakdown.as_ref())
        .map(|points| points_breakdown(points, petition))
        .unwrap_or_default();

    EligibilityResult {
        petition_id: petition.petition_id,
        petition: PetitionSummary {
            country: petition.country.clone(),
            visa_type: prefer(&entry.visa_type, &petition.visa_type),
            category: petition.category.clone(),
        },
        score,
        eligible: false,
        match_strength: Some(MatchStrength::Rejected),
        confidence_level: Some(
            entry
                .confidence_level
                .as_deref()
                .and_then(ConfidenceLevel::from_label)
                .unwrap_or(ConfidenceLevel::High),
        ),
        overall_reason: Some(reasoning.join(" ")),
        reasoning: Some(reasoning),
        breakdown: Some(breakdown),
        disqualifiers: Some(disqualifiers),
        recommendations: Some(Vec::new()),
        points_earned: entry.points_earned,
        total_points: entry.total_points,
        match_percentage: entry.match_percentage,
        points_breakdown: entry.points_breakdown.as_ref().map(preserve_points),
        tie_breaker_rank: None,
        error: None,
    }
}

/// Score from the numeric fields: percentage first, then the points ratio.
pub(crate) fn numeric_score(
    match_percentage: Option<f64>,
    points_earned: Option<f64>,
    total_points: Option<f64>,
) -> Option<u8> {
    if let Some(percentage) = match_percentage {
        return Some(clamp_score(percentage));
    }
    match (points_earned, total_points) {
        (Some(earned), Some(total)) if total > 0.0 => Some(clamp_score(earned / total * 100.0)),
        _ => None,
    }
}

/// Fixed mapping for responses that only classify the match.
pub(crate) fn strength_score(strength: Option<MatchStrength>) -> (u8, bool) {
    match strength {
        Some(MatchStrength::VeryStrong) => (90, true),
        Some(MatchStrength::Strong) => (75, true),
        Some(MatchStrength::Weak) => (45, true),
        Some(MatchStrength::Rejected) => (0, false),
        None => (50, true),
    }
}

fn clamp_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

fn prefer(reported: &Option<String>, stored: &str) -> String {
    match reported {
        Some(value) if !value.is_empty() => value.clone(),
        _ => stored.to_string(),
    }
}

fn non_empty(points: Option<&Map<String, Value>>) -> Option<&Map<String, Value>> {
    points.filter(|points| !points.is_empty())
}

fn preserve_points(points: &Map<String, Value>) -> PointsBreakdown {
    points
        .iter()
        .map(|(category, value)| (category.clone(), value.clone()))
        .collect()
}

fn points_breakdown(
    points: &Map<String, Value>,
    petition: &Petition,
) -> BTreeMap<String, BreakdownEntry> {
    points
        .iter()
        .filter_map(|(category, value)| {
            let reported = CategoryPoints::read(value)?;
            Some((category.clone(), reported.into_entry(category, petition)))
        })
        .collect()
}

/// One category of a points breakdown, read best-effort.
///
/// Accepts a bare number, a flat `{requirement: points}` map, or an object carrying the
/// itemized map under `points` next to `max_score`, `matched_items`, `missing_items` and
/// `match_details`.
struct CategoryPoints {
    items: BTreeMap<String, f64>,
    earned: f64,
    max_score: Option<f64>,
    match_details: Option<String>,
    matched_items: Option<Vec<String>>,
    missing_items: Option<Vec<String>>,
}

const META_KEYS: [&str; 5] = [
    "score",
    "max_score",
    "match_details",
    "matched_items",
    "missing_items",
];

impl CategoryPoints {
    fn read(value: &Value) -> Option<Self> {
        match value {
            Value::Object(object) => Some(Self::from_object(object)),
            other => number_from_value(other).map(|earned| Self {
                items: BTreeMap::new(),
                earned,
                max_score: None,
                match_details: None,
                matched_items: None,
                missing_items: None,
            }),
        }
    }

    fn from_object(object: &Map<String, Value>) -> Self {
        let items: BTreeMap<String, f64> = match object.get("points") {
            Some(Value::Object(points)) => numeric_items(points.iter()),
            _ => numeric_items(
                object
                    .iter()
                    .filter(|(key, _)| !META_KEYS.contains(&key.as_str())),
            ),
        };
        let earned = if items.is_empty() {
            object
                .get("score")
                .and_then(number_from_value)
                .unwrap_or(0.0)
        } else {
            items.values().sum()
        };

        Self {
            items,
            earned,
            max_score: object.get("max_score").and_then(number_from_value),
            match_details: object
                .get("match_details")
                .and_then(Value::as_str)
                .map(str::to_string),
            matched_items: string_list(object.get("matched_items")),
            missing_items: string_list(object.get("missing_items")),
        }
    }

    fn into_entry(self, category: &str, petition: &Petition) -> BreakdownEntry {
        let max_score = petition
            .scoring_weights
            .as_ref()
            .and_then(|weights| weights.category_max(category))
            .filter(|max| *max > 0.0)
            .or(self.max_score)
            .unwrap_or(self.earned);
        let match_details = self.match_details.unwrap_or_else(|| {
            format!(
                "{} of {} points",
                format_points(self.earned),
                format_points(max_score)
            )
        });

        BreakdownEntry {
            score: self.earned,
            max_score,
            match_details,
            matched_items: self.matched_items,
            missing_items: self.missing_items,
            points: (!self.items.is_empty()).then_some(self.items),
        }
    }
}

fn numeric_items<'a>(
    entries: impl Iterator<Item = (&'a String, &'a Value)>,
) -> BTreeMap<String, f64> {
    entries
        .filter_map(|(name, value)| number_from_value(value).map(|points| (name.clone(), points)))
        .collect()
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let Value::Array(items) = value? else {
        return None;
    };
    Some(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
    )
}

fn format_points(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

/// Breakdown for responses without a points structure.
fn reasoning_breakdown(reasoning: Option<&[String]>) -> BTreeMap<String, BreakdownEntry> {
    let Some(reasoning) = reasoning else {
        return BTreeMap::new();
    };

    BTreeMap::from([
        (
            "normalization".to_string(),
            BreakdownEntry {
                score: 0.0,
                max_score: 0.0,
                match_details: reasoning.join(" "),
                matched_items: None,
                missing_items: None,
                points: None,
            },
        ),
        (
            "evaluation".to_string(),
            BreakdownEntry {
                score: 0.0,
                max_score: 0.0,
                match_details: "See reasoning above".to_string(),
                matched_items: None,
                missing_items: None,
                points: None,
            },
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::eligibility::domain::ScoringWeights;
    use crate::workflows::eligibility::parser::parse_response;
    use serde_json::json;

    fn petition(id: u32) -> Petition {
        Petition {
            petition_id: PetitionId(id),
            country: "Canada".to_string(),
            visa_type: format!("Visa {id}"),
            category: "Skilled Worker".to_string(),
            ..Petition::default()
        }
    }

    fn matching(body: serde_json::Value) -> MatchingResult {
        let raw = json!({ "matching_results": [body] }).to_string();
        parse_response(&raw).expect("response parses").into_primary()
    }

    #[test]
    fn explicit_percentage_wins_over_strength() {
        let result = matching(json!({
            "matched_petitions": [
                { "petition_id": 1, "match_percentage": 92, "match_strength": "Weak" }
            ]
        }));
        let normalized = normalize(&result, &[petition(1)]);

        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].score, 92);
        assert!(normalized[0].eligible);
        assert_eq!(normalized[0].match_strength, Some(MatchStrength::Weak));
    }

    #[test]
    fn strength_table_applies_without_numbers() {
        let result = matching(json!({
            "matched_petitions": [
                { "petition_id": 1, "match_strength": "Weak", "reasoning": ["close call"] },
                { "petition_id": 2, "match_strength": "Very Strong" },
                { "petition_id": 3, "match_strength": "Rejected" },
                { "petition_id": 4, "match_strength": "Decent" }
            ]
        }));
        let petitions = [petition(1), petition(2), petition(3), petition(4)];
        let scored: Vec<(u8, bool)> = normalize(&result, &petitions)
            .iter()
            .map(|entry| (entry.score, entry.eligible))
            .collect();

        assert_eq!(scored, vec![(45, true), (90, true), (0, false), (50, true)]);
    }

    #[test]
    fn points_ratio_is_used_when_percentage_is_missing() {
        let result = matching(json!({
            "matched_petitions": [
                { "petition_id": 1, "points_earned": 33, "total_points": 60, "match_strength": "Strong" },
                { "petition_id": 2, "points_earned": 10, "total_points": 0, "match_strength": "Strong" }
            ]
        }));
        let normalized = normalize(&result, &[petition(1), petition(2)]);

        assert_eq!(normalized[0].score, 55);
        assert!(normalized[0].eligible);
        assert_eq!(normalized[1].score, 75);
    }

    #[test]
    fn low_numeric_score_is_not_eligible() {
        let result = matching(json!({
            "matched_petitions": [
                { "petition_id": 1, "match_percentage": 140 },
                { "petition_id": 2, "match_percentage": 49.4 }
            ]
        }));
        let normalized = normalize(&result, &[petition(1), petition(2)]);

        assert_eq!((normalized[0].score, normalized[0].eligible), (100, true));
        assert_eq!((normalized[1].score, normalized[1].eligible), (49, false));
    }

    #[test]
    fn rejected_entries_keep_partial_points() {
        let result = matching(json!({
            "rejected_petitions": [
                {
                    "petition_id": 1,
                    "reason": "Country not targeted",
                    "points_earned": 35,
                    "total_points": 100
                },
                { "petition_id": 2, "reason": "Missing degree", "failed_requirements": [] }
            ]
        }));
        let normalized = normalize(&result, &[petition(1), petition(2)]);

        let first = &normalized[0];
        assert_eq!(first.score, 35);
        assert!(!first.eligible);
        assert_eq!(first.match_strength, Some(MatchStrength::Rejected));
        assert_eq!(first.confidence_level, Some(ConfidenceLevel::High));
        assert_eq!(
            first.reasoning.as_deref(),
            Some(&["Country not targeted".to_string()][..])
        );
        assert_eq!(first.breakdown, Some(BTreeMap::new()));
        assert_eq!(first.tie_breaker_rank, None);

        let second = &normalized[1];
        assert_eq!(second.score, 0);
        assert_eq!(
            second.disqualifiers.as_deref(),
            Some(&["Missing degree".to_string()][..])
        );
    }

    #[test]
    fn drops_unknown_and_repeated_petitions() {
        let result = matching(json!({
            "matched_petitions": [
                { "petition_id": 1, "match_strength": "Strong" },
                { "petition_id": 99, "match_strength": "Strong" },
                { "petition_id": 1, "match_strength": "Weak" },
                { "visa_type": "No id" }
            ],
            "rejected_petitions": [
                { "petition_id": 1, "reason": "duplicate" },
                { "petition_id": 2, "reason": "Country not targeted" }
            ]
        }));
        let normalized = normalize(&result, &[petition(1), petition(2)]);

        let ids: Vec<u32> = normalized.iter().map(|entry| entry.petition_id.0).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(normalized[0].match_strength, Some(MatchStrength::Strong));
        assert!(!normalized[1].eligible);
    }

    #[test]
    fn normalization_is_idempotent() {
        let result = matching(json!({
            "matched_petitions": [
                { "petition_id": 2, "match_percentage": 81, "reasoning": ["a", "b"] }
            ],
            "rejected_petitions": [{ "petition_id": 1, "reason": "no" }]
        }));
        let petitions = [petition(1), petition(2)];

        assert_eq!(normalize(&result, &petitions), normalize(&result, &petitions));
    }

    #[test]
    fn string_reasoning_keeps_the_petition() {
        let result = matching(json!({
            "matched_petitions": [
                { "petition_id": 1, "match_strength": "Strong", "reasoning": "Degree meets requirement" }
            ]
        }));
        let normalized = normalize(&result, &[petition(1)]);

        assert_eq!(normalized.len(), 1);
        assert_eq!((normalized[0].score, normalized[0].eligible), (75, true));
        assert_eq!(
            normalized[0].overall_reason.as_deref(),
            Some("Degree meets requirement")
        );
    }

    #[test]
    fn reasoning_breakdown_is_used_without_points() {
        let result = matching(json!({
            "matched_petitions": [
                { "petition_id": 1, "match_strength": "Strong", "reasoning": ["Degree ok.", "IELTS 8."] }
            ]
        }));
        let normalized = normalize(&result, &[petition(1)]);
        let breakdown = normalized[0].breakdown.as_ref().expect("breakdown");

        assert_eq!(breakdown["normalization"].match_details, "Degree ok. IELTS 8.");
        assert_eq!(breakdown["evaluation"].match_details, "See reasoning above");
        assert_eq!(
            normalized[0].overall_reason.as_deref(),
            Some("Degree ok. IELTS 8.")
        );
    }

    #[test]
    fn points_breakdown_uses_petition_weights() {
        let mut weighted = petition(1);
        weighted.scoring_weights = Some(ScoringWeights {
            soft_requirements: BTreeMap::from([
                ("language".to_string(), 20.0),
                ("age".to_string(), 10.0),
            ]),
            total_points: 100.0,
            ..ScoringWeights::default()
        });
        let result = matching(json!({
            "matched_petitions": [{
                "petition_id": 1,
                "match_percentage": 72,
                "points_breakdown": {
                    "soft_requirements": { "language": 20, "age": "5" },
                    "bonus_points": 4,
                    "notes": "unscored"
                }
            }]
        }));
        let normalized = normalize(&result, &[weighted]);
        let entry = &normalized[0];
        let breakdown = entry.breakdown.as_ref().expect("breakdown");

        let soft = &breakdown["soft_requirements"];
        assert_eq!(soft.score, 25.0);
        assert_eq!(soft.max_score, 30.0);
        assert_eq!(soft.match_details, "25 of 30 points");
        assert_eq!(
            soft.points.as_ref().map(|points| points["age"]),
            Some(5.0)
        );

        let bonus = &breakdown["bonus_points"];
        assert_eq!((bonus.score, bonus.max_score), (4.0, 4.0));
        assert!(!breakdown.contains_key("notes"));

        let preserved = entry.points_breakdown.as_ref().expect("raw points kept");
        assert_eq!(preserved["soft_requirements"]["age"], json!("5"));
        assert_eq!(preserved["notes"], json!("unscored"));
    }

    #[test]
    fn response_country_overrides_stored_summary() {
        let result = matching(json!({
            "matched_petitions": [
                { "petition_id": 1, "country": "Canada (Federal)", "visa_type": "" }
            ]
        }));
        let normalized = normalize(&result, &[petition(1)]);

        assert_eq!(normalized[0].petition.country, "Canada (Federal)");
        assert_eq!(normalized[0].petition.visa_type, "Visa 1");
        assert_eq!(normalized[0].petition.category, "Skilled Worker");
    }
}
