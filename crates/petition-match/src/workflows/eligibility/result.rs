use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::{Petition, PetitionId, PetitionSummary};

/// Points reported per requirement category, kept exactly as the reasoning service sent them.
pub type PointsBreakdown = BTreeMap<String, Value>;

/// Classification returned by the reasoning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStrength {
    #[serde(rename = "Very Strong")]
    VeryStrong,
    Strong,
    Weak,
    Rejected,
}

impl MatchStrength {
    /// Exact-label lookup; anything else is treated as unclassified.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Very Strong" => Some(Self::VeryStrong),
            "Strong" => Some(Self::Strong),
            "Weak" => Some(Self::Weak),
            "Rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            MatchStrength::VeryStrong => "Very Strong",
            MatchStrength::Strong => "Strong",
            MatchStrength::Weak => "Weak",
            MatchStrength::Rejected => "Rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Low" => Some(Self::Low),
            "Medium" => Some(Self::Medium),
            "High" => Some(Self::High),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "Low",
            ConfidenceLevel::Medium => "Medium",
            ConfidenceLevel::High => "High",
        }
    }
}

/// Per-category explanation of a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub score: f64,
    pub max_score: f64,
    pub match_details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_items: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_items: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<BTreeMap<String, f64>>,
}

/// Canonical outcome for one profile/petition pair.
///
/// Fallback records only carry the petition, `error`, `score = 0` and `eligible = false`;
/// every other optional field is left unset so it is absent from the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub petition_id: PetitionId,
    pub petition: PetitionSummary,
    pub score: u8,
    pub eligible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_strength: Option<MatchStrength>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_level: Option<ConfidenceLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Vec<String>>,
    #[serde(
        rename = "overallReason",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub overall_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<BTreeMap<String, BreakdownEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disqualifiers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_earned: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_points: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_breakdown: Option<PointsBreakdown>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tie_breaker_rank: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EligibilityResult {
    /// Placeholder emitted for every requested petition when the pipeline fails.
    pub fn failed(petition: &Petition, message: impl Into<String>) -> Self {
        Self {
            petition_id: petition.petition_id,
            petition: petition.summary(),
            score: 0,
            eligible: false,
            match_strength: None,
            confidence_level: None,
            reasoning: None,
            overall_reason: None,
            breakdown: None,
            disqualifiers: None,
            recommendations: None,
            points_earned: None,
            total_points: None,
            match_percentage: None,
            points_breakdown: None,
            tie_breaker_rank: None,
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Short human-readable verdict used by the CLI.
    pub fn verdict(&self) -> String {
        if let Some(error) = &self.error {
            return format!("error: {error}");
        }
        let strength = self
            .match_strength
            .map(MatchStrength::label)
            .unwrap_or("Unclassified");
        let mut detail = format!("{strength}, score {}", self.score);
        if let Some(confidence) = self.confidence_level {
            detail.push_str(&format!(", {} confidence", confidence.label()));
        }
        if self.eligible {
            format!("eligible ({detail})")
        } else {
            format!("not eligible ({detail})")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn petition() -> Petition {
        Petition {
            petition_id: PetitionId(4),
            country: "Canada".to_string(),
            visa_type: "Express Entry".to_string(),
            category: "Skilled Worker".to_string(),
            ..Petition::default()
        }
    }

    #[test]
    fn failed_result_serializes_only_error_fields() {
        let result = EligibilityResult::failed(&petition(), "service unavailable");
        let value = serde_json::to_value(&result).expect("result serializes");
        let object = value.as_object().expect("object");

        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["eligible", "error", "petition", "petition_id", "score"]
        );
        assert_eq!(value["score"], 0);
        assert_eq!(value["eligible"], false);
        assert_eq!(value["petition"]["visa_type"], "Express Entry");
    }

    #[test]
    fn verdict_mentions_confidence_when_known() {
        let mut result = EligibilityResult::failed(&petition(), "unused");
        result.error = None;
        result.score = 30;
        result.match_strength = Some(MatchStrength::Rejected);
        assert_eq!(result.verdict(), "not eligible (Rejected, score 30)");

        result.confidence_level = Some(ConfidenceLevel::High);
        assert_eq!(
            result.verdict(),
            "not eligible (Rejected, score 30, High confidence)"
        );
    }

    #[test]
    fn match_strength_uses_spaced_label() {
        let value = serde_json::to_value(MatchStrength::VeryStrong).expect("serializes");
        assert_eq!(value, "Very Strong");
        assert_eq!(
            MatchStrength::from_label("Very Strong"),
            Some(MatchStrength::VeryStrong)
        );
        assert_eq!(MatchStrength::from_label("very strong"), None);
    }
}
