use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form attribute map used for requirement definitions and applicant sub-profiles.
pub type OpenMap = BTreeMap<String, Value>;

/// Identifier for applicant profiles (`P001`, `P002`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub String);

impl ProfileId {
    /// Render the identifier for a numeric sequence value.
    pub fn from_sequence(sequence: u32) -> Self {
        Self(format!("P{sequence:03}"))
    }

    /// Numeric suffix of a well-formed identifier.
    pub fn sequence(&self) -> Option<u32> {
        self.0.strip_prefix('P')?.parse().ok()
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for petition definitions.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PetitionId(pub u32);

impl fmt::Display for PetitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Applicant record evaluated against petitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub profile_id: ProfileId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub citizenship: String,
    #[serde(default)]
    pub current_country: String,
    #[serde(default)]
    pub target_countries: Vec<String>,
    #[serde(default)]
    pub target_profile_type: String,
    #[serde(default)]
    pub education: Education,
    #[serde(default)]
    pub employment: Employment,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub legal_status: OpenMap,
    #[serde(default)]
    pub achievements: OpenMap,
    #[serde(default)]
    pub language_tests: OpenMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_profile: Option<OpenMap>,
    #[serde(default)]
    pub signals: Vec<String>,
    /// Country-specific sub-profiles (e.g. `canada_profile`) and any other extra attributes.
    #[serde(flatten)]
    pub extra: OpenMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Education {
    #[serde(default)]
    pub highest_level: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Employment {
    #[serde(default)]
    pub current_role: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub years_of_experience: f32,
    #[serde(default)]
    pub employer_sponsorship_available: bool,
    #[serde(default)]
    pub job_requires_specialization: bool,
}

/// Immigration pathway definition with its eligibility rules and point weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Petition {
    #[serde(default)]
    pub petition_id: PetitionId,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub visa_type: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub target_profile_type: String,
    #[serde(default)]
    pub hard_requirements: OpenMap,
    #[serde(default)]
    pub soft_requirements: OpenMap,
    #[serde(default)]
    pub legal_requirements: OpenMap,
    #[serde(default)]
    pub disqualifiers: Vec<String>,
    #[serde(default)]
    pub profile_signals: Vec<String>,
    #[serde(default)]
    pub edge_case_handling: OpenMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoring_weights: Option<ScoringWeights>,
    #[serde(default)]
    pub tie_breaker_priority: i32,
    #[serde(default)]
    pub confidence_level: String,
    #[serde(flatten)]
    pub extra: OpenMap,
}

impl Petition {
    pub fn summary(&self) -> PetitionSummary {
        PetitionSummary {
            country: self.country.clone(),
            visa_type: self.visa_type.clone(),
            category: self.category.clone(),
        }
    }
}

/// Point allocation per requirement category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    #[serde(default)]
    pub hard_requirements: BTreeMap<String, f64>,
    #[serde(default)]
    pub soft_requirements: BTreeMap<String, f64>,
    #[serde(default)]
    pub legal_requirements: BTreeMap<String, f64>,
    #[serde(default)]
    pub bonus_points: BTreeMap<String, f64>,
    #[serde(default)]
    pub total_points: f64,
}

impl ScoringWeights {
    /// Maximum attainable points for a category such as `soft_requirements`.
    pub fn category_max(&self, category: &str) -> Option<f64> {
        let weights = match category {
            "hard_requirements" => &self.hard_requirements,
            "soft_requirements" => &self.soft_requirements,
            "legal_requirements" => &self.legal_requirements,
            "bonus_points" => &self.bonus_points,
            _ => return None,
        };
        Some(weights.values().sum())
    }
}

/// Compact petition descriptor carried on every result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetitionSummary {
    pub country: String,
    pub visa_type: String,
    pub category: String,
}
