use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use serde_json::{json, Map, Value};

use crate::workflows::eligibility::domain::{
    Education, Employment, Petition, PetitionId, Profile, ProfileId, ScoringWeights,
};
use crate::workflows::eligibility::reasoning::{ReasoningClient, ReasoningError};
use crate::workflows::eligibility::repository::{
    merge_record, next_petition_id, next_profile_id, PetitionRepository, ProfileRepository,
    RepositoryError,
};
use crate::workflows::eligibility::request::EvaluationRequest;
use crate::workflows::eligibility::{eligibility_router, EligibilityService};

pub(super) fn profile() -> Profile {
    Profile {
        profile_id: ProfileId("P001".to_string()),
        full_name: Some("Asha Raman".to_string()),
        citizenship: "India".to_string(),
        current_country: "India".to_string(),
        target_countries: vec!["Canada".to_string(), "Germany".to_string()],
        target_profile_type: "Skilled Worker".to_string(),
        education: Education {
            highest_level: "B.Tech".to_string(),
            fields: vec!["Computer Science".to_string()],
        },
        employment: Employment {
            current_role: "Software Engineer".to_string(),
            industry: "Technology".to_string(),
            years_of_experience: 5.0,
            employer_sponsorship_available: false,
            job_requires_specialization: true,
        },
        skills: vec!["Rust".to_string(), "Distributed Systems".to_string()],
        ..Profile::default()
    }
}

pub(super) fn petition(id: u32, country: &str, visa_type: &str) -> Petition {
    Petition {
        petition_id: PetitionId(id),
        country: country.to_string(),
        visa_type: visa_type.to_string(),
        category: "Skilled Worker".to_string(),
        target_profile_type: "Skilled Worker".to_string(),
        scoring_weights: Some(ScoringWeights {
            hard_requirements: BTreeMap::from([("degree".to_string(), 30.0)]),
            soft_requirements: BTreeMap::from([("language".to_string(), 20.0)]),
            total_points: 50.0,
            ..ScoringWeights::default()
        }),
        tie_breaker_priority: id as i32,
        confidence_level: "High".to_string(),
        ..Petition::default()
    }
}

pub(super) fn petitions() -> Vec<Petition> {
    vec![
        petition(1, "Canada", "Express Entry"),
        petition(2, "Germany", "EU Blue Card"),
        petition(3, "Australia", "Subclass 189"),
    ]
}

/// Points-based response covering the three default petitions.
pub(super) fn points_response() -> String {
    json!({
        "matching_results": [{
            "profile_id": "P001",
            "matched_petitions": [
                {
                    "petition_id": 1,
                    "visa_type": "Express Entry",
                    "country": "Canada",
                    "match_strength": "Strong",
                    "confidence_level": "High",
                    "points_earned": 40,
                    "total_points": 50,
                    "match_percentage": 80,
                    "points_breakdown": {
                        "hard_requirements": { "degree": 30 },
                        "soft_requirements": { "language": 10 }
                    },
                    "reasoning": ["B.Tech is equivalent to a Bachelor degree."],
                    "tie_breaker_rank": 2
                },
                {
                    "petition_id": 2,
                    "visa_type": "EU Blue Card",
                    "country": "Germany",
                    "match_strength": "Very Strong",
                    "match_percentage": 90,
                    "reasoning": ["Specialized role with recognized degree."],
                    "tie_breaker_rank": 1
                }
            ],
            "rejected_petitions": [
                {
                    "petition_id": 3,
                    "visa_type": "Subclass 189",
                    "reason": "Australia is not a target country",
                    "points_earned": 30,
                    "total_points": 50
                }
            ]
        }]
    })
    .to_string()
}

#[derive(Default)]
pub(super) struct MemoryProfiles {
    records: Mutex<Vec<Profile>>,
}

impl MemoryProfiles {
    pub(super) fn with(records: Vec<Profile>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

impl ProfileRepository for MemoryProfiles {
    fn list(&self) -> Result<Vec<Profile>, RepositoryError> {
        Ok(self.records.lock().expect("lock").clone())
    }

    fn fetch(&self, id: &ProfileId) -> Result<Option<Profile>, RepositoryError> {
        let records = self.records.lock().expect("lock");
        Ok(records
            .iter()
            .find(|profile| &profile.profile_id == id)
            .cloned())
    }

    fn insert(&self, mut profile: Profile) -> Result<Profile, RepositoryError> {
        let mut records = self.records.lock().expect("lock");
        profile.profile_id = next_profile_id(&records)?;
        records.push(profile.clone());
        Ok(profile)
    }

    fn update(
        &self,
        id: &ProfileId,
        patch: Map<String, Value>,
    ) -> Result<Option<Profile>, RepositoryError> {
        let mut records = self.records.lock().expect("lock");
        let Some(slot) = records.iter_mut().find(|profile| &profile.profile_id == id) else {
            return Ok(None);
        };
        *slot = merge_record(&*slot, patch, "profile_id")?;
        Ok(Some(slot.clone()))
    }

    fn delete(&self, id: &ProfileId) -> Result<bool, RepositoryError> {
        let mut records = self.records.lock().expect("lock");
        let before = records.len();
        records.retain(|profile| &profile.profile_id != id);
        Ok(records.len() != before)
    }
}

#[derive(Default)]
pub(super) struct MemoryPetitions {
    records: Mutex<Vec<Petition>>,
}

impl MemoryPetitions {
    pub(super) fn with(records: Vec<Petition>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

impl PetitionRepository for MemoryPetitions {
    fn list(&self) -> Result<Vec<Petition>, RepositoryError> {
        Ok(self.records.lock().expect("lock").clone())
    }

    fn fetch(&self, id: PetitionId) -> Result<Option<Petition>, RepositoryError> {
        let records = self.records.lock().expect("lock");
        Ok(records
            .iter()
            .find(|petition| petition.petition_id == id)
            .cloned())
    }

    fn insert(&self, mut petition: Petition) -> Result<Petition, RepositoryError> {
        let mut records = self.records.lock().expect("lock");
        petition.petition_id = next_petition_id(&records)?;
        records.push(petition.clone());
        Ok(petition)
    }

    fn update(
        &self,
        id: PetitionId,
        patch: Map<String, Value>,
    ) -> Result<Option<Petition>, RepositoryError> {
        let mut records = self.records.lock().expect("lock");
        let Some(slot) = records.iter_mut().find(|petition| petition.petition_id == id) else {
            return Ok(None);
        };
        *slot = merge_record(&*slot, patch, "petition_id")?;
        Ok(Some(slot.clone()))
    }

    fn delete(&self, id: PetitionId) -> Result<bool, RepositoryError> {
        let mut records = self.records.lock().expect("lock");
        let before = records.len();
        records.retain(|petition| petition.petition_id != id);
        Ok(records.len() != before)
    }
}

/// Store whose every call fails as if the backing file were unreadable.
pub(super) struct UnavailableProfiles;

impl ProfileRepository for UnavailableProfiles {
    fn list(&self) -> Result<Vec<Profile>, RepositoryError> {
        Err(unavailable())
    }

    fn fetch(&self, _id: &ProfileId) -> Result<Option<Profile>, RepositoryError> {
        Err(unavailable())
    }

    fn insert(&self, _profile: Profile) -> Result<Profile, RepositoryError> {
        Err(unavailable())
    }

    fn update(
        &self,
        _id: &ProfileId,
        _patch: Map<String, Value>,
    ) -> Result<Option<Profile>, RepositoryError> {
        Err(unavailable())
    }

    fn delete(&self, _id: &ProfileId) -> Result<bool, RepositoryError> {
        Err(unavailable())
    }
}

fn unavailable() -> RepositoryError {
    RepositoryError::Unavailable("profiles.json unreadable".to_string())
}

/// Reasoning client replaying a canned reply and recording every request.
pub(super) struct ScriptedReasoning {
    reply: Option<String>,
    requests: Mutex<Vec<EvaluationRequest>>,
}

impl ScriptedReasoning {
    pub(super) fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fails every call with an empty completion.
    pub(super) fn failing() -> Self {
        Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn requests(&self) -> Vec<EvaluationRequest> {
        self.requests.lock().expect("lock").clone()
    }
}

#[async_trait]
impl ReasoningClient for ScriptedReasoning {
    async fn complete(&self, request: &EvaluationRequest) -> Result<String, ReasoningError> {
        self.requests.lock().expect("lock").push(request.clone());
        self.reply.clone().ok_or(ReasoningError::EmptyCompletion)
    }
}

pub(super) type TestService = EligibilityService<MemoryProfiles, MemoryPetitions, ScriptedReasoning>;

pub(super) fn build_service(
    reasoning: ScriptedReasoning,
) -> (TestService, Arc<ScriptedReasoning>) {
    let reasoning = Arc::new(reasoning);
    let service = EligibilityService::new(
        Arc::new(MemoryProfiles::with(vec![profile()])),
        Arc::new(MemoryPetitions::with(petitions())),
        reasoning.clone(),
    );
    (service, reasoning)
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    eligibility_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
