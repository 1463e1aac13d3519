use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use super::domain::{Petition, PetitionId, Profile, ProfileId};
use super::normalizer::normalize;
use super::parser::{parse_response, MalformedResponse};
use super::ranking::rank;
use super::reasoning::{ReasoningClient, ReasoningError};
use super::repository::{PetitionRepository, ProfileRepository, RepositoryError};
use super::request::{build_request, RequestError};
use super::result::EligibilityResult;

/// Service composing the record stores, the reasoning client and the result pipeline.
pub struct EligibilityService<P, Q, C> {
    profiles: Arc<P>,
    petitions: Arc<Q>,
    reasoning: Arc<C>,
}

impl<P, Q, C> EligibilityService<P, Q, C>
where
    P: ProfileRepository + 'static,
    Q: PetitionRepository + 'static,
    C: ReasoningClient + 'static,
{
    pub fn new(profiles: Arc<P>, petitions: Arc<Q>, reasoning: Arc<C>) -> Self {
        Self {
            profiles,
            petitions,
            reasoning,
        }
    }

    pub fn profiles(&self) -> &P {
        &self.profiles
    }

    pub fn petitions(&self) -> &Q {
        &self.petitions
    }

    /// Evaluate a profile against one petition, or against every stored petition.
    ///
    /// Only lookup failures surface as errors. Once the inputs resolve, reasoning or
    /// parsing failures degrade to one error record per petition.
    pub async fn check_eligibility(
        &self,
        profile_id: &ProfileId,
        petition_id: Option<PetitionId>,
    ) -> Result<Vec<EligibilityResult>, EligibilityError> {
        let profile = self
            .profiles
            .fetch(profile_id)?
            .ok_or_else(|| EligibilityError::ProfileNotFound(profile_id.clone()))?;

        let petitions = match petition_id {
            Some(id) => vec![self
                .petitions
                .fetch(id)?
                .ok_or(EligibilityError::PetitionNotFound(id))?],
            None => self.petitions.list()?,
        };
        let petitions = distinct(petitions);

        if petitions.is_empty() {
            info!(profile_id = %profile_id, "no petitions to evaluate");
            return Ok(Vec::new());
        }

        info!(
            profile_id = %profile_id,
            petitions = petitions.len(),
            "checking eligibility"
        );

        let results = match self.evaluate(&profile, &petitions).await {
            Ok(results) => results,
            Err(err) => {
                warn!(
                    profile_id = %profile_id,
                    error = %err,
                    "evaluation failed; returning fallback results"
                );
                let message = err.to_string();
                petitions
                    .iter()
                    .map(|petition| EligibilityResult::failed(petition, message.clone()))
                    .collect()
            }
        };

        Ok(rank(results))
    }

    async fn evaluate(
        &self,
        profile: &Profile,
        petitions: &[Petition],
    ) -> Result<Vec<EligibilityResult>, PipelineError> {
        let request = build_request(profile, petitions)?;
        let raw = self.reasoning.complete(&request).await?;
        let parsed = parse_response(&raw)?;
        if parsed.additional_results() > 0 {
            warn!(
                ignored = parsed.additional_results(),
                "response carried more than one matching result"
            );
        }
        Ok(normalize(parsed.primary(), petitions))
    }
}

fn distinct(petitions: Vec<Petition>) -> Vec<Petition> {
    let mut seen = HashSet::new();
    petitions
        .into_iter()
        .filter(|petition| seen.insert(petition.petition_id))
        .collect()
}

/// Error raised by the eligibility service.
#[derive(Debug, thiserror::Error)]
pub enum EligibilityError {
    #[error("Profile not found: {0}")]
    ProfileNotFound(ProfileId),
    #[error("Petition not found: {0}")]
    PetitionNotFound(PetitionId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Failure anywhere between rendering the request and parsing the response.
#[derive(Debug, thiserror::Error)]
pub(crate) enum PipelineError {
    #[error("failed to check eligibility: {0}")]
    Request(#[from] RequestError),
    #[error("failed to check eligibility: {0}")]
    Transport(#[from] ReasoningError),
    #[error("failed to check eligibility: {0}")]
    Malformed(#[from] MalformedResponse),
}
