//! Eligibility evaluation of applicant profiles against petition definitions.
//!
//! Records flow from the repositories into a rendered evaluation request, through the
//! reasoning client, and back via the parser, normalizer and ranker into canonical
//! results. Reasoning failures never escape `check_eligibility`; they become per-petition
//! error records instead.

pub mod domain;
pub mod normalizer;
pub mod parser;
pub mod ranking;
pub mod reasoning;
pub mod repository;
pub mod request;
pub mod result;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    Education, Employment, OpenMap, Petition, PetitionId, PetitionSummary, Profile, ProfileId,
    ScoringWeights,
};
pub use normalizer::normalize;
pub use parser::{parse_response, MalformedResponse, MatchingResult, ParsedResponse};
pub use ranking::rank;
pub use reasoning::{OpenAiReasoningClient, ReasoningClient, ReasoningError};
pub use repository::{
    merge_record, next_petition_id, next_profile_id, PetitionRepository, ProfileRepository,
    RepositoryError,
};
pub use request::{build_request, EvaluationRequest, RequestError};
pub use result::{
    BreakdownEntry, ConfidenceLevel, EligibilityResult, MatchStrength, PointsBreakdown,
};
pub use router::eligibility_router;
pub use service::{EligibilityError, EligibilityService};
