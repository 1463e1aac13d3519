use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};

use super::domain::{Petition, PetitionId, Profile, ProfileId};
use super::parser::number_from_value;
use super::reasoning::ReasoningClient;
use super::repository::{PetitionRepository, ProfileRepository, RepositoryError};
use super::service::{EligibilityError, EligibilityService};

type SharedService<P, Q, C> = Arc<EligibilityService<P, Q, C>>;

/// Router exposing record management and eligibility checks.
pub fn eligibility_router<P, Q, C>(service: SharedService<P, Q, C>) -> Router
where
    P: ProfileRepository + 'static,
    Q: PetitionRepository + 'static,
    C: ReasoningClient + 'static,
{
    Router::new()
        .route(
            "/api/profiles",
            get(list_profiles::<P, Q, C>).post(create_profile::<P, Q, C>),
        )
        .route(
            "/api/profiles/:profile_id",
            get(get_profile::<P, Q, C>)
                .put(update_profile::<P, Q, C>)
                .delete(delete_profile::<P, Q, C>),
        )
        .route(
            "/api/petitions",
            get(list_petitions::<P, Q, C>).post(create_petition::<P, Q, C>),
        )
        .route(
            "/api/petitions/:petition_id",
            get(get_petition::<P, Q, C>)
                .put(update_petition::<P, Q, C>)
                .delete(delete_petition::<P, Q, C>),
        )
        .route("/api/eligibility/check", post(check_handler::<P, Q, C>))
        .route(
            "/api/eligibility/check/:profile_id/:petition_id",
            post(check_pair_handler::<P, Q, C>),
        )
        .with_state(service)
}

const PROFILE_NOT_FOUND: &str = "Profile not found";
const PETITION_NOT_FOUND: &str = "Petition not found";

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let message: String = message.into();
    (status, Json(json!({ "error": message }))).into_response()
}

fn repository_failure(error: RepositoryError) -> Response {
    match error {
        RepositoryError::Invalid(_) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, error.to_string())
        }
        RepositoryError::Unavailable(_) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
        }
    }
}

fn eligibility_failure(error: EligibilityError) -> Response {
    match error {
        EligibilityError::ProfileNotFound(_) | EligibilityError::PetitionNotFound(_) => {
            error_response(StatusCode::NOT_FOUND, error.to_string())
        }
        EligibilityError::Repository(error) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
        }
    }
}

fn petition_id_from_path(raw: &str) -> Option<PetitionId> {
    raw.trim().parse().ok().map(PetitionId)
}

pub(crate) async fn list_profiles<P, Q, C>(
    State(service): State<SharedService<P, Q, C>>,
) -> Response
where
    P: ProfileRepository + 'static,
    Q: PetitionRepository + 'static,
    C: ReasoningClient + 'static,
{
    match service.profiles().list() {
        Ok(profiles) => Json(profiles).into_response(),
        Err(error) => repository_failure(error),
    }
}

pub(crate) async fn get_profile<P, Q, C>(
    State(service): State<SharedService<P, Q, C>>,
    Path(profile_id): Path<String>,
) -> Response
where
    P: ProfileRepository + 'static,
    Q: PetitionRepository + 'static,
    C: ReasoningClient + 'static,
{
    match service.profiles().fetch(&ProfileId(profile_id)) {
        Ok(Some(profile)) => Json(profile).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, PROFILE_NOT_FOUND),
        Err(error) => repository_failure(error),
    }
}

pub(crate) async fn create_profile<P, Q, C>(
    State(service): State<SharedService<P, Q, C>>,
    Json(profile): Json<Profile>,
) -> Response
where
    P: ProfileRepository + 'static,
    Q: PetitionRepository + 'static,
    C: ReasoningClient + 'static,
{
    match service.profiles().insert(profile) {
        Ok(stored) => (StatusCode::CREATED, Json(stored)).into_response(),
        Err(error) => repository_failure(error),
    }
}

pub(crate) async fn update_profile<P, Q, C>(
    State(service): State<SharedService<P, Q, C>>,
    Path(profile_id): Path<String>,
    Json(patch): Json<Map<String, Value>>,
) -> Response
where
    P: ProfileRepository + 'static,
    Q: PetitionRepository + 'static,
    C: ReasoningClient + 'static,
{
    match service.profiles().update(&ProfileId(profile_id), patch) {
        Ok(Some(profile)) => Json(profile).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, PROFILE_NOT_FOUND),
        Err(error) => repository_failure(error),
    }
}

pub(crate) async fn delete_profile<P, Q, C>(
    State(service): State<SharedService<P, Q, C>>,
    Path(profile_id): Path<String>,
) -> Response
where
    P: ProfileRepository + 'static,
    Q: PetitionRepository + 'static,
    C: ReasoningClient + 'static,
{
    match service.profiles().delete(&ProfileId(profile_id)) {
        Ok(true) => Json(json!({ "message": "Profile deleted successfully" })).into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, PROFILE_NOT_FOUND),
        Err(error) => repository_failure(error),
    }
}

pub(crate) async fn list_petitions<P, Q, C>(
    State(service): State<SharedService<P, Q, C>>,
) -> Response
where
    P: ProfileRepository + 'static,
    Q: PetitionRepository + 'static,
    C: ReasoningClient + 'static,
{
    match service.petitions().list() {
        Ok(petitions) => Json(petitions).into_response(),
        Err(error) => repository_failure(error),
    }
}

pub(crate) async fn get_petition<P, Q, C>(
    State(service): State<SharedService<P, Q, C>>,
    Path(petition_id): Path<String>,
) -> Response
where
    P: ProfileRepository + 'static,
    Q: PetitionRepository + 'static,
    C: ReasoningClient + 'static,
{
    let Some(id) = petition_id_from_path(&petition_id) else {
        return error_response(StatusCode::NOT_FOUND, PETITION_NOT_FOUND);
    };
    match service.petitions().fetch(id) {
        Ok(Some(petition)) => Json(petition).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, PETITION_NOT_FOUND),
        Err(error) => repository_failure(error),
    }
}

pub(crate) async fn create_petition<P, Q, C>(
    State(service): State<SharedService<P, Q, C>>,
    Json(petition): Json<Petition>,
) -> Response
where
    P: ProfileRepository + 'static,
    Q: PetitionRepository + 'static,
    C: ReasoningClient + 'static,
{
    match service.petitions().insert(petition) {
        Ok(stored) => (StatusCode::CREATED, Json(stored)).into_response(),
        Err(error) => repository_failure(error),
    }
}

pub(crate) async fn update_petition<P, Q, C>(
    State(service): State<SharedService<P, Q, C>>,
    Path(petition_id): Path<String>,
    Json(patch): Json<Map<String, Value>>,
) -> Response
where
    P: ProfileRepository + 'static,
    Q: PetitionRepository + 'static,
    C: ReasoningClient + 'static,
{
    let Some(id) = petition_id_from_path(&petition_id) else {
        return error_response(StatusCode::NOT_FOUND, PETITION_NOT_FOUND);
    };
    match service.petitions().update(id, patch) {
        Ok(Some(petition)) => Json(petition).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, PETITION_NOT_FOUND),
        Err(error) => repository_failure(error),
    }
}

pub(crate) async fn delete_petition<P, Q, C>(
    State(service): State<SharedService<P, Q, C>>,
    Path(petition_id): Path<String>,
) -> Response
where
    P: ProfileRepository + 'static,
    Q: PetitionRepository + 'static,
    C: ReasoningClient + 'static,
{
    let Some(id) = petition_id_from_path(&petition_id) else {
        return error_response(StatusCode::NOT_FOUND, PETITION_NOT_FOUND);
    };
    match service.petitions().delete(id) {
        Ok(true) => Json(json!({ "message": "Petition deleted successfully" })).into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, PETITION_NOT_FOUND),
        Err(error) => repository_failure(error),
    }
}

/// `profileId` may be a string or number; `petitionId` a number or numeric string.
pub(crate) async fn check_handler<P, Q, C>(
    State(service): State<SharedService<P, Q, C>>,
    Json(body): Json<Value>,
) -> Response
where
    P: ProfileRepository + 'static,
    Q: PetitionRepository + 'static,
    C: ReasoningClient + 'static,
{
    let profile_id = match body.get("profileId") {
        Some(Value::String(id)) if !id.is_empty() => ProfileId(id.clone()),
        Some(Value::Number(id)) => ProfileId(id.to_string()),
        _ => return error_response(StatusCode::BAD_REQUEST, "profileId is required"),
    };

    let petition_id = match body.get("petitionId") {
        None | Some(Value::Null) => None,
        Some(raw) => match number_from_value(raw)
            .filter(|id| id.fract() == 0.0 && *id >= 0.0 && *id <= f64::from(u32::MAX))
        {
            Some(id) => Some(PetitionId(id as u32)),
            None => {
                return error_response(StatusCode::BAD_REQUEST, "petitionId must be a number")
            }
        },
    };

    match service.check_eligibility(&profile_id, petition_id).await {
        Ok(results) => Json(results).into_response(),
        Err(error) => eligibility_failure(error),
    }
}

pub(crate) async fn check_pair_handler<P, Q, C>(
    State(service): State<SharedService<P, Q, C>>,
    Path((profile_id, petition_id)): Path<(String, String)>,
) -> Response
where
    P: ProfileRepository + 'static,
    Q: PetitionRepository + 'static,
    C: ReasoningClient + 'static,
{
    let Some(petition_id) = petition_id_from_path(&petition_id) else {
        return error_response(StatusCode::NOT_FOUND, PETITION_NOT_FOUND);
    };

    match service
        .check_eligibility(&ProfileId(profile_id), Some(petition_id))
        .await
    {
        Ok(results) => match results.into_iter().next() {
            Some(first) => Json(first).into_response(),
            None => Json(json!({ "error": "No results found" })).into_response(),
        },
        Err(error) => eligibility_failure(error),
    }
}
