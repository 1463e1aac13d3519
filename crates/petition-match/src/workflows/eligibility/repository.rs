use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::domain::{Petition, PetitionId, Profile, ProfileId};

/// Storage abstraction for applicant profiles.
pub trait ProfileRepository: Send + Sync {
    fn list(&self) -> Result<Vec<Profile>, RepositoryError>;
    fn fetch(&self, id: &ProfileId) -> Result<Option<Profile>, RepositoryError>;
    /// Persist a new profile, assigning the next `P###` identifier.
    fn insert(&self, profile: Profile) -> Result<Profile, RepositoryError>;
    /// Shallow-merge `patch` over the stored record.
    fn update(
        &self,
        id: &ProfileId,
        patch: Map<String, Value>,
    ) -> Result<Option<Profile>, RepositoryError>;
    fn delete(&self, id: &ProfileId) -> Result<bool, RepositoryError>;
}

/// Storage abstraction for petition definitions.
pub trait PetitionRepository: Send + Sync {
    fn list(&self) -> Result<Vec<Petition>, RepositoryError>;
    fn fetch(&self, id: PetitionId) -> Result<Option<Petition>, RepositoryError>;
    fn insert(&self, petition: Petition) -> Result<Petition, RepositoryError>;
    fn update(
        &self,
        id: PetitionId,
        patch: Map<String, Value>,
    ) -> Result<Option<Petition>, RepositoryError>;
    fn delete(&self, id: PetitionId) -> Result<bool, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("invalid record: {0}")]
    Invalid(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Next profile identifier: highest numeric suffix plus one, zero-padded to three digits.
pub fn next_profile_id(existing: &[Profile]) -> Result<ProfileId, RepositoryError> {
    let max = existing
        .iter()
        .filter_map(|profile| profile.profile_id.sequence())
        .max()
        .unwrap_or(0);
    max.checked_add(1)
        .map(ProfileId::from_sequence)
        .ok_or_else(|| RepositoryError::Invalid("profile id sequence exhausted".to_string()))
}

/// Next petition identifier: highest id plus one (the first petition gets 1).
pub fn next_petition_id(existing: &[Petition]) -> Result<PetitionId, RepositoryError> {
    let max = existing
        .iter()
        .map(|petition| petition.petition_id.0)
        .max()
        .unwrap_or(0);
    max.checked_add(1)
        .map(PetitionId)
        .ok_or_else(|| RepositoryError::Invalid("petition id sequence exhausted".to_string()))
}

/// Apply a top-level JSON merge patch to a record.
///
/// `id_field` is restored after the merge so a patch can never re-key a record.
pub fn merge_record<T>(
    existing: &T,
    patch: Map<String, Value>,
    id_field: &str,
) -> Result<T, RepositoryError>
where
    T: Serialize + DeserializeOwned,
{
    let mut value =
        serde_json::to_value(existing).map_err(|err| RepositoryError::Invalid(err.to_string()))?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| RepositoryError::Invalid("record is not an object".to_string()))?;
    let id = object.get(id_field).cloned();

    for (key, field) in patch {
        object.insert(key, field);
    }
    if let Some(id) = id {
        object.insert(id_field.to_string(), id);
    }

    serde_json::from_value(value).map_err(|err| RepositoryError::Invalid(err.to_string()))
}
