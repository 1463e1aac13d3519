use metrics_exporter_prometheus::PrometheusHandle;
use petition_match::workflows::eligibility::{
    merge_record, next_petition_id, next_profile_id, Petition, PetitionId, PetitionRepository,
    Profile, ProfileId, ProfileRepository, RepositoryError,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// A `{"<key>": [records...]}` document on disk.
///
/// Every operation reads the whole file and mutations write it back; the mutex keeps
/// read-modify-write cycles from interleaving within one process.
struct JsonDocument {
    path: PathBuf,
    key: &'static str,
    lock: Mutex<()>,
}

impl JsonDocument {
    fn new(path: impl Into<PathBuf>, key: &'static str) -> Self {
        Self {
            path: path.into(),
            key,
            lock: Mutex::new(()),
        }
    }

    fn read<T: DeserializeOwned>(&self) -> Result<Vec<T>, RepositoryError> {
        let _guard = self.lock.lock().map_err(|_| poisoned(&self.path))?;
        self.load()
    }

    /// Run `change` over the stored records, persisting them when it reports a change.
    fn modify<T, R>(
        &self,
        change: impl FnOnce(&mut Vec<T>) -> Result<(R, bool), RepositoryError>,
    ) -> Result<R, RepositoryError>
    where
        T: Serialize + DeserializeOwned,
    {
        let _guard = self.lock.lock().map_err(|_| poisoned(&self.path))?;
        let mut records = self.load()?;
        let (outcome, changed) = change(&mut records)?;
        if changed {
            self.store(&records)?;
        }
        Ok(outcome)
    }

    fn load<T: DeserializeOwned>(&self) -> Result<Vec<T>, RepositoryError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.store::<Value>(&[])?;
                return Ok(Vec::new());
            }
            Err(err) => return Err(unavailable(&self.path, err)),
        };

        let mut document: Map<String, Value> =
            serde_json::from_str(&raw).map_err(|err| unavailable(&self.path, err))?;
        match document.remove(self.key) {
            Some(records) => {
                serde_json::from_value(records).map_err(|err| unavailable(&self.path, err))
            }
            None => Ok(Vec::new()),
        }
    }

    fn store<T: Serialize>(&self, records: &[T]) -> Result<(), RepositoryError> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| unavailable(&self.path, err))?;
        }
        let records = serde_json::to_value(records).map_err(|err| unavailable(&self.path, err))?;
        let mut document = Map::new();
        document.insert(self.key.to_string(), records);
        let rendered =
            serde_json::to_string_pretty(&document).map_err(|err| unavailable(&self.path, err))?;
        fs::write(&self.path, rendered).map_err(|err| unavailable(&self.path, err))
    }
}

fn unavailable(path: &Path, err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Unavailable(format!("{}: {err}", path.display()))
}

fn poisoned(path: &Path) -> RepositoryError {
    RepositoryError::Unavailable(format!("{}: store lock poisoned", path.display()))
}

/// Profile store persisted as `{"profiles": [...]}`.
pub(crate) struct JsonProfileStore {
    document: JsonDocument,
}

impl JsonProfileStore {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            document: JsonDocument::new(path, "profiles"),
        }
    }
}

impl ProfileRepository for JsonProfileStore {
    fn list(&self) -> Result<Vec<Profile>, RepositoryError> {
        self.document.read()
    }

    fn fetch(&self, id: &ProfileId) -> Result<Option<Profile>, RepositoryError> {
        let profiles: Vec<Profile> = self.document.read()?;
        Ok(profiles
            .into_iter()
            .find(|profile| &profile.profile_id == id))
    }

    fn insert(&self, mut profile: Profile) -> Result<Profile, RepositoryError> {
        self.document.modify(|profiles: &mut Vec<Profile>| {
            profile.profile_id = next_profile_id(profiles)?;
            profiles.push(profile.clone());
            Ok((profile, true))
        })
    }

    fn update(
        &self,
        id: &ProfileId,
        patch: Map<String, Value>,
    ) -> Result<Option<Profile>, RepositoryError> {
        self.document.modify(|profiles: &mut Vec<Profile>| {
            let Some(slot) = profiles.iter_mut().find(|profile| &profile.profile_id == id) else {
                return Ok((None, false));
            };
            *slot = merge_record(&*slot, patch, "profile_id")?;
            Ok((Some(slot.clone()), true))
        })
    }

    fn delete(&self, id: &ProfileId) -> Result<bool, RepositoryError> {
        self.document.modify(|profiles: &mut Vec<Profile>| {
            let before = profiles.len();
            profiles.retain(|profile| &profile.profile_id != id);
            let removed = profiles.len() != before;
            Ok((removed, removed))
        })
    }
}

/// Petition store persisted as `{"petitions": [...]}`.
pub(crate) struct JsonPetitionStore {
    document: JsonDocument,
}

impl JsonPetitionStore {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            document: JsonDocument::new(path, "petitions"),
        }
    }
}

impl PetitionRepository for JsonPetitionStore {
    fn list(&self) -> Result<Vec<Petition>, RepositoryError> {
        self.document.read()
    }

    fn fetch(&self, id: PetitionId) -> Result<Option<Petition>, RepositoryError> {
        let petitions: Vec<Petition> = self.document.read()?;
        Ok(petitions
            .into_iter()
            .find(|petition| petition.petition_id == id))
    }

    fn insert(&self, mut petition: Petition) -> Result<Petition, RepositoryError> {
        self.document.modify(|petitions: &mut Vec<Petition>| {
            petition.petition_id = next_petition_id(petitions)?;
            petitions.push(petition.clone());
            Ok((petition, true))
        })
    }

    fn update(
        &self,
        id: PetitionId,
        patch: Map<String, Value>,
    ) -> Result<Option<Petition>, RepositoryError> {
        self.document.modify(|petitions: &mut Vec<Petition>| {
            let Some(slot) = petitions
                .iter_mut()
                .find(|petition| petition.petition_id == id)
            else {
                return Ok((None, false));
            };
            *slot = merge_record(&*slot, patch, "petition_id")?;
            Ok((Some(slot.clone()), true))
        })
    }

    fn delete(&self, id: PetitionId) -> Result<bool, RepositoryError> {
        self.document.modify(|petitions: &mut Vec<Petition>| {
            let before = petitions.len();
            petitions.retain(|petition| petition.petition_id != id);
            let removed = petitions.len() != before;
            Ok((removed, removed))
        })
    }
}
