use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use crate::core::filters::matches_filter;
use crate::error::KindredError;
use crate::models::{CandidateFilter, Profile, ProfilePatch};

/// Access to profile records
///
/// The match engine reads profiles through this trait and never owns their
/// persistence. Soft-deleted profiles behave as if they do not exist.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, id: &str) -> Result<Profile, KindredError>;

    /// Every live profile satisfying `filter`, in no particular order
    async fn list_candidates(&self, filter: &CandidateFilter) -> Result<Vec<Profile>, KindredError>;

    async fn update_profile(&self, id: &str, patch: ProfilePatch) -> Result<Profile, KindredError>;

    async fn insert_profile(&self, profile: Profile) -> Result<Profile, KindredError>;

    /// Soft delete: the record stays but is hidden from every read
    async fn delete_profile(&self, id: &str) -> Result<(), KindredError>;
}

/// Process-local profile store used in demo mode and tests
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<String, Profile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let profiles = profiles.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self {
            profiles: RwLock::new(profiles),
        }
    }

    /// Load seed profiles from a JSON array on disk
    pub fn from_seed_file<P: AsRef<Path>>(path: P) -> Result<Self, KindredError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| KindredError::Internal(format!("failed to read seed file {}: {}", path.display(), e)))?;
        let profiles: Vec<Profile> = serde_json::from_str(&raw)
            .map_err(|e| KindredError::Internal(format!("invalid seed file {}: {}", path.display(), e)))?;

        for profile in &profiles {
            profile.validate()?;
        }

        tracing::info!("Loaded {} seed profiles from {}", profiles.len(), path.display());
        Ok(Self::with_profiles(profiles))
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Profile>> {
        self.profiles.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Profile>> {
        self.profiles.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_profile(&self, id: &str) -> Result<Profile, KindredError> {
        self.read()
            .get(id)
            .filter(|p| !p.is_deleted())
            .cloned()
            .ok_or_else(|| KindredError::profile_not_found(id))
    }

    async fn list_candidates(&self, filter: &CandidateFilter) -> Result<Vec<Profile>, KindredError> {
        let candidates: Vec<Profile> = self
            .read()
            .values()
            .filter(|p| matches_filter(p, filter))
            .cloned()
            .collect();

        tracing::debug!("Found {} candidates for {}", candidates.len(), filter.requester_id);
        Ok(candidates)
    }

    async fn update_profile(&self, id: &str, patch: ProfilePatch) -> Result<Profile, KindredError> {
        let mut profiles = self.write();
        let current = profiles
            .get(id)
            .filter(|p| !p.is_deleted())
            .ok_or_else(|| KindredError::profile_not_found(id))?;

        let updated = patch.apply_to(current)?;
        profiles.insert(id.to_string(), updated.clone());
        Ok(updated)
    }

    async fn insert_profile(&self, profile: Profile) -> Result<Profile, KindredError> {
        profile.validate()?;

        let mut profiles = self.write();
        if profiles.contains_key(&profile.id) {
            return Err(KindredError::Conflict(format!("profile {} already exists", profile.id)));
        }
        profiles.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    async fn delete_profile(&self, id: &str) -> Result<(), KindredError> {
        let mut profiles = self.write();
        let profile = profiles
            .get_mut(id)
            .filter(|p| !p.is_deleted())
            .ok_or_else(|| KindredError::profile_not_found(id))?;

        let now = Utc::now();
        profile.deleted_at = Some(now);
        profile.updated_at = now;
        Ok(())
    }
}
