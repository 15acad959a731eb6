//! ProfileStore: the process-wide owner of the persisted profile.
//!
//! Components receive an `Arc<ProfileStore>` instead of reaching for global
//! state. Every mutation is persisted before it is published to subscribers.

use std::sync::Arc;

use tokio::sync::{RwLock, watch};
use tracing::{debug, info};

use super::model::{Profile, ProfileUpdate, settings_keys};
use crate::error::StorageError;
use crate::store::KeyValueStore;

pub struct ProfileStore {
    backend: Arc<dyn KeyValueStore>,
    profile: RwLock<Profile>,
    tx: watch::Sender<Profile>,
}

impl ProfileStore {
    /// Load the profile from `backend`, seeding defaults on first run.
    pub async fn load(backend: Arc<dyn KeyValueStore>) -> Result<Self, StorageError> {
        let profile = match backend.get(settings_keys::PROFILE).await? {
            Some(value) => serde_json::from_value::<Profile>(value)?,
            None => {
                info!("No stored profile, seeding defaults");
                Profile::default()
            }
        };
        let (tx, _rx) = watch::channel(profile.clone());
        Ok(Self {
            backend,
            profile: RwLock::new(profile),
            tx,
        })
    }

    /// Current profile snapshot.
    pub async fn read(&self) -> Profile {
        self.profile.read().await.clone()
    }

    /// Subscribe to profile changes. The receiver starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<Profile> {
        self.tx.subscribe()
    }

    /// Shallow-merge `update` into the persisted record.
    pub async fn update(&self, update: ProfileUpdate) -> Result<Profile, StorageError> {
        self.mutate(|p| p.apply(update)).await
    }

    /// Set the onboarded flag. Idempotent.
    pub async fn mark_onboarded(&self) -> Result<Profile, StorageError> {
        let profile = self.mutate(|p| p.is_onboarded = true).await?;
        info!("Onboarding marked complete");
        Ok(profile)
    }

    /// Clear every field and the onboarded flag.
    pub async fn reset(&self) -> Result<Profile, StorageError> {
        let profile = self.mutate(|p| *p = Profile::empty()).await?;
        info!("Profile reset");
        Ok(profile)
    }

    async fn mutate(&self, f: impl FnOnce(&mut Profile)) -> Result<Profile, StorageError> {
        let mut guard = self.profile.write().await;
        let mut next = guard.clone();
        f(&mut next);
        if next == *guard {
            debug!("Profile unchanged, skipping persist");
            return Ok(next);
        }
        let value = serde_json::to_value(&next)?;
        self.backend.set(settings_keys::PROFILE, &value).await?;
        *guard = next.clone();
        drop(guard);
        self.tx.send_replace(next.clone());
        debug!("Profile persisted");
        Ok(next)
    }
}
