//! User profile persistence.
//!
//! The gate upserts a profile after every successful authentication and the
//! selection endpoints read and write the last chosen group or teacher.
//! Storage is behind [`ProfileStore`] so a database-backed implementation can
//! replace the in-memory default.

use crate::auth::identity::UserIdentity;
use crate::errors::GateError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Last schedule selection of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub last_selected_group_id: Option<i64>,
    pub last_selected_teacher: Option<String>,
}

/// Stored profile of a Telegram user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProfile {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub selection: Selection,
}

#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    /// Create or refresh the profile of an authenticated user.
    ///
    /// Identities without a Telegram id are ignored.
    async fn upsert(&self, identity: &UserIdentity) -> Result<(), GateError>;

    /// Last selection of a user; `None` if the user is unknown.
    async fn selection(&self, user_id: i64) -> Result<Option<Selection>, GateError>;

    /// Overwrite the selection of a user, creating the profile if needed.
    async fn save_selection(&self, user_id: i64, selection: Selection) -> Result<(), GateError>;
}

#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<i64, StoredProfile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn profile(&self, user_id: i64) -> Option<StoredProfile> {
        self.profiles.read().await.get(&user_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.profiles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.profiles.read().await.is_empty()
    }
}

fn blank_profile(user_id: i64, now: DateTime<Utc>) -> StoredProfile {
    StoredProfile {
        user_id,
        username: None,
        first_name: None,
        last_name: None,
        language_code: None,
        first_seen: now,
        last_seen: now,
        selection: Selection::default(),
    }
}

#[async_trait::async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn upsert(&self, identity: &UserIdentity) -> Result<(), GateError> {
        let Some(user_id) = identity.id.telegram_id() else {
            return Ok(());
        };

        let now = Utc::now();
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .entry(user_id)
            .or_insert_with(|| blank_profile(user_id, now));

        // Absent fields keep what was stored before.
        if identity.username.is_some() {
            profile.username = identity.username.clone();
        }
        if identity.first_name.is_some() {
            profile.first_name = identity.first_name.clone();
        }
        if identity.last_name.is_some() {
            profile.last_name = identity.last_name.clone();
        }
        if identity.language_code.is_some() {
            profile.language_code = identity.language_code.clone();
        }
        profile.last_seen = now;

        Ok(())
    }

    async fn selection(&self, user_id: i64) -> Result<Option<Selection>, GateError> {
        Ok(self
            .profiles
            .read()
            .await
            .get(&user_id)
            .map(|p| p.selection.clone()))
    }

    async fn save_selection(&self, user_id: i64, selection: Selection) -> Result<(), GateError> {
        let now = Utc::now();
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .entry(user_id)
            .or_insert_with(|| blank_profile(user_id, now));
        profile.selection = selection;
        profile.last_seen = now;
        Ok(())
    }
}
