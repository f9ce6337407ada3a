//! In-memory stores, used in tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{PermissionStore, UserStore};
use crate::errors::StoreError;
use crate::models::{AppUser, NewAppUser, RawDocument};

/// One call made against a [`MemoryUserStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserStoreCall {
    FindByEmail(String),
    UpdateGoogleId { user_id: String, google_id: String },
    Upsert(NewAppUser),
}

#[derive(Debug, Default)]
struct UserState {
    users: Vec<AppUser>,
    calls: Vec<UserStoreCall>,
    next_id: u64,
}

/// User store backed by a vector, recording every call it receives.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    state: Mutex<UserState>,
    fail_on_email: Option<String>,
}

impl MemoryUserStore {
    pub fn new(users: Vec<AppUser>) -> Self {
        Self {
            state: Mutex::new(UserState {
                users,
                ..Default::default()
            }),
            fail_on_email: None,
        }
    }

    /// Make lookups for `email` fail.
    pub fn failing_on(mut self, email: impl Into<String>) -> Self {
        self.fail_on_email = Some(email.into());
        self
    }

    /// Snapshot of the stored users.
    pub fn users(&self) -> Vec<AppUser> {
        self.lock().users.clone()
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<UserStoreCall> {
        self.lock().calls.clone()
    }

    /// Number of calls that modified the store.
    pub fn write_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| !matches!(c, UserStoreCall::FindByEmail(_)))
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, UserState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<AppUser>, StoreError> {
        let mut state = self.lock();
        state.calls.push(UserStoreCall::FindByEmail(email.to_string()));
        if self.fail_on_email.as_deref() == Some(email) {
            return Err(StoreError::ApiError {
                service: "memory",
                status: 500,
                body: format!("lookup failed for {email}"),
            });
        }

        let mut matches: Vec<&AppUser> = state.users.iter().filter(|u| u.email == email).collect();
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop().cloned()),
            count => Err(StoreError::AmbiguousEmail {
                email: email.to_string(),
                count,
            }),
        }
    }

    async fn update_google_id(&self, user_id: &str, google_id: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.calls.push(UserStoreCall::UpdateGoogleId {
            user_id: user_id.to_string(),
            google_id: google_id.to_string(),
        });
        match state.users.iter_mut().find(|u| u.id == user_id) {
            Some(user) => {
                user.google_id = Some(google_id.to_string());
                Ok(())
            }
            None => Err(StoreError::ApiError {
                service: "memory",
                status: 404,
                body: format!("no user {user_id}"),
            }),
        }
    }

    async fn upsert(&self, user: NewAppUser) -> Result<AppUser, StoreError> {
        let mut state = self.lock();
        state.calls.push(UserStoreCall::Upsert(user.clone()));
        state.next_id += 1;
        let stored = user.into_app_user(format!("mem-{}", state.next_id));
        state.users.push(stored.clone());
        Ok(stored)
    }
}

/// Permission collections held in memory.
#[derive(Debug, Default)]
pub struct MemoryPermissionStore {
    collections: BTreeMap<String, Vec<RawDocument>>,
}

impl MemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document with the given JSON object as its fields.
    pub fn with_document(
        mut self,
        collection: &str,
        id: &str,
        fields: serde_json::Value,
    ) -> Self {
        let fields = match fields {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(RawDocument {
                id: id.to_string(),
                fields,
            });
        self
    }
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn list_documents(&self, collection: &str) -> Result<Vec<RawDocument>, StoreError> {
        Ok(self.collections.get(collection).cloned().unwrap_or_default())
    }

    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<RawDocument>, StoreError> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }
}
