//! Application user store and permission document store.
//!
//! Both are trait seams. Firestore backs them in production
//! ([`FirestoreUserStore`], [`FirestoreDocuments`]); the in-memory versions
//! back tests and dry runs.

pub mod firestore;
pub mod memory;
pub mod value;

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::models::{AppUser, NewAppUser, RawDocument};

pub use firestore::{FirestoreDocuments, FirestoreUserStore};
pub use memory::{MemoryPermissionStore, MemoryUserStore};

/// The application's own user profiles.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up the user with exactly this email.
    ///
    /// Implementations return [`StoreError::AmbiguousEmail`] when more than
    /// one user matches rather than picking one.
    async fn find_by_email(&self, email: &str) -> Result<Option<AppUser>, StoreError>;

    /// Set only the identity-provider link of an existing user.
    async fn update_google_id(&self, user_id: &str, google_id: &str) -> Result<(), StoreError>;

    /// Store a new user and return it with its assigned id.
    async fn upsert(&self, user: NewAppUser) -> Result<AppUser, StoreError>;
}

/// Read-only access to a document collection.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Every document in `collection`.
    async fn list_documents(&self, collection: &str) -> Result<Vec<RawDocument>, StoreError>;

    /// One document, or `None` if it does not exist.
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<RawDocument>, StoreError>;
}
