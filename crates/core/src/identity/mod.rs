//! Identity sources: external directories of authenticated users.
//!
//! [`IdentitySource`] is the seam the reconciliation engine walks. The
//! production implementation is [`FirebaseAuthDirectory`]; tests use
//! [`MemoryIdentitySource`].

pub mod firebase_auth;
pub mod memory;

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::models::IdentityPage;

pub use firebase_auth::FirebaseAuthDirectory;
pub use memory::MemoryIdentitySource;

/// Largest page the Firebase Auth listing accepts.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// A paginated directory of identity records.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    /// Fetch one page of at most `page_size` records, starting at
    /// `page_token` (or the beginning when `None`).
    async fn list_users(
        &self,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<IdentityPage, StoreError>;
}
