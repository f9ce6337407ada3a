//! One-way reconciliation of application users against the identity source.
//!
//! The [`Reconciler`] walks every identity page by page and, for each
//! identity with an email:
//!
//! 1. Looks up the application user with that exact email.
//! 2. If found and its `googleId` is missing or stale, rewrites that field.
//! 3. If not found, creates a user linked to the identity.
//!
//! Identities without an email are skipped without touching the store. Any
//! listing or store failure aborts the run; nothing is retried and nothing
//! is ever deleted.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::errors::{ReconcileError, StoreError};
use crate::identity::{IdentitySource, MAX_PAGE_SIZE};
use crate::models::{IdentityRecord, NewAppUser};
use crate::store::UserStore;

/// Options for a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Identities requested per listing call (1..=1000).
    pub page_size: u32,
    /// Look everything up but write nothing.
    pub dry_run: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            dry_run: false,
        }
    }
}

/// Counters from a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// Identities seen, including skipped ones.
    pub processed: usize,
    pub skipped_no_email: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub pages: usize,
    pub dry_run: bool,
    pub started_at: String,
    pub completed_at: Option<String>,
}

impl ReconcileStats {
    /// Writes performed (or planned, in a dry run).
    pub fn writes(&self) -> usize {
        self.created + self.updated
    }
}

/// What happened to one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    /// No usable email; the store was not consulted.
    Skipped,
    /// Already linked to this identity.
    Unchanged { user_id: String },
    /// Existing user's link set or replaced.
    Linked {
        user_id: String,
        previous: Option<String>,
    },
    /// New user created. `user_id` is `None` in a dry run.
    Created { user_id: Option<String> },
}

/// The reconciliation engine.
pub struct Reconciler {
    identities: Arc<dyn IdentitySource>,
    users: Arc<dyn UserStore>,
    options: ReconcileOptions,
}

impl Reconciler {
    pub fn new(
        identities: Arc<dyn IdentitySource>,
        users: Arc<dyn UserStore>,
        options: ReconcileOptions,
    ) -> Self {
        info!(
            page_size = options.page_size,
            dry_run = options.dry_run,
            "initializing reconciler"
        );
        Self {
            identities,
            users,
            options,
        }
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Walk the whole identity source once.
    pub async fn run(&self) -> Result<ReconcileStats, ReconcileError> {
        let page_size = self.options.page_size;
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(ReconcileError::InvalidPageSize(page_size));
        }

        let mut stats = ReconcileStats {
            dry_run: self.options.dry_run,
            started_at: Utc::now().to_rfc3339(),
            ..Default::default()
        };

        let result = self.walk(&mut stats).await;
        stats.completed_at = Some(Utc::now().to_rfc3339());

        match result {
            Ok(()) => {
                info!(
                    processed = stats.processed,
                    created = stats.created,
                    updated = stats.updated,
                    unchanged = stats.unchanged,
                    skipped = stats.skipped_no_email,
                    dry_run = stats.dry_run,
                    "reconciliation complete"
                );
                Ok(stats)
            }
            Err(e) => {
                error!(processed = stats.processed, error = %e, "reconciliation aborted");
                Err(e)
            }
        }
    }

    async fn walk(&self, stats: &mut ReconcileStats) -> Result<(), ReconcileError> {
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .identities
                .list_users(self.options.page_size, page_token.as_deref())
                .await
                .map_err(|source| ReconcileError::Listing {
                    processed: stats.processed,
                    source,
                })?;
            stats.pages += 1;
            debug!(page = stats.pages, records = page.records.len(), "processing identity page");

            for record in &page.records {
                let action = self.reconcile_identity(record).await.map_err(|source| {
                    ReconcileError::UserStore {
                        identity_id: record.id.clone(),
                        source,
                    }
                })?;
                stats.processed += 1;
                match action {
                    ReconcileAction::Skipped => stats.skipped_no_email += 1,
                    ReconcileAction::Unchanged { .. } => stats.unchanged += 1,
                    ReconcileAction::Linked { .. } => stats.updated += 1,
                    ReconcileAction::Created { .. } => stats.created += 1,
                }
            }

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => return Ok(()),
            }
        }
    }

    /// Reconcile a single identity against the user store.
    pub async fn reconcile_identity(
        &self,
        record: &IdentityRecord,
    ) -> Result<ReconcileAction, StoreError> {
        let Some(email) = record.usable_email() else {
            warn!(identity_id = %record.id, "identity has no email, skipping");
            return Ok(ReconcileAction::Skipped);
        };

        match self.users.find_by_email(email).await? {
            Some(user) if user.google_id.as_deref() == Some(record.id.as_str()) => {
                debug!(identity_id = %record.id, user_id = %user.id, "already linked");
                Ok(ReconcileAction::Unchanged { user_id: user.id })
            }
            Some(user) => {
                info!(
                    identity_id = %record.id,
                    user_id = %user.id,
                    previous = ?user.google_id,
                    dry_run = self.options.dry_run,
                    "linking existing user"
                );
                if !self.options.dry_run {
                    self.users.update_google_id(&user.id, &record.id).await?;
                }
                Ok(ReconcileAction::Linked {
                    user_id: user.id,
                    previous: user.google_id,
                })
            }
            None => {
                info!(
                    identity_id = %record.id,
                    email,
                    dry_run = self.options.dry_run,
                    "creating user"
                );
                if self.options.dry_run {
                    return Ok(ReconcileAction::Created { user_id: None });
                }
                let created = self
                    .users
                    .upsert(NewAppUser::from_identity(record, email))
                    .await?;
                Ok(ReconcileAction::Created {
                    user_id: Some(created.id),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MemoryIdentitySource;
    use crate::models::{AppUser, Role};
    use crate::store::memory::UserStoreCall;
    use crate::store::MemoryUserStore;

    fn identity(id: &str, email: Option<&str>) -> IdentityRecord {
        IdentityRecord {
            id: id.into(),
            email: email.map(String::from),
            display_name: None,
            photo_url: None,
        }
    }

    fn app_user(id: &str, email: &str, google_id: Option<&str>) -> AppUser {
        AppUser {
            id: id.into(),
            email: email.into(),
            google_id: google_id.map(String::from),
            name: String::new(),
            picture: None,
            role: Role::User,
        }
    }

    fn reconciler(
        identities: Vec<IdentityRecord>,
        store: &Arc<MemoryUserStore>,
        options: ReconcileOptions,
    ) -> Reconciler {
        Reconciler::new(
            Arc::new(MemoryIdentitySource::new(identities)),
            store.clone(),
            options,
        )
    }

    #[tokio::test]
    async fn test_updates_stale_link_and_skips_empty_email() {
        let store = Arc::new(MemoryUserStore::new(vec![app_user(
            "u1",
            "a@x.com",
            Some("old"),
        )]));
        let engine = reconciler(
            vec![identity("abc", Some("a@x.com")), identity("def", Some(""))],
            &store,
            ReconcileOptions::default(),
        );

        let stats = engine.run().await.unwrap();
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.skipped_no_email, 1);
        assert_eq!(
            store.calls(),
            vec![
                UserStoreCall::FindByEmail("a@x.com".into()),
                UserStoreCall::UpdateGoogleId {
                    user_id: "u1".into(),
                    google_id: "abc".into(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_creates_missing_user() {
        let store = Arc::new(MemoryUserStore::default());
        let mut record = identity("abc", Some("new@x.com"));
        record.display_name = Some("New Person".into());
        let engine = reconciler(vec![record], &store, ReconcileOptions::default());

        let stats = engine.run().await.unwrap();
        assert_eq!(stats.created, 1);

        let users = store.users();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].google_id.as_deref(), Some("abc"));
        assert_eq!(users[0].name, "New Person");
        assert_eq!(users[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_second_run_writes_nothing() {
        let store = Arc::new(MemoryUserStore::new(vec![app_user("u1", "a@x.com", None)]));
        let identities = vec![
            identity("abc", Some("a@x.com")),
            identity("ghi", Some("b@x.com")),
            identity("jkl", None),
        ];

        let first = reconciler(identities.clone(), &store, ReconcileOptions::default())
            .run()
            .await
            .unwrap();
        assert_eq!(first.writes(), 2);
        let writes_after_first = store.write_count();

        let second = reconciler(identities, &store, ReconcileOptions::default())
            .run()
            .await
            .unwrap();
        assert_eq!(second.writes(), 0);
        assert_eq!(second.unchanged, 2);
        assert_eq!(store.write_count(), writes_after_first);
    }

    #[tokio::test]
    async fn test_missing_email_makes_no_store_call() {
        let store = Arc::new(MemoryUserStore::default());
        let engine = reconciler(
            vec![identity("a", None), identity("b", Some("   "))],
            &store,
            ReconcileOptions::default(),
        );
        let stats = engine.run().await.unwrap();
        assert_eq!(stats.processed, 2);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_walks_every_page() {
        let identities: Vec<IdentityRecord> = (0..5)
            .map(|i| identity(&format!("id{i}"), Some(&format!("u{i}@x.com"))))
            .collect();
        let store = Arc::new(MemoryUserStore::default());
        let source = Arc::new(MemoryIdentitySource::new(identities));
        let engine = Reconciler::new(
            source.clone(),
            store.clone(),
            ReconcileOptions {
                page_size: 2,
                dry_run: false,
            },
        );

        let stats = engine.run().await.unwrap();
        assert_eq!(stats.pages, 3);
        assert_eq!(source.calls(), 3);
        assert_eq!(stats.created, 5);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let store = Arc::new(MemoryUserStore::new(vec![app_user(
            "u1",
            "a@x.com",
            Some("old"),
        )]));
        let engine = reconciler(
            vec![identity("abc", Some("a@x.com")), identity("def", Some("d@x.com"))],
            &store,
            ReconcileOptions {
                dry_run: true,
                ..Default::default()
            },
        );

        let stats = engine.run().await.unwrap();
        assert!(stats.dry_run);
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.created, 1);
        assert_eq!(store.write_count(), 0);
        assert_eq!(store.users()[0].google_id.as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_store_failure_aborts_run() {
        let store = Arc::new(MemoryUserStore::default().failing_on("b@x.com"));
        let engine = reconciler(
            vec![
                identity("a", Some("a@x.com")),
                identity("b", Some("b@x.com")),
                identity("c", Some("c@x.com")),
            ],
            &store,
            ReconcileOptions::default(),
        );

        let err = engine.run().await.unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::UserStore { ref identity_id, .. } if identity_id == "b"
        ));
        // The record after the failure is never looked at.
        assert!(!store
            .calls()
            .contains(&UserStoreCall::FindByEmail("c@x.com".into())));
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_run() {
        let identities: Vec<IdentityRecord> = (0..3)
            .map(|i| identity(&format!("id{i}"), Some(&format!("u{i}@x.com"))))
            .collect();
        let store = Arc::new(MemoryUserStore::default());
        let engine = Reconciler::new(
            Arc::new(MemoryIdentitySource::new(identities).failing_at(1)),
            store.clone(),
            ReconcileOptions {
                page_size: 2,
                dry_run: false,
            },
        );

        let err = engine.run().await.unwrap_err();
        assert!(matches!(err, ReconcileError::Listing { processed: 2, .. }));
        assert_eq!(store.users().len(), 2);
    }

    #[tokio::test]
    async fn test_ambiguous_email_fails_loudly() {
        let store = Arc::new(MemoryUserStore::new(vec![
            app_user("u1", "dup@x.com", None),
            app_user("u2", "dup@x.com", None),
        ]));
        let engine = reconciler(
            vec![identity("abc", Some("dup@x.com"))],
            &store,
            ReconcileOptions::default(),
        );

        let err = engine.run().await.unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::UserStore {
                source: StoreError::AmbiguousEmail { count: 2, .. },
                ..
            }
        ));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_rejects_bad_page_size() {
        let store = Arc::new(MemoryUserStore::default());
        let engine = reconciler(
            vec![],
            &store,
            ReconcileOptions {
                page_size: 0,
                dry_run: false,
            },
        );
        assert!(matches!(
            engine.run().await,
            Err(ReconcileError::InvalidPageSize(0))
        ));
    }
}
