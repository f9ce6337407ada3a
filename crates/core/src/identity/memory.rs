//! In-memory identity source, used in tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::IdentitySource;
use crate::errors::StoreError;
use crate::models::{IdentityPage, IdentityRecord};

/// Serves a fixed list of records, paginated with offset tokens.
#[derive(Debug, Default)]
pub struct MemoryIdentitySource {
    records: Vec<IdentityRecord>,
    calls: AtomicUsize,
    fail_at_call: Option<usize>,
}

impl MemoryIdentitySource {
    pub fn new(records: Vec<IdentityRecord>) -> Self {
        Self {
            records,
            calls: AtomicUsize::new(0),
            fail_at_call: None,
        }
    }

    /// Make the `n`-th listing call (zero-based) fail.
    pub fn failing_at(mut self, n: usize) -> Self {
        self.fail_at_call = Some(n);
        self
    }

    /// Number of `list_users` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentitySource for MemoryIdentitySource {
    async fn list_users(
        &self,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<IdentityPage, StoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_at_call == Some(call) {
            return Err(StoreError::ApiError {
                service: "memory",
                status: 503,
                body: "listing unavailable".into(),
            });
        }

        let start = match page_token {
            Some(token) => token.parse::<usize>().map_err(|e| StoreError::Decode {
                service: "memory",
                detail: format!("bad page token '{token}': {e}"),
            })?,
            None => 0,
        };
        let end = (start + page_size as usize).min(self.records.len());
        let records = self.records.get(start..end).unwrap_or_default().to_vec();
        let next_page_token = (end < self.records.len()).then(|| end.to_string());
        Ok(IdentityPage {
            records,
            next_page_token,
        })
    }
}
