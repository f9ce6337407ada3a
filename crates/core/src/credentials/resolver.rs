//! Lazy, idempotent credential resolution.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, warn};

use super::handle::{AdminHandle, Endpoints};
use super::source::{resolve_credentials, CredentialConfig};
use crate::errors::CredentialError;

/// Resolves admin credentials on first use and caches the resulting handle.
///
/// Nothing is read at construction, so a long-running process can start
/// before credentials are provisioned. A failed resolution is not cached;
/// once a handle exists every later call returns that same handle.
pub struct CredentialResolver {
    config: CredentialConfig,
    endpoints: Endpoints,
    request_timeout: Duration,
    cached: Mutex<Option<Arc<AdminHandle>>>,
}

impl CredentialResolver {
    pub fn new(config: CredentialConfig, endpoints: Endpoints, request_timeout: Duration) -> Self {
        Self {
            config,
            endpoints,
            request_timeout,
            cached: Mutex::new(None),
        }
    }

    /// Return the admin handle, resolving credentials if this is the first
    /// successful call.
    pub fn resolve(&self) -> Result<Arc<AdminHandle>, CredentialError> {
        let mut cached = self.lock();
        if let Some(handle) = cached.as_ref() {
            debug!("reusing resolved admin handle");
            return Ok(Arc::clone(handle));
        }

        let credential = resolve_credentials(&self.config)?;
        let handle = Arc::new(AdminHandle::new(
            credential,
            self.endpoints.clone(),
            self.request_timeout,
        )?);
        *cached = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Whether a handle has been resolved already.
    pub fn is_resolved(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<AdminHandle>>> {
        self.cached.lock().unwrap_or_else(|poisoned| {
            warn!("credential cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
