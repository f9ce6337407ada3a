//! Error types for the DocVault core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Credential errors
// ---------------------------------------------------------------------------

/// Errors from credential resolution and access-token minting.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// A credential source was present but its content is malformed.
    #[error("credential configuration error in {source_name}: {detail}")]
    Configuration {
        source_name: String,
        detail: String,
    },

    /// No credential source resolved.
    #[error(
        "no Firebase admin credentials found; set GOOGLE_APPLICATION_CREDENTIALS, \
         FIREBASE_SERVICE_ACCOUNT_BASE64, FIREBASE_SERVICE_ACCOUNT or the \
         FIREBASE_PROJECT_ID/FIREBASE_CLIENT_EMAIL/FIREBASE_PRIVATE_KEY triple"
    )]
    NotFound,

    /// Signing the OAuth assertion failed (usually a bad private key).
    #[error("failed to sign OAuth assertion: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// The token endpoint rejected the exchange.
    #[error("token endpoint returned HTTP {status}: {body}")]
    TokenRejected {
        status: u16,
        body: String,
    },

    /// HTTP-level transport error while talking to the token endpoint.
    #[error("token endpoint HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Generic I/O error reading a credential file.
    #[error("credential I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CredentialError {
    pub(crate) fn configuration(source_name: &str, detail: impl Into<String>) -> Self {
        Self::Configuration {
            source_name: source_name.to_string(),
            detail: detail.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Backend store errors
// ---------------------------------------------------------------------------

/// Lookup failures from the identity source, the user store, or the
/// permission store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP-level transport error (network, TLS, timeout).
    #[error("backend HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The API returned a non-success status code.
    #[error("{service} API error (HTTP {status}): {body}")]
    ApiError {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("{service} response decode error: {detail}")]
    Decode {
        service: &'static str,
        detail: String,
    },

    /// More than one application user carries the same email.
    #[error("ambiguous email lookup: {count} users match '{email}'")]
    AmbiguousEmail {
        email: String,
        count: usize,
    },

    /// Obtaining an access token for the request failed.
    #[error("backend credential error: {0}")]
    Credential(#[from] CredentialError),
}

// ---------------------------------------------------------------------------
// Reconciliation errors
// ---------------------------------------------------------------------------

/// Errors that abort a reconciliation run.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Listing the identity source failed.
    #[error("identity listing failed after {processed} record(s): {source}")]
    Listing {
        processed: usize,
        #[source]
        source: StoreError,
    },

    /// A user-store call failed for a specific identity.
    #[error("user store call failed for identity '{identity_id}': {source}")]
    UserStore {
        identity_id: String,
        #[source]
        source: StoreError,
    },

    /// The page size is out of range for the identity source.
    #[error("invalid page size {0}: must be between 1 and 1000")]
    InvalidPageSize(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = ConfigError::InvalidValue {
            field: "users.page_size".into(),
            detail: "must be > 0".into(),
        };
        assert!(err.to_string().contains("users.page_size"));

        let err = CredentialError::configuration("FIREBASE_SERVICE_ACCOUNT", "expected value");
        assert_eq!(
            err.to_string(),
            "credential configuration error in FIREBASE_SERVICE_ACCOUNT: expected value"
        );

        let err = StoreError::AmbiguousEmail {
            email: "a@x.com".into(),
            count: 2,
        };
        assert!(err.to_string().contains("a@x.com"));

        let err = ReconcileError::InvalidPageSize(0);
        assert!(err.to_string().contains("between 1 and 1000"));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let core_err: CoreError = CredentialError::NotFound.into();
        assert!(matches!(core_err, CoreError::Credential(_)));

        let store_err = StoreError::ApiError {
            service: "firestore",
            status: 500,
            body: "boom".into(),
        };
        let core_err: CoreError = store_err.into();
        assert!(matches!(core_err, CoreError::Store(_)));
    }
}
