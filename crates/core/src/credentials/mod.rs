//! Admin credential resolution.
//!
//! Sources are tried in a fixed priority order:
//! 1. Application default credentials file (`GOOGLE_APPLICATION_CREDENTIALS`)
//! 2. First credentials JSON file in the fallback directory
//! 3. Base64-encoded service account (`FIREBASE_SERVICE_ACCOUNT_BASE64`)
//! 4. Raw service account JSON (`FIREBASE_SERVICE_ACCOUNT`)
//! 5. Individual key fields (`FIREBASE_PROJECT_ID` / `_CLIENT_EMAIL` / `_PRIVATE_KEY`)
//! 6. Development mode only: ambient gcloud credentials with a fixed project id

pub mod handle;
pub mod resolver;
pub mod source;

pub use handle::{AdminHandle, Endpoints, Service};
pub use resolver::CredentialResolver;
pub use source::{
    resolve_credentials, AuthorizedUserKey, CredentialConfig, CredentialKey, CredentialSource,
    KeyFields, ResolvedCredential, ServiceAccountKey, DEV_PROJECT_ID,
};
