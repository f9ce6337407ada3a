//! The authenticated administrative handle shared by every backend client.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::source::{AuthorizedUserKey, CredentialKey, ResolvedCredential, ServiceAccountKey};
use crate::config::FirebaseConfig;
use crate::errors::CredentialError;

/// OAuth scopes requested for admin access.
const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/firebase",
    "https://www.googleapis.com/auth/identitytoolkit",
    "https://www.googleapis.com/auth/datastore",
];

/// Bearer token the Firebase emulators accept as an admin credential.
const EMULATOR_TOKEN: &str = "owner";

/// Tokens are refreshed this many seconds before they expire.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Lifetime requested for signed assertions.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Backend services reached through the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    IdentityToolkit,
    Firestore,
}

/// Base URLs for every backend service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub identity_toolkit_url: String,
    pub firestore_url: String,
    pub token_url: String,
    pub database: String,
    pub auth_emulated: bool,
    pub firestore_emulated: bool,
}

impl Endpoints {
    /// Endpoints from configuration, with emulator hosts applied when given.
    pub fn from_config(
        config: &FirebaseConfig,
        auth_emulator_host: Option<&str>,
        firestore_emulator_host: Option<&str>,
    ) -> Self {
        let mut endpoints = Self {
            identity_toolkit_url: config.identity_toolkit_url.trim_end_matches('/').to_string(),
            firestore_url: config.firestore_url.trim_end_matches('/').to_string(),
            token_url: config.token_url.clone(),
            database: config.database.clone(),
            auth_emulated: false,
            firestore_emulated: false,
        };
        if let Some(host) = auth_emulator_host {
            info!(host, "using Firebase Auth emulator");
            endpoints.identity_toolkit_url =
                format!("http://{}/identitytoolkit.googleapis.com", host.trim_end_matches('/'));
            endpoints.auth_emulated = true;
        }
        if let Some(host) = firestore_emulator_host {
            info!(host, "using Firestore emulator");
            endpoints.firestore_url = format!("http://{}", host.trim_end_matches('/'));
            endpoints.firestore_emulated = true;
        }
        endpoints
    }

    /// Point both services at one emulator base URL (e.g. a local fake).
    pub fn emulator(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            identity_toolkit_url: format!("{base}/identitytoolkit.googleapis.com"),
            firestore_url: base.to_string(),
            token_url: format!("{base}/token"),
            database: "(default)".to_string(),
            auth_emulated: true,
            firestore_emulated: true,
        }
    }

    fn is_emulated(&self, service: Service) -> bool {
        match service {
            Service::IdentityToolkit => self.auth_emulated,
            Service::Firestore => self.firestore_emulated,
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

/// Authenticated handle to the Firebase project.
///
/// Owns the HTTP client and caches the current access token until shortly
/// before it expires.
pub struct AdminHandle {
    credential: ResolvedCredential,
    endpoints: Endpoints,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl AdminHandle {
    /// Build a handle for a resolved credential.
    pub fn new(
        credential: ResolvedCredential,
        endpoints: Endpoints,
        request_timeout: Duration,
    ) -> Result<Self, CredentialError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("docvault-admin/", env!("CARGO_PKG_VERSION")))
            .build()?;
        info!(
            project_id = %credential.project_id,
            source = %credential.source,
            "created admin handle"
        );
        Ok(Self {
            credential,
            endpoints,
            http,
            token: Mutex::new(None),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.credential.project_id
    }

    pub fn credential(&self) -> &ResolvedCredential {
        &self.credential
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Bearer token for a request to `service`.
    pub async fn bearer_token(&self, service: Service) -> Result<String, CredentialError> {
        if self.endpoints.is_emulated(service) {
            return Ok(EMULATOR_TOKEN.to_string());
        }

        let mut cached = self.token.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if token.expires_at - chrono::Duration::seconds(EXPIRY_SKEW_SECS) > now {
                return Ok(token.access_token.clone());
            }
            debug!("access token expired, refreshing");
        }

        let fresh = self.mint_token(now).await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    #[instrument(skip_all)]
    async fn mint_token(&self, now: DateTime<Utc>) -> Result<CachedToken, CredentialError> {
        let resp = match &self.credential.key {
            CredentialKey::ServiceAccount(key) => {
                let token_uri = key
                    .token_uri
                    .clone()
                    .unwrap_or_else(|| self.endpoints.token_url.clone());
                let assertion = sign_assertion(key, &token_uri, now.timestamp())?;
                self.http
                    .post(&token_uri)
                    .form(&[
                        ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                        ("assertion", assertion.as_str()),
                    ])
                    .send()
                    .await?
            }
            CredentialKey::AuthorizedUser(key) => self.refresh_user_token(key).await?,
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CredentialError::TokenRejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = resp.json().await?;
        debug!(expires_in = token.expires_in, "minted access token");
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now + chrono::Duration::seconds(token.expires_in),
        })
    }

    async fn refresh_user_token(
        &self,
        key: &AuthorizedUserKey,
    ) -> Result<reqwest::Response, CredentialError> {
        Ok(self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", key.client_id.as_str()),
                ("client_secret", key.client_secret.as_str()),
                ("refresh_token", key.refresh_token.as_str()),
            ])
            .send()
            .await?)
    }
}

impl std::fmt::Debug for AdminHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminHandle")
            .field("project_id", &self.credential.project_id)
            .field("source", &self.credential.source)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Sign the RS256 JWT assertion for the service-account bearer grant.
fn sign_assertion(
    key: &ServiceAccountKey,
    audience: &str,
    now: i64,
) -> Result<String, CredentialError> {
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: SCOPES.join(" "),
        aud: audience,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
    Ok(jsonwebtoken::encode(&header, &claims, &encoding_key)?)
}
