//! TOML-based configuration for the DocVault operator tools.
//!
//! Secrets never live in the file. The `[credentials]` section names the
//! environment variables that carry them; the values are read when
//! [`AdminConfig::credential_config`] builds a [`CredentialConfig`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::credentials::{CredentialConfig, KeyFields};
use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration, loaded from an optional TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Service endpoints and HTTP settings.
    #[serde(default)]
    pub firebase: FirebaseConfig,

    /// Where credentials come from.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Application user store settings.
    #[serde(default)]
    pub users: UsersConfig,

    /// Permission inspector settings.
    #[serde(default)]
    pub permissions: PermissionsConfig,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Firebase endpoints
// ---------------------------------------------------------------------------

/// Firebase / Google API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseConfig {
    /// Identity Toolkit API base URL.
    #[serde(default = "default_identity_toolkit_url")]
    pub identity_toolkit_url: String,

    /// Firestore API base URL.
    #[serde(default = "default_firestore_url")]
    pub firestore_url: String,

    /// Fallback OAuth2 token endpoint, used when a credential carries none.
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Firestore database id.
    #[serde(default = "default_database")]
    pub database: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Environment variable naming the Auth emulator host.
    #[serde(default = "default_auth_emulator_env")]
    pub auth_emulator_host_env: String,

    /// Environment variable naming the Firestore emulator host.
    #[serde(default = "default_firestore_emulator_env")]
    pub firestore_emulator_host_env: String,
}

fn default_identity_toolkit_url() -> String {
    "https://identitytoolkit.googleapis.com".into()
}
fn default_firestore_url() -> String {
    "https://firestore.googleapis.com".into()
}
fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".into()
}
fn default_database() -> String {
    "(default)".into()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_auth_emulator_env() -> String {
    "FIREBASE_AUTH_EMULATOR_HOST".into()
}
fn default_firestore_emulator_env() -> String {
    "FIRESTORE_EMULATOR_HOST".into()
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            identity_toolkit_url: default_identity_toolkit_url(),
            firestore_url: default_firestore_url(),
            token_url: default_token_url(),
            database: default_database(),
            request_timeout_secs: default_request_timeout(),
            auth_emulator_host_env: default_auth_emulator_env(),
            firestore_emulator_host_env: default_firestore_emulator_env(),
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Credential source settings. Every `*_env` field holds the NAME of an
/// environment variable, never the secret itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Directory scanned for a credentials JSON file.
    #[serde(default = "default_fallback_dir")]
    pub fallback_dir: PathBuf,

    #[serde(default = "default_adc_env")]
    pub application_credentials_env: String,

    #[serde(default = "default_base64_env")]
    pub service_account_base64_env: String,

    #[serde(default = "default_service_account_env")]
    pub service_account_env: String,

    #[serde(default = "default_project_id_env")]
    pub project_id_env: String,

    #[serde(default = "default_client_email_env")]
    pub client_email_env: String,

    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,

    /// Variable whose value `development` enables the ambient fallback.
    #[serde(default = "default_environment_env")]
    pub environment_env: String,
}

fn default_fallback_dir() -> PathBuf {
    PathBuf::from("credentials")
}

fn default_adc_env() -> String {
    "GOOGLE_APPLICATION_CREDENTIALS".into()
}
fn default_base64_env() -> String {
    "FIREBASE_SERVICE_ACCOUNT_BASE64".into()
}
fn default_service_account_env() -> String {
    "FIREBASE_SERVICE_ACCOUNT".into()
}
fn default_project_id_env() -> String {
    "FIREBASE_PROJECT_ID".into()
}
fn default_client_email_env() -> String {
    "FIREBASE_CLIENT_EMAIL".into()
}
fn default_private_key_env() -> String {
    "FIREBASE_PRIVATE_KEY".into()
}
fn default_environment_env() -> String {
    "NODE_ENV".into()
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            fallback_dir: default_fallback_dir(),
            application_credentials_env: default_adc_env(),
            service_account_base64_env: default_base64_env(),
            service_account_env: default_service_account_env(),
            project_id_env: default_project_id_env(),
            client_email_env: default_client_email_env(),
            private_key_env: default_private_key_env(),
            environment_env: default_environment_env(),
        }
    }
}

// ---------------------------------------------------------------------------
// Users / permissions
// ---------------------------------------------------------------------------

/// Application user store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersConfig {
    /// Firestore collection holding application users.
    #[serde(default = "default_users_collection")]
    pub collection: String,

    /// Identity listing page size (1..=1000).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_users_collection() -> String {
    "users".into()
}
fn default_page_size() -> u32 {
    1000
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            collection: default_users_collection(),
            page_size: default_page_size(),
        }
    }
}

/// Permission inspector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsConfig {
    /// Collection inspected when none is given on the command line.
    #[serde(default = "default_permissions_collection")]
    pub collection: String,
}

fn default_permissions_collection() -> String {
    "userPermissions".into()
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            collection: default_permissions_collection(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AdminConfig {
    /// Load an [`AdminConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AdminConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Load from `path` when given, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(p) => Self::load_from_file(p)?,
            None => {
                debug!("no configuration file given, using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate that all values are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.users.page_size == 0 || self.users.page_size > 1000 {
            return Err(ConfigError::InvalidValue {
                field: "users.page_size".into(),
                detail: format!("{} is outside 1..=1000", self.users.page_size),
            });
        }
        if self.users.collection.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "users.collection".into(),
                detail: "collection name must not be empty".into(),
            });
        }
        if self.permissions.collection.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "permissions.collection".into(),
                detail: "collection name must not be empty".into(),
            });
        }
        if self.firebase.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "firebase.request_timeout_secs".into(),
                detail: "timeout must be > 0".into(),
            });
        }
        Ok(())
    }

    /// Build a [`CredentialConfig`] from the process environment.
    pub fn credential_config(&self) -> CredentialConfig {
        self.credential_config_from(|name| std::env::var(name).ok())
    }

    /// Build a [`CredentialConfig`] using `lookup` in place of the process
    /// environment.
    pub fn credential_config_from<F>(&self, lookup: F) -> CredentialConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        info!("resolving credential sources from environment");
        let creds = &self.credentials;
        let read = |env_name: &str| resolve_optional_env(&lookup, env_name);

        let project_id = read(&creds.project_id_env);
        let client_email = read(&creds.client_email_env);
        let private_key = read(&creds.private_key_env);

        let individual_key_fields = match (&project_id, &client_email, &private_key) {
            (Some(p), Some(c), Some(k)) => Some(KeyFields {
                project_id: p.clone(),
                client_email: c.clone(),
                private_key: k.clone(),
            }),
            (None, None, None) => None,
            _ => {
                warn!(
                    project_id = project_id.is_some(),
                    client_email = client_email.is_some(),
                    private_key = private_key.is_some(),
                    "incomplete individual key fields, ignoring them"
                );
                None
            }
        };

        let development_mode = read(&creds.environment_env)
            .map(|v| v.eq_ignore_ascii_case("development"))
            .unwrap_or(false);

        CredentialConfig {
            application_default_credentials_path: read(&creds.application_credentials_env)
                .map(PathBuf::from),
            fallback_credentials_directory: Some(creds.fallback_dir.clone()),
            base64_service_account: read(&creds.service_account_base64_env),
            service_account_json: read(&creds.service_account_env),
            individual_key_fields,
            project_id_override: project_id,
            development_mode,
            ambient_credentials_path: dirs::config_dir()
                .map(|d| d.join("gcloud").join("application_default_credentials.json")),
        }
    }

    /// Emulator hosts named by the configured environment variables.
    pub fn emulator_hosts(&self) -> (Option<String>, Option<String>) {
        let lookup = |name: &str| std::env::var(name).ok();
        (
            resolve_optional_env(&lookup, &self.firebase.auth_emulator_host_env),
            resolve_optional_env(&lookup, &self.firebase.firestore_emulator_host_env),
        )
    }
}

impl CredentialConfig {
    /// Credential sources from the process environment, using the default
    /// variable names.
    pub fn from_env() -> Self {
        AdminConfig::default().credential_config()
    }

    /// Like [`CredentialConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        AdminConfig::default().credential_config_from(lookup)
    }
}

/// Read a variable through `lookup`, treating empty values as unset.
fn resolve_optional_env<F>(lookup: &F, env_name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(env_name) {
        Some(val) if !val.trim().is_empty() => {
            debug!(env_name, "resolved env var");
            Some(val)
        }
        Some(_) => {
            warn!(env_name, "env var is set but empty");
            None
        }
        None => None,
    }
}
