//! Startup shared by the operator binaries: configuration, logging and the
//! admin handle.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use docvault_core::config::AdminConfig;
use docvault_core::credentials::{AdminHandle, CredentialResolver, Endpoints};
use docvault_core::errors::{ConfigError, CoreError};

/// Exit status for any unrecoverable error.
pub const EXIT_FAILURE: u8 = 1;

/// Exit status of the inspector when the `--config` file does not exist.
#[allow(dead_code)] // docvault-sync-users never exits 2
pub const EXIT_CONFIG_MISSING: u8 = 2;

/// Load the configuration file, or defaults when none was given.
pub fn load_config(path: Option<&Path>) -> Result<AdminConfig, CoreError> {
    Ok(AdminConfig::load_or_default(path)?)
}

/// Install the tracing subscriber. The level comes from `--log-level`, then
/// `RUST_LOG`, then the configuration file.
pub fn init_logging(cli_level: Option<&str>, config: &AdminConfig) {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve credentials and build the admin handle, honouring emulator hosts.
pub fn connect(config: &AdminConfig) -> Result<Arc<AdminHandle>, CoreError> {
    let (auth_emulator, firestore_emulator) = config.emulator_hosts();
    let endpoints = Endpoints::from_config(
        &config.firebase,
        auth_emulator.as_deref(),
        firestore_emulator.as_deref(),
    );
    let resolver = CredentialResolver::new(
        config.credential_config(),
        endpoints,
        Duration::from_secs(config.firebase.request_timeout_secs),
    );
    Ok(resolver.resolve()?)
}

/// Map a failure to the process exit status. A missing configuration file
/// exits with `config_missing`; everything else with [`EXIT_FAILURE`].
fn exit_status(err: &anyhow::Error, config_missing: u8) -> u8 {
    match err.downcast_ref::<CoreError>() {
        Some(CoreError::Config(ConfigError::FileNotFound(_))) => config_missing,
        _ => EXIT_FAILURE,
    }
}

/// Print the error chain to stderr and return the matching exit status.
pub fn report_failure(err: &anyhow::Error, config_missing: u8) -> ExitCode {
    eprintln!("Error: {:#}", err);
    ExitCode::from(exit_status(err, config_missing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use docvault_core::errors::CredentialError;

    fn wrapped(err: CoreError) -> anyhow::Error {
        Err::<(), _>(err).context("startup failed").unwrap_err()
    }

    #[test]
    fn test_missing_config_file_status_is_per_binary() {
        let err = wrapped(ConfigError::FileNotFound("/etc/docvault.toml".into()).into());
        assert_eq!(exit_status(&err, EXIT_CONFIG_MISSING), 2);
        assert_eq!(exit_status(&err, EXIT_FAILURE), 1);
    }

    #[test]
    fn test_missing_credentials_exit_1() {
        let err = wrapped(CredentialError::NotFound.into());
        assert_eq!(exit_status(&err, EXIT_CONFIG_MISSING), 1);
        assert_eq!(exit_status(&err, EXIT_FAILURE), 1);
    }

    #[test]
    fn test_other_failures_exit_1() {
        let err = wrapped(
            CredentialError::Configuration {
                source_name: "FIREBASE_SERVICE_ACCOUNT".into(),
                detail: "not JSON".into(),
            }
            .into(),
        );
        assert_eq!(exit_status(&err, EXIT_CONFIG_MISSING), 1);
        assert_eq!(exit_status(&anyhow::anyhow!("boom"), EXIT_CONFIG_MISSING), 1);
    }

    #[test]
    fn test_load_config_defaults_without_path() {
        let config = load_config(None).unwrap();
        assert_eq!(config.permissions.collection, "userPermissions");
    }
}
