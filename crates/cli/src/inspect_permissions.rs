//! Print sidebar capability flags from the permission collection.
//!
//! With no document id every document in the collection is read as one
//! user's permissions. With a document id that single document is read as a
//! map from email to capabilities.

mod common;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use docvault_core::permissions::PermissionInspector;
use docvault_core::store::FirestoreDocuments;

/// Inspect DocVault sidebar permissions.
#[derive(Parser, Debug)]
#[command(name = "docvault-inspect-permissions", version)]
struct Cli {
    /// Collection to read. Defaults to the configured permission collection.
    #[arg(env = "COLLECTION")]
    collection: Option<String>,

    /// Read only this document, as an email -> capabilities map.
    #[arg(env = "DOC_ID")]
    doc_id: Option<String>,

    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug`.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Collection and document to read. Blank values count as absent; the
    /// collection then falls back to `default_collection`.
    fn target(&self, default_collection: &str) -> (String, Option<String>) {
        let collection = self
            .collection
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(default_collection)
            .to_string();
        let doc_id = self
            .doc_id
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        (collection, doc_id)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => common::report_failure(&e, common::EXIT_CONFIG_MISSING),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config =
        common::load_config(cli.config.as_deref()).context("failed to load configuration")?;
    common::init_logging(cli.log_level.as_deref(), &config);

    let (collection, doc_id) = cli.target(&config.permissions.collection);

    let handle = common::connect(&config).context("failed to initialize Firebase admin access")?;
    let inspector = PermissionInspector::new(Arc::new(FirestoreDocuments::new(handle)));
    let outcome = inspector
        .inspect(&collection, doc_id.as_deref())
        .await
        .with_context(|| format!("failed to read permissions from '{collection}'"))?;

    print!("{outcome}");
    Ok(())
}
