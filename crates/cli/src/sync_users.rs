//! Link every Firebase Auth identity to an application user.
//!
//! Walks all identities page by page. Users found by email get their
//! `googleId` set when it is missing or stale; identities with no matching
//! user get a new one. Nothing is deleted.

mod common;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use docvault_core::identity::FirebaseAuthDirectory;
use docvault_core::reconcile::{ReconcileOptions, ReconcileStats, Reconciler};
use docvault_core::store::FirestoreUserStore;

/// Reconcile Firebase Auth identities with DocVault application users.
#[derive(Parser, Debug)]
#[command(name = "docvault-sync-users", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Report what would change without writing anything.
    #[arg(long)]
    dry_run: bool,

    /// Identities fetched per page (1-1000). Defaults to the configured value.
    #[arg(long)]
    page_size: Option<u32>,

    /// Log filter, e.g. `debug` or `docvault_core=trace`.
    #[arg(long)]
    log_level: Option<String>,

    /// Print the run summary as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => common::report_failure(&e, common::EXIT_FAILURE),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config =
        common::load_config(cli.config.as_deref()).context("failed to load configuration")?;
    common::init_logging(cli.log_level.as_deref(), &config);

    let handle = common::connect(&config).context("failed to initialize Firebase admin access")?;
    let options = ReconcileOptions {
        page_size: cli.page_size.unwrap_or(config.users.page_size),
        dry_run: cli.dry_run,
    };
    info!(
        project_id = handle.project_id(),
        collection = %config.users.collection,
        "starting user reconciliation"
    );

    let reconciler = Reconciler::new(
        Arc::new(FirebaseAuthDirectory::new(handle.clone())),
        Arc::new(FirestoreUserStore::new(handle, config.users.collection.clone())),
        options,
    );
    let stats = reconciler
        .run()
        .await
        .context("user reconciliation failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_summary(&stats);
    }
    Ok(())
}

fn print_summary(stats: &ReconcileStats) {
    if stats.dry_run {
        println!("Dry run: no changes were written.");
        println!();
    }
    println!("User reconciliation summary:");
    println!("  Pages fetched     : {}", stats.pages);
    println!("  Identities seen   : {}", stats.processed);
    println!("  Skipped (no email): {}", stats.skipped_no_email);
    println!("  Already linked    : {}", stats.unchanged);
    println!("  Links updated     : {}", stats.updated);
    println!("  Users created     : {}", stats.created);
}
