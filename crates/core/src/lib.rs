//! DocVault operator core library.
//!
//! This crate provides the pieces shared by the DocVault admin tools:
//! configuration, credential resolution, Firebase Auth and Firestore clients,
//! the user reconciliation engine, and the sidebar permission inspector.

pub mod config;
pub mod credentials;
pub mod errors;
mod http;
pub mod identity;
pub mod models;
pub mod permissions;
pub mod reconcile;
pub mod store;

// Re-exports for convenience.
pub use config::AdminConfig;
pub use credentials::{AdminHandle, CredentialResolver};
pub use permissions::PermissionInspector;
pub use reconcile::Reconciler;
