//! Gmail Label Sync
//!
//! Authorizes against the Gmail API once, keeps the delegated credential on
//! disk for later runs, and makes sure every label named in configuration
//! exists in the mailbox.
//!
//! # Overview
//!
//! - **Credentials**: client identity file, keyed token store, loopback
//!   consent flow and silent refresh
//! - **Reconciliation**: list the mailbox labels once, create whichever
//!   configured labels are missing, never touch the rest
//!
//! # Example Usage
//!
//! ```no_run
//! use gmail_label_sync::{auth, config::Config, reconciler::LabelReconciler};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!
//!     let channel = auth::obtain_credential(
//!         &config.auth.credentials_path,
//!         &config.auth.tokens_directory,
//!         &[auth::FULL_MAILBOX_SCOPE],
//!         &config,
//!     )
//!     .await?;
//!
//!     let reconciler = LabelReconciler::new(Box::new(channel), config.labels.duplicates);
//!     let report = reconciler.reconcile(&config.labels.definitions).await?;
//!     println!("created: {:?}", report.created_names());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - Client identity, credential manager and channel token source
//! - [`authority`] - Token endpoint client for code exchange and refresh
//! - [`cli`] - Command-line interface and startup orchestration
//! - [`client`] - Label API trait and the authenticated Gmail channel
//! - [`config`] - Configuration management
//! - [`consent`] - Loopback receiver for the authorization redirect
//! - [`error`] - Error types and result aliases
//! - [`models`] - Core data structures
//! - [`reconciler`] - Name-based label reconciliation
//! - [`token_store`] - File-backed credential persistence

pub mod auth;
pub mod authority;
pub mod cli;
pub mod client;
pub mod config;
pub mod consent;
pub mod error;
pub mod models;
pub mod reconciler;
pub mod token_store;

// Re-export commonly used types for convenience
pub use error::{Result, SyncError};

// Core data models
pub use models::{CreatedLabel, LabelDefinition, NewLabel, ReconciliationReport, RemoteLabel};

// Config types
pub use config::{ApiConfig, AuthConfig, Config, DuplicatePolicy, LabelsConfig, ProcessingConfig};

// Credential handling
pub use auth::{obtain_credential, ClientIdentity, CredentialManager, CredentialState};
pub use authority::{CredentialAuthority, HttpCredentialAuthority, TokenGrant};
pub use consent::{ConsentReceiver, LocalCallbackReceiver};
pub use token_store::{DelegatedCredential, TokenStore};

// Client traits
pub use client::{AuthenticatedChannel, LabelApi};

pub use reconciler::{reconcile, LabelReconciler};

// CLI types (for binary usage)
pub use cli::{Cli, Commands};
