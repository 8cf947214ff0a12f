//! Command-line interface

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::auth::{credential_manager, obtain_credential};
use crate::client::AuthenticatedChannel;
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::models::ReconciliationReport;
use crate::reconciler::LabelReconciler;

#[derive(Parser, Debug)]
#[command(name = "gmail-labels")]
#[command(version)]
#[command(about = "Make sure the configured Gmail labels exist", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 client credentials file (overrides config)
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Directory holding stored credentials (overrides config)
    #[arg(long)]
    pub tokens_dir: Option<PathBuf>,

    /// Local port for the authorization callback (overrides config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Authorize, then create any configured labels that are missing (default)
    Sync,

    /// Authenticate with Gmail API
    Auth {
        /// Discard the stored credential and ask for consent again
        #[arg(long)]
        force: bool,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Sync)
    }

    /// Load the config file, then layer command-line overrides on top
    pub async fn resolve_config(&self) -> Result<Config> {
        let mut config = Config::load(&self.config).await?;

        if let Some(credentials) = &self.credentials {
            config.auth.credentials_path = credentials.clone();
        }
        if let Some(tokens_dir) = &self.tokens_dir {
            config.auth.tokens_directory = tokens_dir.clone();
        }
        if let Some(port) = self.port {
            config.auth.port = port;
        }

        config.validate()?;
        Ok(config)
    }
}

/// What the `auth` command reports once authorized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSummary {
    pub email: String,
    pub application_name: String,
}

/// Authorize and open a channel with the configured scopes.
/// `force` drops the stored credential first so consent is asked again.
async fn connect(config: &Config, force: bool) -> Result<AuthenticatedChannel> {
    if force {
        let manager = credential_manager(
            &config.auth.credentials_path,
            &config.auth.tokens_directory,
            config,
        )
        .await?;
        if manager.forget().await? {
            info!("Removed stored credential for '{}'", manager.user_key());
        }
    }

    let scopes: Vec<&str> = config.auth.scopes.iter().map(String::as_str).collect();
    obtain_credential(
        &config.auth.credentials_path,
        &config.auth.tokens_directory,
        &scopes,
        config,
    )
    .await
}

/// Startup sequence: authorize (fatal on failure), then one label pass
/// whose failure is logged but not fatal
pub async fn run_sync(config: &Config) -> Result<Option<ReconciliationReport>> {
    let channel = connect(config, false).await?;
    info!("Gmail service initialized.");

    let reconciler = LabelReconciler::new(Box::new(channel), config.labels.duplicates);
    Ok(reconciler.run_startup_pass(&config.labels.definitions).await)
}

/// Authorize only and report the connected account
pub async fn run_auth(config: &Config, force: bool) -> Result<AuthSummary> {
    let channel = connect(config, force).await?;
    Ok(AuthSummary {
        email: channel.profile_email().await?,
        application_name: channel.application_name().to_string(),
    })
}

pub async fn run_init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(SyncError::ConfigError(format!(
            "Configuration file already exists at {:?}. Use --force to overwrite.",
            output
        )));
    }

    Config::create_example(output).await
}

/// Human-readable summary of a reconciliation pass
pub fn print_summary(report: Option<&ReconciliationReport>) {
    println!("\n========================================");
    println!("Label Sync Summary");
    println!("========================================");
    match report {
        Some(report) if report.is_noop() => {
            println!("No labels configured.");
        }
        Some(report) => {
            println!("Labels created: {}", report.created.len());
            for label in &report.created {
                println!("  + {} ({})", label.name, label.id);
            }
            println!("Labels already present: {}", report.skipped.len());
        }
        None => {
            warn!("Label pass did not complete");
            println!("Label pass failed; see the log above for details.");
        }
    }
    println!("========================================");
}
