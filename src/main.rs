use anyhow::Result;
use clap::Parser;
use gmail_label_sync::cli::{self, Cli, Commands};
use gmail_label_sync::error::SyncError;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Exit with proper code on error
    if let Err(e) = run().await {
        display_error(&e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Install default crypto provider for rustls
    // This is necessary because multiple dependencies use different crypto providers
    // On non-Windows platforms, use aws-lc-rs (better performance, FIPS support)
    // On Windows, use ring (better compatibility, no NASM/CMake required)
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    match cli.command() {
        Commands::Sync => {
            tracing::info!("Gmail label sync starting...");
            let config = cli.resolve_config().await?;
            let report = cli::run_sync(&config).await?;
            cli::print_summary(report.as_ref());
            Ok(())
        }

        Commands::Auth { force } => {
            tracing::info!("Authenticating with Gmail API...");
            let config = cli.resolve_config().await?;
            let summary = cli::run_auth(&config, force).await?;

            println!("Successfully authenticated with Gmail API");
            println!("Application: {}", summary.application_name);
            println!(
                "Credential stored in: {:?}",
                config.auth.tokens_directory
            );
            println!("Connected to account: {}", summary.email);
            Ok(())
        }

        Commands::InitConfig { output, force } => {
            tracing::info!("Generating example configuration file");
            cli::run_init_config(&output, force).await?;

            println!("Created example configuration file at: {:?}", output);
            println!("\nPlease edit this file to customize your settings.");
            println!("Key settings to review:");
            println!("  - labels.definitions: labels that must exist, with hex colors");
            println!("  - auth.credentials_path: OAuth client JSON from Google Cloud Console");
            println!("  - auth.port: local port for the authorization callback");
            Ok(())
        }
    }
}

/// RUST_LOG when set, otherwise `info`. `--verbose` adds crate debug on top of either.
fn log_filter(verbose: bool) -> EnvFilter {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if !verbose {
        return filter;
    }

    match "gmail_label_sync=debug".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

fn init_logging(verbose: bool, json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Display error with context
fn display_error(error: &anyhow::Error) {
    eprintln!("Error: {}", error);

    for cause in error.chain().skip(1) {
        eprintln!("  Caused by: {}", cause);
    }

    if let Some(sync_err) = error.downcast_ref::<SyncError>() {
        match sync_err {
            SyncError::ConfigError(_) => {
                eprintln!("\nHint: Check your configuration file and credentials path.");
                eprintln!("      Run: gmail-labels init-config --force");
            }
            SyncError::AuthError(_) | SyncError::ConsentTimeout(_) => {
                eprintln!("\nHint: Make sure your credentials.json file is valid.");
                eprintln!("      Try running: gmail-labels auth --force");
            }
            _ => {}
        }
    }
}
