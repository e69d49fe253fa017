//! ClubGuard - account security toolkit
//!
//! Command-line access to the security layer:
//! - Input validation, sanitization and injection scanning
//! - Secret hashing and sensitive-data encryption
//! - CSRF token generation
//! - Role hierarchy checks

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;

use clubguard_common::config::LoggingConfig;
use clubguard_security::SecurityManager;

mod cli;
mod config;

#[derive(Parser)]
#[command(name = "clubguard")]
#[command(author, version, about = "ClubGuard - account security toolkit", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path (TOML, YAML or JSON)
    #[arg(short, long, default_value = "clubguard.toml", env = "CLUBGUARD_CONFIG")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a value as email, password, username, text or age
    Validate {
        #[arg(short, long)]
        kind: String,

        value: String,
    },

    /// Strip markup and script fragments from a value
    Sanitize { value: String },

    /// Check a value for SQL injection, XSS and suspicious-activity signatures
    Scan { value: String },

    /// Hash a secret with the configured salt
    Hash { secret: String },

    /// Encrypt a value with the configured key
    Encrypt { plaintext: String },

    /// Decrypt a value produced by `encrypt`
    Decrypt { ciphertext: String },

    /// Generate a CSRF token
    Token,

    /// Check whether a role satisfies any of the required roles
    CheckRole {
        #[arg(short, long)]
        actual: String,

        #[arg(short, long, num_args = 1.., required = true)]
        required: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load(&cli.config).await?;

    init_tracing(&config.logging)?;
    debug!(config = %cli.config, "Configuration loaded");

    let manager = SecurityManager::new(&config.security);

    let output = match cli.command {
        Commands::Validate { kind, value } => cli::validate(&manager, &kind, &value)?,
        Commands::Sanitize { value } => cli::sanitize(&manager, &value),
        Commands::Scan { value } => cli::scan(&manager, &value),
        Commands::Hash { secret } => cli::hash(&manager, &secret)?,
        Commands::Encrypt { plaintext } => cli::encrypt(&manager, &plaintext)?,
        Commands::Decrypt { ciphertext } => cli::decrypt(&manager, &ciphertext)?,
        Commands::Token => cli::token(&manager)?,
        Commands::CheckRole { actual, required } => cli::check_role(&manager, &actual, &required)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Initialize tracing; logs go to stderr so stdout stays machine-readable
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging.level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
