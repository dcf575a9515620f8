//! PixHub administrative CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pix_adapters::settings::Settings;
use pix_adapters::{bootstrap, CallContext};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// PixHub provider administration
#[derive(Parser)]
#[command(name = "pixctl", version, about, long_about = None)]
struct Cli {
    /// Settings file (TOML, YAML or JSON); `PIX__*` variables override it
    #[arg(short, long, env = "PIX_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a fresh base64 256-bit credential key
    Keygen,

    /// Encrypt a value with the configured key
    Encrypt {
        /// Plaintext
        value: String,
    },

    /// Decrypt a value produced by `encrypt`
    Decrypt {
        /// Ciphertext token
        value: String,
    },

    /// Check every configured provider
    Health {
        /// Overall deadline in seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Keygen => {
            println!("{}", pix_security::generate_key_base64());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Encrypt { value } => {
            let cipher = load_settings(cli.config)?.cipher()?;
            println!("{}", cipher.encrypt(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Decrypt { value } => {
            let cipher = load_settings(cli.config)?.cipher()?;
            println!("{}", cipher.decrypt(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Health { timeout, json } => health(cli.config, timeout, json).await,
    }
}

fn load_settings(path: Option<PathBuf>) -> Result<Settings> {
    Settings::load(path.as_deref()).with_context(|| match &path {
        Some(path) => format!("loading settings from {}", path.display()),
        None => "loading settings from environment".to_string(),
    })
}

async fn health(config: Option<PathBuf>, timeout: u64, json: bool) -> Result<ExitCode> {
    let settings = load_settings(config)?;
    let registry = bootstrap::build_registry(&settings)?;
    if registry.is_empty() {
        anyhow::bail!("no providers configured");
    }

    let manager = bootstrap::build_manager(&settings, registry);
    let ctx = CallContext::new().with_timeout(Duration::from_secs(timeout));
    let snapshot = manager.check_all(&ctx).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!("{:<18} {:>8}  {:<10} ERROR", "PROVIDER", "PRIORITY", "STATUS");
        for row in &snapshot {
            println!(
                "{:<18} {:>8}  {:<10} {}",
                row.code,
                row.priority,
                row.status.as_str(),
                row.last_error.as_deref().unwrap_or("-")
            );
        }
    }

    let all_healthy = snapshot.iter().all(|row| row.eligible);
    Ok(if all_healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
