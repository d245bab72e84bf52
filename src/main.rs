//! peerpod-provision - guest-side user-data provisioning for peer-pod VMs
//!
//! Writes the configuration carried in cloud user-data under the trusted
//! root and computes the initdata digest consumed by the attester.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use peerpod_provision::config::CONFIG_PARENT;
use peerpod_provision::{Config, ProvisionOutcome, modules, provision_files};

#[derive(Parser)]
#[command(name = "peerpod-provision")]
#[command(author, version, about = "Provision peer-pod config files from cloud user-data", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Seconds to keep retrying the user-data fetch
    #[arg(long, env = "PEERPOD_FETCH_TIMEOUT", default_value_t = 180)]
    fetch_timeout: u64,

    /// Trusted root for provisioned files (absolute path)
    #[arg(long, env = "PEERPOD_CONFIG_DIR", default_value = CONFIG_PARENT, value_parser = parse_config_dir)]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch user-data, write config files and compute the digest
    Provision,
    /// Only compute the initdata digest
    Digest,
    /// Write the initdata TOML bundle
    Initdata,
}

/// Only an absolute root can contain the absolute paths user-data names
fn parse_config_dir(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);
    if path.is_absolute() {
        Ok(path)
    } else {
        Err(format!("config dir must be an absolute path, got '{}'", s))
    }
}

fn init_logging(verbosity: u8) -> anyhow::Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // RUST_LOG, when set, overrides the -v flags
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let cfg = Config::with_parent(&cli.config_dir, Duration::from_secs(cli.fetch_timeout));

    match cli.command.unwrap_or(Commands::Provision) {
        Commands::Provision => {
            let outcome = provision_files(&cfg)
                .await
                .context("failed to provision files")?;
            match outcome {
                ProvisionOutcome::Provisioned {
                    provider, files, ..
                } => info!("Provisioned {} file(s) from {}", files, provider),
                ProvisionOutcome::DigestOnly { .. } => {
                    info!("No user data provider, digest-only run")
                }
            }
        }
        Commands::Digest => {
            let digest = modules::calculate_userdata_hash(&cfg)
                .await
                .context("failed to calculate initdata hash")?;
            info!("Initdata digest: {}", digest);
        }
        Commands::Initdata => {
            modules::construct_userdata(&cfg)
                .await
                .context("failed to construct initdata")?;
        }
    }

    Ok(())
}
