//! peerpod-provision library
//!
//! Guest-side provisioning for confidential peer-pod VMs: pull user-data from
//! the cloud metadata channel, write the configuration it carries under one
//! trusted directory, and digest the static configuration files for the
//! attester.
//!
//! # Pipeline
//!
//! 1. Detect the provider (first matching candidate wins)
//! 2. Fetch and parse user-data, retrying until the fetch deadline
//! 3. Write the `write_files` entries under the trusted root
//! 4. Compute the initdata digest
//!
//! Step 4 always runs. When no provider is detected steps 2 and 3 are
//! skipped and the run finishes in digest-only mode.

pub mod config;
pub mod modules;
pub mod providers;
pub mod userdata;

mod error;

pub use config::Config;
pub use error::ProvisionError;

use providers::UserDataProvider;
use tokio::time::Instant;
use tracing::{info, warn};

/// Provisioning pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Probe candidate providers
    Detect,
    /// Fetch and parse user-data
    Fetch,
    /// Write files under the trusted root
    Materialize,
    /// Compute the initdata digest
    Digest,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Detect => write!(f, "detect"),
            Stage::Fetch => write!(f, "fetch"),
            Stage::Materialize => write!(f, "materialize"),
            Stage::Digest => write!(f, "digest"),
        }
    }
}

/// How a successful run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// User-data was fetched and written, then digested
    Provisioned {
        provider: &'static str,
        files: usize,
        digest: String,
    },
    /// No provider matched; only the digest was computed
    DigestOnly { digest: String },
}

impl ProvisionOutcome {
    pub fn digest(&self) -> &str {
        match self {
            Self::Provisioned { digest, .. } | Self::DigestOnly { digest } => digest,
        }
    }
}

/// Run the full pipeline against the default provider list
pub async fn provision_files(cfg: &Config) -> Result<ProvisionOutcome, ProvisionError> {
    provision_with(cfg, providers::default_providers()?).await
}

/// Run the full pipeline against an explicit candidate list
pub async fn provision_with(
    cfg: &Config,
    candidates: Vec<Box<dyn UserDataProvider>>,
) -> Result<ProvisionOutcome, ProvisionError> {
    let deadline = Instant::now() + cfg.fetch_timeout();

    info!("Starting stage: {}", Stage::Detect);
    let provided = match providers::detect_provider(candidates, deadline).await {
        Ok(provider) => Some(provision_from(cfg, provider.as_ref(), deadline).await?),
        Err(e) if e.is_soft() => {
            warn!(
                "{}, skipping config provisioning and calculating initdata digest only",
                e
            );
            None
        }
        Err(e) => return Err(e),
    };

    info!("Starting stage: {}", Stage::Digest);
    let digest = modules::calculate_userdata_hash(cfg).await?;
    info!("Completed stage: {}", Stage::Digest);

    Ok(match provided {
        Some((provider, files)) => ProvisionOutcome::Provisioned {
            provider,
            files,
            digest,
        },
        None => ProvisionOutcome::DigestOnly { digest },
    })
}

async fn provision_from(
    cfg: &Config,
    provider: &dyn UserDataProvider,
    deadline: Instant,
) -> Result<(&'static str, usize), ProvisionError> {
    info!("Starting stage: {}", Stage::Fetch);
    let cloud_config = userdata::retrieve_cloud_config(provider, deadline).await?;
    info!(
        "Completed stage: {} ({} file entries)",
        Stage::Fetch,
        cloud_config.len()
    );

    info!("Starting stage: {}", Stage::Materialize);
    let files = modules::write_files(cfg, &cloud_config).await?;
    info!("Completed stage: {}", Stage::Materialize);

    Ok((provider.name(), files))
}
