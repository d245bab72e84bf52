//! User-data providers for the clouds a peer-pod VM can boot on
//!
//! A provider knows how to recognise its environment and how to pull the
//! raw user-data blob from it. Detection walks an explicit, ordered list of
//! candidates and the first match wins.

pub mod aws;
pub mod azure;
pub mod docker;
pub mod mock;

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info};

use crate::ProvisionError;

/// Delay between user-data fetch attempts unless a provider says otherwise
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Trait for cloud user-data providers
#[async_trait]
pub trait UserDataProvider: Send + Sync {
    /// Name of this provider (e.g., "Azure", "AWS", "Docker")
    fn name(&self) -> &'static str;

    /// Check if we are running on this provider
    ///
    /// Local checks should be cheap; network probes are bounded by the
    /// client timeouts and by the caller's deadline.
    async fn is_this_provider(&self) -> bool;

    /// Fetch the raw user-data blob
    async fn get_user_data(&self) -> Result<Vec<u8>, ProvisionError>;

    /// Fixed delay between fetch attempts
    fn retry_delay(&self) -> Duration {
        DEFAULT_RETRY_DELAY
    }
}

/// Candidate providers in probe order
///
/// Docker only looks for a marker file, so it goes before the providers
/// that need an HTTP round trip.
pub fn default_providers() -> Result<Vec<Box<dyn UserDataProvider>>, ProvisionError> {
    Ok(vec![
        Box::new(docker::Docker::new()?),
        Box::new(azure::Azure::new()?),
        Box::new(aws::Aws::new()?),
    ])
}

/// Return the first candidate that recognises its environment
///
/// Probes that are still running when the deadline passes count as a miss.
pub async fn detect_provider(
    candidates: Vec<Box<dyn UserDataProvider>>,
    deadline: Instant,
) -> Result<Box<dyn UserDataProvider>, ProvisionError> {
    for provider in candidates {
        debug!("Probing user data provider: {}", provider.name());
        if timeout_at(deadline, provider.is_this_provider())
            .await
            .unwrap_or(false)
        {
            info!("Detected user data provider: {}", provider.name());
            return Ok(provider);
        }
    }

    Err(ProvisionError::UnsupportedProvider)
}

/// HTTP client used for metadata probes and fetches
pub(crate) fn http_client() -> Result<Client, ProvisionError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(5))
        .connect_timeout(Duration::from_secs(2))
        .build()?)
}
