//! Docker provider
//!
//! Peer-pods running as containers have no IMDS. The runtime serves the
//! user-data over plain HTTP on the bridge network instead, and the
//! environment is recognised by the `/.dockerenv` marker file.

use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use super::{DEFAULT_RETRY_DELAY, UserDataProvider, http_client};
use crate::ProvisionError;

/// Marker file created by the Docker runtime
const DOCKER_MARKER: &str = "/.dockerenv";

/// Endpoint serving the pod's user-data
const DOCKER_USER_DATA_URL: &str = "http://172.17.0.1:7900/userdata";

/// Docker provider
pub struct Docker {
    client: Client,
    marker: PathBuf,
    url: String,
    retry_delay: Duration,
}

impl Docker {
    pub fn new() -> Result<Self, ProvisionError> {
        Ok(Self {
            client: http_client()?,
            marker: PathBuf::from(DOCKER_MARKER),
            url: DOCKER_USER_DATA_URL.to_string(),
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Use a custom user-data URL (for testing)
    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    /// Set the delay between fetch attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Use a custom marker file (for testing)
    pub fn with_marker(mut self, marker: impl Into<PathBuf>) -> Self {
        self.marker = marker.into();
        self
    }
}

#[async_trait]
impl UserDataProvider for Docker {
    fn name(&self) -> &'static str {
        "Docker"
    }

    async fn is_this_provider(&self) -> bool {
        tokio::fs::metadata(&self.marker).await.is_ok()
    }

    async fn get_user_data(&self) -> Result<Vec<u8>, ProvisionError> {
        debug!("provider: Docker, userDataUrl: {}", self.url);

        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(ProvisionError::fetch(
                self.name(),
                format!("unexpected status {}", response.status()),
            ));
        }

        Ok(response.bytes().await?.to_vec())
    }

    fn retry_delay(&self) -> Duration {
        self.retry_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_docker_marker_detection() {
        let temp = TempDir::new().unwrap();
        let marker = temp.path().join(".dockerenv");

        let docker = Docker::new().unwrap().with_marker(&marker);
        assert!(!docker.is_this_provider().await);

        std::fs::write(&marker, "").unwrap();
        assert!(docker.is_this_provider().await);
    }

    #[test]
    fn test_docker_defaults() {
        let docker = Docker::new().unwrap();
        assert_eq!(docker.name(), "Docker");
        assert_eq!(docker.url, DOCKER_USER_DATA_URL);
        assert_eq!(docker.marker, PathBuf::from("/.dockerenv"));
    }
}
