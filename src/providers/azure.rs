//! Azure IMDS provider
//!
//! Fetches user-data from the Azure Instance Metadata Service.
//! <https://learn.microsoft.com/en-us/azure/virtual-machines/instance-metadata-service>

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{DEFAULT_RETRY_DELAY, UserDataProvider, http_client};
use crate::ProvisionError;

/// Azure IMDS base URL (link-local address)
const AZURE_IMDS_URL: &str = "http://169.254.169.254";

/// API version for Azure IMDS
const AZURE_API_VERSION: &str = "2021-01-01";

/// Azure IMDS provider
pub struct Azure {
    client: Client,
    base_url: String,
    retry_delay: Duration,
}

impl Azure {
    pub fn new() -> Result<Self, ProvisionError> {
        Self::with_base_url(AZURE_IMDS_URL)
    }

    /// Create with a custom base URL (for testing)
    pub fn with_base_url(base_url: &str) -> Result<Self, ProvisionError> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Set the delay between fetch attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn user_data_url(&self) -> String {
        format!(
            "{}/metadata/instance/compute/userData?api-version={}&format=text",
            self.base_url, AZURE_API_VERSION
        )
    }
}

#[async_trait]
impl UserDataProvider for Azure {
    fn name(&self) -> &'static str {
        "Azure"
    }

    async fn is_this_provider(&self) -> bool {
        let url = format!(
            "{}/metadata/instance/compute?api-version={}&format=json",
            self.base_url, AZURE_API_VERSION
        );
        match self
            .client
            .get(&url)
            .header("Metadata", "true")
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Azure IMDS not reachable: {}", e);
                false
            }
        }
    }

    async fn get_user_data(&self) -> Result<Vec<u8>, ProvisionError> {
        let url = self.user_data_url();
        debug!("provider: Azure, userDataUrl: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Metadata", "true")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProvisionError::fetch(
                self.name(),
                format!("unexpected status {}", response.status()),
            ));
        }

        // Azure serves user-data base64 encoded; plain text is not accepted
        let body = response.text().await?;
        BASE64
            .decode(body.trim())
            .map_err(|e| ProvisionError::fetch(self.name(), format!("invalid base64: {}", e)))
    }

    fn retry_delay(&self) -> Duration {
        self.retry_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_azure_default() {
        let azure = Azure::new().unwrap();
        assert_eq!(azure.name(), "Azure");
        assert_eq!(azure.base_url, AZURE_IMDS_URL);
    }

    #[test]
    fn test_user_data_url() {
        let azure = Azure::with_base_url("http://127.0.0.1:8080/").unwrap();
        assert_eq!(
            azure.user_data_url(),
            "http://127.0.0.1:8080/metadata/instance/compute/userData?api-version=2021-01-01&format=text"
        );
    }
}
