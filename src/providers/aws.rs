//! AWS provider
//!
//! Fetches user-data from the EC2 Instance Metadata Service (IMDS).
//! Uses IMDSv2 when a session token can be obtained and falls back to IMDSv1.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use tracing::debug;

use super::{DEFAULT_RETRY_DELAY, UserDataProvider, http_client};
use crate::ProvisionError;

/// EC2 metadata service base URL (link-local address)
const IMDS_BASE_URL: &str = "http://169.254.169.254";

/// IMDSv2 token TTL in seconds
const TOKEN_TTL_SECONDS: u32 = 300;

/// AWS provider
pub struct Aws {
    client: Client,
    base_url: String,
    retry_delay: Duration,
}

impl Aws {
    pub fn new() -> Result<Self, ProvisionError> {
        Self::with_base_url(IMDS_BASE_URL)
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

    /// Get IMDSv2 token for authenticated requests
    async fn get_imdsv2_token(&self) -> Option<String> {
        let url = format!("{}/latest/api/token", self.base_url);
        let response = self
            .client
            .put(&url)
            .header(
                "X-aws-ec2-metadata-token-ttl-seconds",
                TOKEN_TTL_SECONDS.to_string(),
            )
            .send()
            .await
            .ok()?;

        if response.status().is_success() {
            response.text().await.ok()
        } else {
            None
        }
    }

    /// GET `path`, with the IMDSv2 token attached when available
    async fn get(&self, path: &str) -> Result<reqwest::Response, ProvisionError> {
        let url = format!("{}{}", self.base_url, path);
        let request: RequestBuilder = match self.get_imdsv2_token().await {
            Some(token) => {
                debug!("Using IMDSv2 for {}", path);
                self.client
                    .get(&url)
                    .header("X-aws-ec2-metadata-token", token)
            }
            None => {
                debug!("Falling back to IMDSv1 for {}", path);
                self.client.get(&url)
            }
        };
        Ok(request.send().await?)
    }
}

#[async_trait]
impl UserDataProvider for Aws {
    fn name(&self) -> &'static str {
        "AWS"
    }

    async fn is_this_provider(&self) -> bool {
        match self.get("/latest/meta-data/instance-id").await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("EC2 IMDS not reachable: {}", e);
                false
            }
        }
    }

    async fn get_user_data(&self) -> Result<Vec<u8>, ProvisionError> {
        debug!("provider: AWS, userDataUrl: {}/latest/user-data", self.base_url);

        let response = self.get("/latest/user-data").await?;

        // 404 means no user-data configured (yet)
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
