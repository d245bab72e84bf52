//! Bounded user-data retrieval
//!
//! User-data is often not available yet at early boot, so fetching is
//! retried with a fixed delay until a shared deadline passes. Each attempt
//! fetches *and* parses: a payload that does not parse is treated the same
//! as one that has not arrived.

use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, warn};

use super::{CloudConfig, parse_userdata};
use crate::ProvisionError;
use crate::providers::UserDataProvider;

/// Outcome of a failed attempt
#[derive(Debug)]
pub enum AttemptError {
    /// Try again after the delay
    Retryable(ProvisionError),
    /// Retrying cannot help; stop now
    Fatal(ProvisionError),
}

/// Run `attempt` until it succeeds, fails fatally, or `deadline` passes
///
/// Attempts are spaced by a fixed `delay`. When the deadline passes the
/// last retryable error is returned wrapped in
/// [`ProvisionError::FetchTimeout`].
pub async fn retry_until<T, F, Fut>(
    deadline: Instant,
    delay: Duration,
    mut attempt: F,
) -> Result<T, ProvisionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;

        let last = match timeout_at(deadline, attempt()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(AttemptError::Fatal(err))) => return Err(err),
            Ok(Err(AttemptError::Retryable(err))) => err,
            Err(_) => ProvisionError::DeadlineExceeded,
        };

        if Instant::now() + delay >= deadline {
            return Err(ProvisionError::FetchTimeout {
                attempts,
                last: Box::new(last),
            });
        }

        warn!("Retry attempt {}: {}", attempts, last);
        sleep(delay).await;
    }
}

/// Fetch user-data once and validate it by parsing
async fn fetch_and_parse(provider: &dyn UserDataProvider) -> Result<CloudConfig, AttemptError> {
    let data = provider
        .get_user_data()
        .await
        .map_err(AttemptError::Retryable)?;
    debug!("Fetched {} bytes of user data from {}", data.len(), provider.name());

    parse_userdata(&data).map_err(|e| match e {
        ProvisionError::InvalidData(_) => AttemptError::Fatal(e),
        other => AttemptError::Retryable(other),
    })
}

/// Retrieve and parse the cloud-config from `provider` before `deadline`
pub async fn retrieve_cloud_config(
    provider: &dyn UserDataProvider,
    deadline: Instant,
) -> Result<CloudConfig, ProvisionError> {
    retry_until(deadline, provider.retry_delay(), || fetch_and_parse(provider)).await
}
