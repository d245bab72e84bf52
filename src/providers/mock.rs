//! Mock provider for testing
//!
//! Provides a scripted user-data provider that can be used in unit and
//! integration tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use super::UserDataProvider;
use crate::ProvisionError;

/// Mock provider for testing
///
/// Scripted responses are served first, in order; once they run out every
/// call returns the configured user-data.
///
/// # Example
/// ```
/// use peerpod_provision::providers::mock::MockProvider;
///
/// let mock = MockProvider::new()
///     .with_user_data("write_files: []")
///     .with_failures(2, "%$#");
/// ```
pub struct MockProvider {
    name: &'static str,
    available: bool,
    user_data: Vec<u8>,
    scripted: Mutex<VecDeque<Result<Vec<u8>, String>>>,
    retry_delay: Duration,
    calls: AtomicU32,
}

impl MockProvider {
    /// Create a new mock provider with default values
    pub fn new() -> Self {
        Self {
            name: "Mock",
            available: true,
            user_data: b"write_files: []".to_vec(),
            scripted: Mutex::new(VecDeque::new()),
            retry_delay: Duration::from_millis(1),
            calls: AtomicU32::new(0),
        }
    }

    /// Set the provider name
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Set whether the provider matches its environment
    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Set the user-data returned once scripted responses are exhausted
    pub fn with_user_data(mut self, user_data: impl AsRef<[u8]>) -> Self {
        self.user_data = user_data.as_ref().to_vec();
        self
    }

    /// Serve `payload` for the next `count` calls
    pub fn with_failures(self, count: u32, payload: impl AsRef<[u8]>) -> Self {
        {
            let mut scripted = self.scripted.lock().unwrap_or_else(|e| e.into_inner());
            for _ in 0..count {
                scripted.push_back(Ok(payload.as_ref().to_vec()));
            }
        }
        self
    }

    /// Fail the next call with a fetch error
    pub fn with_error(self, message: &str) -> Self {
        self.scripted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(message.to_string()));
        self
    }

    /// Set the delay between attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Number of `get_user_data` calls so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDataProvider for MockProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn is_this_provider(&self) -> bool {
        self.available
    }

    async fn get_user_data(&self) -> Result<Vec<u8>, ProvisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let next = self
            .scripted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match next {
            Some(Ok(data)) => Ok(data),
            Some(Err(message)) => Err(ProvisionError::fetch(self.name, message)),
            None => Ok(self.user_data.clone()),
        }
    }

    fn retry_delay(&self) -> Duration {
        self.retry_delay
    }
}
