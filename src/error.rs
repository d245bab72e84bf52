//! Error types for peerpod-provision

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for provisioning operations
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Unsupported user data provider")]
    UnsupportedProvider,

    #[error("Timed out fetching user data after {attempts} attempt(s): {last}")]
    FetchTimeout {
        attempts: u32,
        #[source]
        last: Box<ProvisionError>,
    },

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Failed to get user data from {provider}: {message}")]
    Fetch { provider: String, message: String },

    #[error("Failed to parse user data: {0}")]
    Parse(String),

    #[error("Path {} is not in folder {}", path.display(), parent.display())]
    PathScopeViolation { path: PathBuf, parent: PathBuf },

    #[error("Invalid daemon config {}: {message}", path.display())]
    DaemonConfig { path: PathBuf, message: String },

    #[error("Initdata algorithm '{0}' is not supported")]
    UnsupportedDigestAlgorithm(String),

    #[error("Static file {} does not exist", .0.display())]
    MissingStaticFile(PathBuf),

    #[error("Failed to read initdata meta {}: {message}", path.display())]
    InitdataMeta { path: PathBuf, message: String },

    #[error("Failed to read file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl ProvisionError {
    /// Create a fetch error for the named provider
    pub fn fetch(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a daemon config error
    pub fn daemon_config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::DaemonConfig {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Soft errors let the pipeline continue in digest-only mode
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::UnsupportedProvider)
    }
}

impl From<serde_yaml::Error> for ProvisionError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for ProvisionError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}
