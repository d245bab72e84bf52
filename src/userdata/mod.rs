//! User-data parsing
//!
//! Peer-pod user-data is a restricted cloud-config document that carries
//! only a `write_files` list. Decoding is strict: any other top-level key,
//! or any unknown key inside an entry, is rejected.

pub mod fetch;

pub use fetch::{AttemptError, retrieve_cloud_config, retry_until};

use crate::ProvisionError;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::io::Read;
use tracing::debug;

/// Optional header line accepted at the top of user-data
const CLOUD_CONFIG_HEADER: &str = "#cloud-config";

/// Gzip magic bytes
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Upper bound on (decompressed) user-data size
pub const MAX_USER_DATA_SIZE: usize = 1024 * 1024;

/// File to write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteFile {
    pub path: String,
    #[serde(default)]
    pub content: String,
}

/// Parsed peer-pod cloud-config
///
/// Entries keep their document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CloudConfig {
    #[serde(default)]
    pub write_files: Vec<WriteFile>,
}

impl CloudConfig {
    /// Parse cloud-config from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ProvisionError> {
        let yaml = yaml.trim_start();
        let yaml = yaml.strip_prefix(CLOUD_CONFIG_HEADER).unwrap_or(yaml);

        if yaml.trim().is_empty() {
            return Err(ProvisionError::Parse("empty user data".to_string()));
        }

        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Number of files this config writes
    pub fn len(&self) -> usize {
        self.write_files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.write_files.is_empty()
    }
}

/// Parse raw user-data bytes into a [`CloudConfig`]
pub fn parse_userdata(data: &[u8]) -> Result<CloudConfig, ProvisionError> {
    if data.is_empty() {
        return Err(ProvisionError::Parse("empty user data".to_string()));
    }
    if data.len() > MAX_USER_DATA_SIZE {
        return Err(ProvisionError::InvalidData(format!(
            "user data exceeds {} bytes",
            MAX_USER_DATA_SIZE
        )));
    }

    let data = decompress_if_needed(data)?;
    let text = std::str::from_utf8(&data)
        .map_err(|e| ProvisionError::Parse(format!("user data is not valid UTF-8: {}", e)))?;

    CloudConfig::from_yaml(text)
}

/// Transparently gunzip compressed user-data
fn decompress_if_needed(data: &[u8]) -> Result<Vec<u8>, ProvisionError> {
    if !data.starts_with(&GZIP_MAGIC) {
        return Ok(data.to_vec());
    }

    debug!("Decompressing gzip user data ({} bytes)", data.len());
    let mut decompressed = Vec::new();
    // Read one byte past the limit so oversize payloads are detectable
    GzDecoder::new(data)
        .take(MAX_USER_DATA_SIZE as u64 + 1)
        .read_to_end(&mut decompressed)
        .map_err(|e| ProvisionError::Parse(format!("Failed to decompress gzip: {}", e)))?;

    if decompressed.len() > MAX_USER_DATA_SIZE {
        return Err(ProvisionError::InvalidData(format!(
            "decompressed user data exceeds {} bytes",
            MAX_USER_DATA_SIZE
        )));
    }

    Ok(decompressed)
}
