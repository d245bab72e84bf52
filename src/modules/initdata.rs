//! Initdata digest and bundle
//!
//! The attester re-derives a digest over the static configuration files and
//! compares it with the one written here. Both sides must agree on the file
//! order, on skipping absent files, and on the hex encoding.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::{debug, info};

use super::write_files::{write_file, write_file_with_mode};
use crate::ProvisionError;
use crate::config::Config;

/// Mode for the digest file; it is not secret and the attester reads it
pub const DIGEST_MODE: u32 = 0o644;

/// Hash algorithms an initdata descriptor may name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Lowercase hex digest of `data`
    pub fn hex_digest(&self, data: &[u8]) -> String {
        match self {
            Self::Sha256 => hex::encode(Sha256::digest(data)),
            Self::Sha384 => hex::encode(Sha384::digest(data)),
            Self::Sha512 => hex::encode(Sha512::digest(data)),
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            other => Err(ProvisionError::UnsupportedDigestAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
            Self::Sha384 => write!(f, "sha384"),
            Self::Sha512 => write!(f, "sha512"),
        }
    }
}

/// Algorithm-tagged bundle of static configuration files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitData {
    pub algorithm: String,
    pub version: String,
    /// File name to file content
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

/// Read the initdata meta descriptor (algorithm and version)
///
/// Any `data` table in the descriptor is ignored.
pub async fn read_initdata_meta(path: &Path) -> Result<InitData, ProvisionError> {
    let meta_err = |message: String| ProvisionError::InitdataMeta {
        path: path.to_path_buf(),
        message,
    };

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| meta_err(e.to_string()))?;
    let mut meta: InitData = toml::from_str(&content).map_err(|e| meta_err(e.to_string()))?;
    meta.data.clear();
    Ok(meta)
}

/// Read a static file, `None` if it does not exist
async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, ProvisionError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ProvisionError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Compute the initdata digest and write it to the digest path
///
/// Absent static files are skipped. Returns the hex digest that was written.
pub async fn calculate_userdata_hash(cfg: &Config) -> Result<String, ProvisionError> {
    let meta = read_initdata_meta(cfg.initdata_meta()).await?;
    let algorithm: DigestAlgorithm = meta.algorithm.parse()?;

    let mut buffer = Vec::new();
    for file in cfg.static_files() {
        match read_optional(file).await? {
            Some(bytes) => {
                debug!("Adding {} to initdata digest", file.display());
                buffer.extend_from_slice(&bytes);
            }
            None => debug!("Skipping absent static file {}", file.display()),
        }
    }

    let checksum = algorithm.hex_digest(&buffer);
    write_file_with_mode(cfg.digest_path(), checksum.as_bytes(), DIGEST_MODE).await?;
    info!(
        "Wrote {} initdata digest to {}",
        algorithm,
        cfg.digest_path().display()
    );
    Ok(checksum)
}

/// Build the initdata bundle and write it as TOML to the initdata path
///
/// Unlike the digest, every static file must be present.
pub async fn construct_userdata(cfg: &Config) -> Result<InitData, ProvisionError> {
    let mut initdata = read_initdata_meta(cfg.initdata_meta()).await?;

    for file in cfg.static_files() {
        let bytes = read_optional(file)
            .await?
            .ok_or_else(|| ProvisionError::MissingStaticFile(file.clone()))?;
        let content = String::from_utf8(bytes).map_err(|e| {
            ProvisionError::InvalidData(format!("{} is not valid UTF-8: {}", file.display(), e))
        })?;
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ProvisionError::InvalidData(format!("{} has no file name", file.display()))
            })?;

        if initdata.data.insert(name.clone(), content).is_some() {
            return Err(ProvisionError::InvalidData(format!(
                "duplicate static file name {}",
                name
            )));
        }
    }

    let serialized = toml::to_string(&initdata)?;
    write_file(cfg.initdata_toml(), serialized.as_bytes()).await?;
    info!("Wrote initdata to {}", cfg.initdata_toml().display());
    Ok(initdata)
}
