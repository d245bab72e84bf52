//! Write files module
//!
//! Materializes `write_files` entries under the trusted root. The daemon
//! config entry is special: it is JSON that may carry the registry auth file
//! inline, and that payload is split out into its own file.

use serde::Deserialize;
use serde::de::Error as _;
use serde_json::Value;
use std::path::{Component, Path};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::ProvisionError;
use crate::config::Config;
use crate::userdata::{CloudConfig, WriteFile};

/// Mode for provisioned files (they may hold private keys)
pub const FILE_MODE: u32 = 0o600;

/// Mode for directories created on the way to a provisioned file
pub const DIR_MODE: u32 = 0o700;

/// The part of the forwarder daemon config this crate cares about
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaemonConfig {
    /// Registry auth JSON, carried verbatim; `null` counts as absent
    #[serde(rename = "auth-json", default)]
    pub auth_json: Option<String>,
}

impl DaemonConfig {
    /// Decode the daemon config, which must be a JSON object
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(content)?;
        if !value.is_object() {
            return Err(serde_json::Error::custom("not a JSON object"));
        }
        serde_json::from_value(value)
    }

    /// Auth payload to split out, if any
    pub fn auth_json(&self) -> Option<&str> {
        self.auth_json.as_deref().filter(|auth| !auth.is_empty())
    }
}

/// Write every entry of `cc` under the trusted root, in order
///
/// Returns the number of files written. The first failure aborts the run;
/// files written by earlier entries are left in place.
pub async fn write_files(cfg: &Config, cc: &CloudConfig) -> Result<usize, ProvisionError> {
    let mut written = 0;
    for entry in &cc.write_files {
        written += write_entry(cfg, entry).await?;
    }
    info!("Provisioned {} file(s) under {}", written, cfg.parent_path().display());
    Ok(written)
}

async fn write_entry(cfg: &Config, entry: &WriteFile) -> Result<usize, ProvisionError> {
    let path = Path::new(&entry.path);
    check_scope(cfg.parent_path(), path)?;

    if path != cfg.paths().daemon_config.as_path() {
        write_file(path, entry.content.as_bytes()).await?;
        return Ok(1);
    }

    if entry.content.is_empty() {
        return Err(ProvisionError::daemon_config(path, "empty content"));
    }
    let daemon = DaemonConfig::from_json(&entry.content)
        .map_err(|e| ProvisionError::daemon_config(path, e.to_string()))?;

    write_file(path, entry.content.as_bytes()).await?;
    let Some(auth) = daemon.auth_json() else {
        return Ok(1);
    };

    debug!("Daemon config carries auth json, writing it out");
    write_file(&cfg.paths().auth_json, auth.as_bytes()).await?;
    Ok(2)
}

/// Reject any path that is not strictly inside `parent`
///
/// The comparison is component-wise, so `/run/peerpod-evil` is not inside
/// `/run/peerpod`, and `..` is refused outright.
pub fn check_scope(parent: &Path, path: &Path) -> Result<(), ProvisionError> {
    let inside = path.is_absolute()
        && !path.components().any(|c| c == Component::ParentDir)
        && path.starts_with(parent)
        && path.components().count() > parent.components().count();

    if inside {
        Ok(())
    } else {
        Err(ProvisionError::PathScopeViolation {
            path: path.to_path_buf(),
            parent: parent.to_path_buf(),
        })
    }
}

/// Write `bytes` to `path` with [`FILE_MODE`], creating parent directories as needed
pub async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ProvisionError> {
    write_file_with_mode(path, bytes, FILE_MODE).await
}

/// Write `bytes` to `path` with an explicit file mode
pub async fn write_file_with_mode(
    path: &Path,
    bytes: &[u8],
    mode: u32,
) -> Result<(), ProvisionError> {
    let wrap = |source: std::io::Error| ProvisionError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(DIR_MODE);
        builder.create(parent).await.map_err(wrap)?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(mode);

    let mut file = options.open(path).await.map_err(wrap)?;
    file.write_all(bytes).await.map_err(wrap)?;
    file.flush().await.map_err(wrap)?;

    // Reapply so files that already existed end up with `mode` too
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(wrap)?;
    }

    info!("Wrote {}", path.display());
    Ok(())
}
