//! Provisioning run parameters
//!
//! A [`Config`] is built once per run and handed by reference to every
//! component. There is no process-wide state.

pub mod paths;

pub use paths::{CONFIG_PARENT, Paths};

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default deadline for fetching user data
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(180);

/// Immutable parameters of one provisioning run
#[derive(Debug, Clone)]
pub struct Config {
    parent_path: PathBuf,
    fetch_timeout: Duration,
    paths: Paths,
    digest_path: PathBuf,
    initdata_meta: PathBuf,
    initdata_toml: PathBuf,
    static_files: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

impl Config {
    /// Create with the production layout under `/run/peerpod`
    pub fn new(fetch_timeout: Duration) -> Self {
        Self::with_parent(CONFIG_PARENT, fetch_timeout)
    }

    /// Create with every path rooted at `parent` (useful for testing)
    ///
    /// `parent` must be absolute: user-data paths are absolute and are
    /// scope-checked against it.
    pub fn with_parent(parent: impl AsRef<Path>, fetch_timeout: Duration) -> Self {
        let parent = parent.as_ref();
        let layout = Paths::under(parent);
        let static_files = layout.static_files();
        Self {
            parent_path: parent.to_path_buf(),
            fetch_timeout,
            paths: layout,
            digest_path: parent.join(paths::CHECKSUM_NAME),
            initdata_meta: parent.join(paths::INITDATA_META_NAME),
            initdata_toml: parent.join(paths::INITDATA_TOML_NAME),
            static_files,
        }
    }

    /// Override the config file locations
    pub fn with_paths(mut self, paths: Paths) -> Self {
        self.paths = paths;
        self
    }

    /// Override the digest output path
    pub fn with_digest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.digest_path = path.into();
        self
    }

    /// Override the initdata meta input path
    pub fn with_initdata_meta(mut self, path: impl Into<PathBuf>) -> Self {
        self.initdata_meta = path.into();
        self
    }

    /// Override the initdata TOML output path
    pub fn with_initdata_toml(mut self, path: impl Into<PathBuf>) -> Self {
        self.initdata_toml = path.into();
        self
    }

    /// Override the list of files folded into the digest
    pub fn with_static_files(mut self, files: Vec<PathBuf>) -> Self {
        self.static_files = files;
        self
    }

    /// Trusted root every written file must live under
    pub fn parent_path(&self) -> &Path {
        &self.parent_path
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn digest_path(&self) -> &Path {
        &self.digest_path
    }

    pub fn initdata_meta(&self) -> &Path {
        &self.initdata_meta
    }

    pub fn initdata_toml(&self) -> &Path {
        &self.initdata_toml
    }

    /// Static files in digest order
    pub fn static_files(&self) -> &[PathBuf] {
        &self.static_files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.parent_path(), Path::new("/run/peerpod"));
        assert_eq!(cfg.fetch_timeout(), Duration::from_secs(180));
        assert_eq!(cfg.digest_path(), Path::new("/run/peerpod/checksum.txt"));
        assert_eq!(cfg.initdata_meta(), Path::new("/run/peerpod/initdata.meta"));
        assert_eq!(cfg.static_files().len(), 3);
    }

    #[test]
    fn test_with_parent_roots_everything() {
        let cfg = Config::with_parent("/tmp/root", Duration::from_secs(1));
        assert!(cfg.digest_path().starts_with("/tmp/root"));
        assert!(cfg.initdata_toml().starts_with("/tmp/root"));
        assert!(cfg.paths().daemon_config.starts_with("/tmp/root"));
        assert!(cfg.static_files().iter().all(|f| f.starts_with("/tmp/root")));
    }

    #[test]
    fn test_builder_overrides() {
        let cfg = Config::new(Duration::from_secs(5))
            .with_digest_path("/tmp/sum")
            .with_static_files(vec![PathBuf::from("/tmp/a")]);
        assert_eq!(cfg.digest_path(), Path::new("/tmp/sum"));
        assert_eq!(cfg.static_files(), &[PathBuf::from("/tmp/a")]);
        // untouched fields keep their defaults
        assert_eq!(cfg.initdata_meta(), Path::new("/run/peerpod/initdata.meta"));
    }
}
