//! Standard peer-pod configuration paths
//!
//! Every provisioned file lives under one trusted root directory.

use std::path::{Path, PathBuf};

/// Default trusted root for provisioned configuration
pub const CONFIG_PARENT: &str = "/run/peerpod";

pub const AGENT_CONFIG_NAME: &str = "agent-config.toml";
pub const DAEMON_CONFIG_NAME: &str = "daemon.json";
pub const AUTH_JSON_NAME: &str = "auth.json";
pub const CDH_CONFIG_NAME: &str = "cdh.toml";
pub const AA_CONFIG_NAME: &str = "aa.toml";
pub const POLICY_NAME: &str = "policy.rego";
pub const INITDATA_META_NAME: &str = "initdata.meta";
pub const INITDATA_TOML_NAME: &str = "initdata.toml";
pub const CHECKSUM_NAME: &str = "checksum.txt";

/// Locations of the configuration files consumed by guest components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Kata agent config
    pub agent_config: PathBuf,
    /// Agent-protocol-forwarder daemon config (JSON, may embed auth.json)
    pub daemon_config: PathBuf,
    /// Registry auth file split out of the daemon config
    pub auth_json: PathBuf,
    /// Confidential data hub config
    pub cdh_config: PathBuf,
    /// Attestation agent config
    pub aa_config: PathBuf,
    /// Agent policy
    pub policy: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::under(CONFIG_PARENT)
    }
}

impl Paths {
    /// Derive every path from a single parent directory
    pub fn under(parent: impl AsRef<Path>) -> Self {
        let parent = parent.as_ref();
        Self {
            agent_config: parent.join(AGENT_CONFIG_NAME),
            daemon_config: parent.join(DAEMON_CONFIG_NAME),
            auth_json: parent.join(AUTH_JSON_NAME),
            cdh_config: parent.join(CDH_CONFIG_NAME),
            aa_config: parent.join(AA_CONFIG_NAME),
            policy: parent.join(POLICY_NAME),
        }
    }

    /// Files folded into the initdata digest, in digest order
    pub fn static_files(&self) -> Vec<PathBuf> {
        vec![
            self.aa_config.clone(),
            self.cdh_config.clone(),
            self.policy.clone(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let paths = Paths::default();
        assert_eq!(paths.daemon_config, PathBuf::from("/run/peerpod/daemon.json"));
        assert_eq!(paths.auth_json, PathBuf::from("/run/peerpod/auth.json"));
        assert_eq!(paths.aa_config, PathBuf::from("/run/peerpod/aa.toml"));
    }

    #[test]
    fn test_static_file_order() {
        let paths = Paths::under("/tmp/pp");
        assert_eq!(
            paths.static_files(),
            vec![
                PathBuf::from("/tmp/pp/aa.toml"),
                PathBuf::from("/tmp/pp/cdh.toml"),
                PathBuf::from("/tmp/pp/policy.rego"),
            ]
        );
    }
}
