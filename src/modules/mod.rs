//! Provisioning modules
//!
//! `write_files` materializes the fetched cloud-config under the trusted
//! root; `initdata` derives the attestation digest from what ends up there.

pub mod initdata;
pub mod write_files;

pub use initdata::{DigestAlgorithm, InitData, calculate_userdata_hash, construct_userdata};
pub use write_files::{DaemonConfig, check_scope, write_files};
