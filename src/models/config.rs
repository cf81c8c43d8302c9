//! Config file model.

use crate::constants;
use crate::models::policy::PolicySection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub connection: ConnectionSection,
    #[serde(default)]
    pub policy: PolicySection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSection {
    /// Base URL, e.g. `https://netbox.example.com`.
    #[serde(default)]
    pub url: Option<String>,
    /// API token. Prefer `NETBOX_TOKEN` over storing it here.
    #[serde(default)]
    pub token: Option<String>,
    /// PEM private key used to obtain a session key.
    #[serde(default)]
    pub private_key: Option<PathBuf>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            private_key: None,
            timeout_secs: default_timeout(),
            verify_tls: default_verify_tls(),
        }
    }
}

fn default_timeout() -> u64 {
    constants::DEFAULT_TIMEOUT_SECS
}

fn default_verify_tls() -> bool {
    true
}
