//! State directory resolution.

use crate::constants;
use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct StatePaths {
    pub root: PathBuf,
    pub config_toml: PathBuf,
    pub audit_log: PathBuf,
    pub audit_lock: PathBuf,
}

impl StatePaths {
    /// Resolve from the CLI arg (which also carries `NETBOX_SECRET_HOME`),
    /// then `$XDG_STATE_HOME/netbox-secret`, then `$HOME/.local/state/netbox-secret`.
    pub fn resolve(root_arg: Option<PathBuf>) -> Result<Self> {
        if let Some(root) = root_arg {
            return Ok(Self::from_root(root));
        }
        if let Some(state) = env::var_os("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
            return Ok(Self::from_root(PathBuf::from(state).join(constants::APP_NAME)));
        }
        if let Some(home) = env::var_os("HOME").filter(|v| !v.is_empty()) {
            return Ok(Self::from_root(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join(constants::APP_NAME),
            ));
        }
        bail!("cannot determine state directory; pass --state-dir or set NETBOX_SECRET_HOME");
    }

    pub fn from_root(root: PathBuf) -> Self {
        let config_toml = root.join(constants::CONFIG_FILE);
        let audit_log = root.join(constants::AUDIT_LOG_FILE);
        let audit_lock = root.join(constants::AUDIT_LOCK_FILE);
        Self {
            root,
            config_toml,
            audit_log,
            audit_lock,
        }
    }
}

impl std::fmt::Display for StatePaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "state@{}", self.root.display())
    }
}
