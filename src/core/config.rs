//! Config file loading and connection settings resolution.

use crate::models::config::{ConfigFile, ConnectionSection};
use crate::remote::netbox::ConnectOptions;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use zeroize::Zeroizing;

/// Load the config file. A missing file yields defaults.
pub fn load(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parse config {}", path.display()))
}

/// Connection values given on the command line or through the environment.
#[derive(Default)]
pub struct ConnectionOverrides {
    pub url: Option<String>,
    pub token: Option<String>,
    pub private_key: Option<PathBuf>,
}

/// Merge overrides over the config file section. Overrides win.
pub fn connect_options(overrides: &ConnectionOverrides, file: &ConnectionSection) -> Result<ConnectOptions> {
    let url = overrides
        .url
        .clone()
        .or_else(|| file.url.clone())
        .filter(|u| !u.trim().is_empty());
    let Some(url) = url else {
        bail!("no NetBox URL configured (use --url, NETBOX_URL, or [connection].url)");
    };

    let token = overrides
        .token
        .clone()
        .or_else(|| file.token.clone())
        .filter(|t| !t.trim().is_empty());
    let Some(token) = token else {
        bail!("no API token configured (use --token, NETBOX_TOKEN, or [connection].token)");
    };

    let private_key = overrides
        .private_key
        .clone()
        .or_else(|| file.private_key.clone())
        .map(|p| expand_home(&p));

    Ok(ConnectOptions {
        url,
        token: Zeroizing::new(token),
        private_key,
        timeout: Duration::from_secs(file.timeout_secs),
        verify_tls: file.verify_tls,
    })
}

/// Expand a leading `~/` using `$HOME`.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}
