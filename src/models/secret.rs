//! Secrets and the request shapes used to query and create them.

use crate::models::device::DeviceRef;
use crate::models::role::Role;
use std::fmt;
use zeroize::Zeroizing;

/// A secret bound to a device and a role.
///
/// Identified here by the composite key (device name, secret name, role name).
#[derive(Clone)]
pub struct Secret {
    pub id: u64,
    pub name: String,
    pub role: Role,
    pub device: DeviceRef,
    plaintext: Option<Zeroizing<String>>,
}

impl Secret {
    pub fn new(id: u64, name: String, role: Role, device: DeviceRef, plaintext: Option<String>) -> Self {
        Self {
            id,
            name,
            role,
            device,
            plaintext: plaintext.map(Zeroizing::new),
        }
    }

    /// Decrypted payload, if the remote returned one.
    pub fn plaintext(&self) -> Option<&str> {
        self.plaintext.as_ref().map(|p| p.as_str())
    }

    /// Replace the payload locally. Persist with `DirectoryClient::save_secret`.
    pub fn set_plaintext(&mut self, value: &str) {
        self.plaintext = Some(Zeroizing::new(value.to_string()));
    }

    /// Whether this secret carries the given composite key.
    pub fn matches(&self, name: &str, role: &str) -> bool {
        self.name == name && self.role.name == role
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("role", &self.role.name)
            .field("device", &self.device.name)
            .field("plaintext", &self.plaintext.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Server-side filter for listing secrets. `None` fields do not participate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecretFilter<'a> {
    pub device: Option<&'a str>,
    pub name: Option<&'a str>,
}

impl SecretFilter<'_> {
    /// Query pairs for the non-empty fields, in a stable order.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::new();
        if let Some(device) = self.device.filter(|d| !d.is_empty()) {
            pairs.push(("device", device));
        }
        if let Some(name) = self.name.filter(|n| !n.is_empty()) {
            pairs.push(("name", name));
        }
        pairs
    }
}

/// Payload for creating a secret.
pub struct NewSecret<'a> {
    pub name: &'a str,
    pub role_id: u64,
    pub device_id: u64,
    pub plaintext: &'a str,
}

impl fmt::Debug for NewSecret<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewSecret")
            .field("name", &self.name)
            .field("role_id", &self.role_id)
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Secret {
        Secret::new(
            7,
            "admin-pw".into(),
            Role {
                id: 1,
                name: "ops".into(),
                slug: "ops".into(),
                users: Vec::new(),
            },
            DeviceRef {
                id: 3,
                name: "router1".into(),
            },
            Some("hunter2".into()),
        )
    }

    #[test]
    fn test_debug_redacts_plaintext() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_set_plaintext_replaces_payload() {
        let mut secret = sample();
        secret.set_plaintext("s3cr3t");
        assert_eq!(secret.plaintext(), Some("s3cr3t"));
    }

    #[test]
    fn test_matches_requires_name_and_role() {
        let secret = sample();
        assert!(secret.matches("admin-pw", "ops"));
        assert!(!secret.matches("admin-pw", "Ops"));
        assert!(!secret.matches("enable-pw", "ops"));
    }

    #[test]
    fn test_filter_skips_empty_fields() {
        let filter = SecretFilter {
            device: Some("router1"),
            name: Some(""),
        };
        assert_eq!(filter.query_pairs(), vec![("device", "router1")]);
        assert!(SecretFilter::default().query_pairs().is_empty());
    }
}
