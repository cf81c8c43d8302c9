//! Remote directory access.
//!
//! The reconciler only sees the `DirectoryClient` trait. `netbox` talks to a
//! live NetBox instance over HTTP; `memory` is an in-process directory that
//! records every call, used by tests and for exercising the engine offline.

pub mod memory;
pub mod netbox;

use crate::models::device::DeviceRef;
use crate::models::role::{NewRole, Role};
use crate::models::secret::{NewSecret, Secret, SecretFilter};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status. Displays `detail`, the body as sent.
    #[error("{detail}")]
    Rejected { status: u16, detail: String },

    #[error("cannot decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Typed operations on roles, devices, and secrets.
///
/// Calls are blocking and are issued one at a time by the reconciler.
/// Implementations bound call duration and report timeouts as `RemoteError`.
pub trait DirectoryClient {
    /// Look up a role by exact name.
    fn get_role(&self, name: &str) -> Result<Option<Role>, RemoteError>;

    fn create_role(&self, role: &NewRole) -> Result<Role, RemoteError>;

    /// List secrets, filtered server-side on the supplied fields only.
    /// Order is whatever the server returns.
    fn filter_secrets(&self, filter: &SecretFilter<'_>) -> Result<Vec<Secret>, RemoteError>;

    /// Look up a device by exact name.
    fn get_device(&self, name: &str) -> Result<Option<DeviceRef>, RemoteError>;

    fn create_secret(&self, secret: &NewSecret<'_>) -> Result<Secret, RemoteError>;

    /// Persist a secret whose payload was replaced with `Secret::set_plaintext`.
    /// Returns the service's acknowledgment.
    fn save_secret(&self, secret: &Secret) -> Result<bool, RemoteError>;

    fn delete_secret(&self, secret: &Secret) -> Result<bool, RemoteError>;
}
