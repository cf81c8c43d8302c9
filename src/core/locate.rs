//! Secret locator.

use crate::error::ReconcileError;
use crate::models::policy::DuplicateMatch;
use crate::models::secret::{Secret, SecretFilter};
use crate::remote::{DirectoryClient, RemoteError};
use std::fmt;

/// Composite key of a secret. `device` may be absent for `present`.
#[derive(Debug, Clone, Copy)]
pub struct SecretKey<'a> {
    pub device: Option<&'a str>,
    pub name: Option<&'a str>,
    pub role: &'a str,
}

impl fmt::Display for SecretKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "device={} name={} role={}",
            self.device.unwrap_or("*"),
            self.name.unwrap_or("*"),
            self.role
        )
    }
}

/// Find the single secret carrying `key`.
///
/// Lists secrets filtered server-side by device only, then matches name and
/// role name exactly on this side. Without a name nothing can match and no
/// remote call is made.
pub fn locate<C: DirectoryClient + ?Sized>(
    client: &C,
    key: SecretKey<'_>,
    duplicates: DuplicateMatch,
) -> Result<Option<Secret>, ReconcileError> {
    let Some(name) = key.name else {
        return Ok(None);
    };

    let mut matches: Vec<Secret> = client
        .filter_secrets(&SecretFilter {
            device: key.device,
            name: None,
        })?
        .into_iter()
        .filter(|s| s.matches(name, key.role))
        .collect();

    tracing::debug!(%key, matches = matches.len(), "located secrets");

    match (matches.len(), duplicates) {
        (0, _) => Ok(None),
        (1, _) | (_, DuplicateMatch::First) => Ok(Some(matches.swap_remove(0))),
        (count, DuplicateMatch::Reject) => Err(ReconcileError::AmbiguousMatch {
            count,
            key: key.to_string(),
        }),
    }
}

/// Secrets matching every supplied filter, in server order.
///
/// Device and name filter server-side; a role filter is resolved to a role id
/// and applied here. An unknown role matches nothing.
pub fn locate_for_show<C: DirectoryClient + ?Sized>(
    client: &C,
    device: Option<&str>,
    name: Option<&str>,
    role: Option<&str>,
) -> Result<Vec<Secret>, RemoteError> {
    let role_id = match role {
        Some(role) => match client.get_role(role)? {
            Some(found) => Some(found.id),
            None => {
                tracing::debug!(role, "role filter names an unknown role");
                return Ok(Vec::new());
            }
        },
        None => None,
    };

    let secrets = client.filter_secrets(&SecretFilter { device, name })?;
    Ok(secrets
        .into_iter()
        .filter(|s| role_id.map_or(true, |id| s.role.id == id))
        .collect())
}
