//! Role ensurer.

use crate::models::role::{NewRole, Role};
use crate::remote::{DirectoryClient, RemoteError};

/// A role guaranteed to exist remotely, and whether this call created it.
#[derive(Debug, Clone)]
pub struct EnsuredRole {
    pub role: Role,
    pub created: bool,
}

/// Look up `name`; create it with a derived slug and no owners if absent.
///
/// A failed create (for example a concurrent creation under the same name)
/// propagates as-is. It is not retried.
pub fn ensure<C: DirectoryClient + ?Sized>(client: &C, name: &str) -> Result<EnsuredRole, RemoteError> {
    if let Some(role) = client.get_role(name)? {
        tracing::debug!(role = name, id = role.id, "secret role exists");
        return Ok(EnsuredRole {
            role,
            created: false,
        });
    }

    let role = client.create_role(&NewRole::named(name))?;
    tracing::info!(role = name, slug = %role.slug, "secret role created");
    Ok(EnsuredRole {
        role,
        created: true,
    })
}

/// Read-only lookup, used by show and by dry-run planning.
pub fn find<C: DirectoryClient + ?Sized>(client: &C, name: &str) -> Result<Option<Role>, RemoteError> {
    client.get_role(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::{Call, InMemoryDirectory, Operation};

    #[test]
    fn test_existing_role_is_reused() {
        let dir = InMemoryDirectory::new();
        let seeded = dir.add_role("ops");
        let ensured = ensure(&dir, "ops").unwrap();
        assert!(!ensured.created);
        assert_eq!(ensured.role, seeded);
        assert!(dir.mutations().is_empty());
    }

    #[test]
    fn test_missing_role_is_created_with_slug() {
        let dir = InMemoryDirectory::new();
        let ensured = ensure(&dir, "Network Ops").unwrap();
        assert!(ensured.created);
        assert_eq!(ensured.role.slug, "network-ops");
        assert!(ensured.role.users.is_empty());
        assert_eq!(dir.mutations(), vec![Call::CreateRole("Network Ops".into())]);
    }

    #[test]
    fn test_create_failure_propagates() {
        let dir = InMemoryDirectory::new();
        dir.reject_next(Operation::CreateRole, 400, "slug already exists");
        let err = ensure(&dir, "ops").unwrap_err();
        assert!(matches!(err, RemoteError::Rejected { ref detail, .. } if detail == "slug already exists"));
        assert!(dir.roles().is_empty());
    }

    #[test]
    fn test_find_never_creates() {
        let dir = InMemoryDirectory::new();
        assert!(find(&dir, "ops").unwrap().is_none());
        assert!(dir.mutations().is_empty());
    }
}
