//! Secret roles.

/// A secret role as known to NetBox.
///
/// Roles are created on demand by `present` and never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: u64,
    pub name: String,
    pub slug: String,
    /// Ids of users allowed to read secrets under this role.
    pub users: Vec<u64>,
}

/// Payload for creating a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    pub name: String,
    pub slug: String,
    pub users: Vec<u64>,
}

impl NewRole {
    /// A role with a derived slug and no owning users.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            slug: slugify(name),
            users: Vec::new(),
        }
    }
}

/// Lowercase the name and replace spaces with hyphens.
pub fn slugify(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}
