//! Reconciliation result, assembled once per invocation.

use crate::models::secret::Secret;
use serde::Serialize;
use std::fmt;

/// A fact about what changed remotely. Several may hold for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    RoleCreated,
    SecretCreated,
    SecretUpdated,
    SecretDeleted,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::RoleCreated => "role-created",
            Action::SecretCreated => "secret-created",
            Action::SecretUpdated => "secret-updated",
            Action::SecretDeleted => "secret-deleted",
        };
        f.write_str(s)
    }
}

/// Outcome of the secret mutation a decision led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretStep {
    pub action: Action,
    /// Whether the service acknowledged the write.
    pub acknowledged: bool,
}

/// One secret as reported by show.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SecretRecord {
    pub secret_role: String,
    pub password: String,
    pub name: String,
    pub device: String,
}

impl From<&Secret> for SecretRecord {
    fn from(secret: &Secret) -> Self {
        SecretRecord {
            secret_role: secret.role.name.clone(),
            password: secret.plaintext().unwrap_or_default().to_string(),
            name: secret.name.clone(),
            device: secret.device.name.clone(),
        }
    }
}

impl fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretRecord")
            .field("secret_role", &self.secret_role)
            .field("name", &self.name)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub changed: bool,
    pub message: String,
    pub actions: Vec<Action>,
    pub secret_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets: Option<Vec<SecretRecord>>,
}

impl Outcome {
    /// Result of a present/absent run. An unacknowledged write is not an action.
    pub fn converged(role: &str, role_created: bool, step: SecretStep, message: String) -> Self {
        let mut actions = Vec::new();
        if role_created {
            actions.push(Action::RoleCreated);
        }
        if step.acknowledged {
            actions.push(step.action);
        }
        Outcome {
            changed: !actions.is_empty(),
            message,
            actions,
            secret_role: Some(role.to_string()),
            secrets: None,
        }
    }

    /// Result of a show run. Never a change.
    pub fn listing(role: Option<&str>, records: Vec<SecretRecord>) -> Self {
        let message = match records.len() {
            1 => "1 secret matched".to_string(),
            n => format!("{} secrets matched", n),
        };
        Outcome {
            changed: false,
            message,
            actions: Vec::new(),
            secret_role: role.map(str::to_string),
            secrets: Some(records),
        }
    }

    pub fn has(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_and_secret_actions_are_additive() {
        let outcome = Outcome::converged(
            "ops",
            true,
            SecretStep {
                action: Action::SecretCreated,
                acknowledged: true,
            },
            "created".into(),
        );
        assert!(outcome.changed);
        assert_eq!(outcome.actions, vec![Action::RoleCreated, Action::SecretCreated]);
    }

    #[test]
    fn test_unacknowledged_save_is_not_a_change() {
        let outcome = Outcome::converged(
            "ops",
            false,
            SecretStep {
                action: Action::SecretUpdated,
                acknowledged: false,
            },
            "unchanged".into(),
        );
        assert!(!outcome.changed);
        assert!(outcome.actions.is_empty());
    }

    #[test]
    fn test_role_creation_alone_is_a_change() {
        let outcome = Outcome::converged(
            "ops",
            true,
            SecretStep {
                action: Action::SecretUpdated,
                acknowledged: false,
            },
            "unchanged".into(),
        );
        assert!(outcome.changed);
        assert!(outcome.has(Action::RoleCreated));
        assert!(!outcome.has(Action::SecretUpdated));
    }

    #[test]
    fn test_serialized_shape() {
        let outcome = Outcome::listing(
            Some("ops"),
            vec![SecretRecord {
                secret_role: "ops".into(),
                password: "s3cr3t".into(),
                name: "admin-pw".into(),
                device: "router1".into(),
            }],
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["changed"], false);
        assert_eq!(json["message"], "1 secret matched");
        assert_eq!(json["secrets"][0]["password"], "s3cr3t");
        assert_eq!(json["secrets"][0]["secret_role"], "ops");
    }

    #[test]
    fn test_actions_serialize_kebab_case() {
        let json = serde_json::to_string(&vec![Action::RoleCreated, Action::SecretDeleted]).unwrap();
        assert_eq!(json, r#"["role-created","secret-deleted"]"#);
    }
}
