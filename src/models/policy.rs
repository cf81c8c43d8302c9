//! Policy configuration for reconciliation.

use serde::{Deserialize, Serialize};

/// What to do when more than one remote secret carries the same composite key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateMatch {
    /// Fail with `AmbiguousMatch`.
    #[default]
    Reject,
    /// Act on the first secret in server listing order.
    First,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySection {
    #[serde(default)]
    pub duplicate_match: DuplicateMatch,

    /// Append mutating invocations to the local audit log.
    #[serde(default = "default_true")]
    pub audit: bool,

    /// Forward audit entries to journald.
    #[serde(default)]
    pub journald_audit: bool,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            duplicate_match: DuplicateMatch::default(),
            audit: true,
            journald_audit: false,
        }
    }
}

fn default_true() -> bool {
    true
}
