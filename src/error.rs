//! Error taxonomy for a reconciliation.
//!
//! Every variant is terminal for the invocation. Nothing is retried and
//! nothing already applied remotely is rolled back.

use crate::core::intent::Intent;
use crate::remote::RemoteError;
use std::fmt;
use thiserror::Error;

/// Which referenced entity was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    Device,
    Secret,
    NoMatches,
}

impl fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFoundKind::Device => write!(f, "device"),
            NotFoundKind::Secret => write!(f, "secret"),
            NotFoundKind::NoMatches => write!(f, "matching secret"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A required attribute was not supplied for the intent.
    #[error("{intent} requires {}", .fields.join(", "))]
    MissingFields {
        intent: Intent,
        fields: Vec<&'static str>,
    },

    /// The NetBox client could not be constructed or authenticated.
    #[error("failed to connect to NetBox at {url}: {cause}")]
    Connection { url: String, cause: String },

    #[error("{kind} not found: {key}")]
    NotFound { kind: NotFoundKind, key: String },

    /// More than one remote secret carries the same composite key.
    #[error("{count} secrets match {key}; refusing to pick one (set policy.duplicate_match = \"first\" to act on the first)")]
    AmbiguousMatch { count: usize, key: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl ReconcileError {
    pub fn not_found(kind: NotFoundKind, key: impl Into<String>) -> Self {
        ReconcileError::NotFound {
            kind,
            key: key.into(),
        }
    }

    /// HTTP status of a remote rejection, reported beside the verbatim detail.
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            ReconcileError::Remote(RemoteError::Rejected { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// The not-found kind, if this is a `NotFound` error.
    pub fn not_found_kind(&self) -> Option<NotFoundKind> {
        match self {
            ReconcileError::NotFound { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_lists_names() {
        let err = ReconcileError::MissingFields {
            intent: Intent::Absent,
            fields: vec!["device", "role"],
        };
        assert_eq!(err.to_string(), "absent requires device, role");
    }

    #[test]
    fn test_remote_detail_is_verbatim() {
        let err = ReconcileError::from(RemoteError::Rejected {
            status: 400,
            detail: r#"{"name":["secret role with this name already exists."]}"#.into(),
        });
        assert_eq!(
            err.to_string(),
            r#"{"name":["secret role with this name already exists."]}"#
        );
        assert_eq!(err.remote_status(), Some(400));
    }

    #[test]
    fn test_not_found_kind() {
        let err = ReconcileError::not_found(NotFoundKind::Secret, "router1/admin-pw/ops");
        assert_eq!(err.not_found_kind(), Some(NotFoundKind::Secret));
        assert_eq!(err.to_string(), "secret not found: router1/admin-pw/ops");
    }
}
