//! Intent resolution: turn loosely supplied attributes into a request whose
//! shape already guarantees the fields each intent needs.

use crate::error::ReconcileError;
use serde::Serialize;
use std::fmt;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Present,
    Absent,
    Show,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Present => write!(f, "present"),
            Intent::Absent => write!(f, "absent"),
            Intent::Show => write!(f, "show"),
        }
    }
}

/// Attributes as supplied by the caller. Empty strings count as absent.
#[derive(Default)]
pub struct Attributes {
    pub device: Option<String>,
    pub name: Option<String>,
    pub secret: Option<Zeroizing<String>>,
    pub role: Option<String>,
}

/// Ensure a secret exists with the given payload.
///
/// Device, name and payload are only checked once the lookup has decided
/// between create (needs all three) and update (needs the payload).
#[derive(Clone)]
pub struct PresentRequest {
    pub role: String,
    pub device: Option<String>,
    pub name: Option<String>,
    pub payload: Option<Zeroizing<String>>,
}

impl fmt::Debug for PresentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresentRequest")
            .field("role", &self.role)
            .field("device", &self.device)
            .field("name", &self.name)
            .field("payload", &self.payload.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsentRequest {
    pub device: String,
    pub name: String,
    pub role: String,
}

/// Every field is an optional filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShowRequest {
    pub device: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Request {
    Present(PresentRequest),
    Absent(AbsentRequest),
    Show(ShowRequest),
}

impl Request {
    pub fn intent(&self) -> Intent {
        match self {
            Request::Present(_) => Intent::Present,
            Request::Absent(_) => Intent::Absent,
            Request::Show(_) => Intent::Show,
        }
    }
}

/// Validate that `attrs` is sufficient for `intent`. Makes no remote calls.
pub fn resolve(intent: Intent, attrs: Attributes) -> Result<Request, ReconcileError> {
    let device = non_empty(attrs.device);
    let name = non_empty(attrs.name);
    let role = non_empty(attrs.role);
    let payload = attrs.secret.filter(|s| !s.is_empty());

    match intent {
        Intent::Present => {
            let role = role.ok_or(ReconcileError::MissingFields {
                intent,
                fields: vec!["role"],
            })?;
            Ok(Request::Present(PresentRequest {
                role,
                device,
                name,
                payload,
            }))
        }
        Intent::Absent => match (device, name, role) {
            (Some(device), Some(name), Some(role)) => {
                Ok(Request::Absent(AbsentRequest { device, name, role }))
            }
            (device, name, role) => Err(ReconcileError::MissingFields {
                intent,
                fields: missing(&[
                    ("device", device.is_some()),
                    ("name", name.is_some()),
                    ("role", role.is_some()),
                ]),
            }),
        },
        Intent::Show => Ok(Request::Show(ShowRequest { device, name, role })),
    }
}

/// Names of the fields whose presence flag is false, in the order given.
pub(crate) fn missing(fields: &[(&'static str, bool)]) -> Vec<&'static str> {
    fields
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
