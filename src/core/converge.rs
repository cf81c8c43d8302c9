//! Convergence engine.
//!
//! Each intent runs in two halves. Observation and `decide` only read from
//! the directory and settle on a `Decision`. `apply` then performs the single
//! secret mutation the decision names. Planning stops after `decide`.
//!
//! Nothing here is transactional: a role created before a failing secret
//! write stays created, and a concurrent run may create the same secret
//! between locate and create.

use crate::core::intent::{AbsentRequest, Intent, PresentRequest, Request, ShowRequest};
use crate::core::locate::{self, SecretKey};
use crate::core::outcome::{Action, Outcome, SecretRecord, SecretStep};
use crate::core::role;
use crate::error::{NotFoundKind, ReconcileError};
use crate::models::device::DeviceRef;
use crate::models::policy::DuplicateMatch;
use crate::models::role::Role;
use crate::models::secret::{NewSecret, Secret};
use crate::remote::DirectoryClient;
use serde::Serialize;
use zeroize::Zeroizing;

/// The secret mutation an invocation will perform.
pub enum Decision {
    CreateSecret {
        device: DeviceRef,
        name: String,
        payload: Zeroizing<String>,
    },
    UpdateSecret {
        secret: Secret,
        payload: Zeroizing<String>,
    },
    DeleteSecret(Secret),
}

impl Decision {
    pub fn step(&self) -> PlannedStep {
        match self {
            Decision::CreateSecret { .. } => PlannedStep::CreateSecret,
            Decision::UpdateSecret { .. } => PlannedStep::UpdateSecret,
            Decision::DeleteSecret(_) => PlannedStep::DeleteSecret,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlannedStep {
    CreateSecret,
    UpdateSecret,
    DeleteSecret,
}

/// What a run would do, without doing it.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub intent: Intent,
    pub role: String,
    pub create_role: bool,
    pub step: PlannedStep,
    pub device: Option<String>,
    pub name: Option<String>,
    /// Remote id of the secret an update or delete would touch.
    pub secret_id: Option<u64>,
}

pub struct Reconciler<'a, C: DirectoryClient + ?Sized> {
    client: &'a C,
    duplicates: DuplicateMatch,
}

impl<'a, C: DirectoryClient + ?Sized> Reconciler<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            duplicates: DuplicateMatch::default(),
        }
    }

    pub fn with_duplicate_match(mut self, duplicates: DuplicateMatch) -> Self {
        self.duplicates = duplicates;
        self
    }

    /// Converge remote state to `request` and report what changed.
    pub fn reconcile(&self, request: &Request) -> Result<Outcome, ReconcileError> {
        match request {
            Request::Present(req) => self.present(req),
            Request::Absent(req) => self.absent(req),
            Request::Show(req) => self.show(req),
        }
    }

    /// Read-only dry run of a present request.
    pub fn plan_present(&self, req: &PresentRequest) -> Result<Plan, ReconcileError> {
        let existing_role = role::find(self.client, &req.role)?;
        let existing = self.locate(present_key(req))?;
        let decision = self.decide_present(req, existing)?;
        Ok(Plan {
            intent: Intent::Present,
            role: req.role.clone(),
            create_role: existing_role.is_none(),
            step: decision.step(),
            device: req.device.clone(),
            name: req.name.clone(),
            secret_id: decided_secret_id(&decision),
        })
    }

    /// Read-only dry run of an absent request.
    pub fn plan_absent(&self, req: &AbsentRequest) -> Result<Plan, ReconcileError> {
        let decision = self.decide_absent(req)?;
        Ok(Plan {
            intent: Intent::Absent,
            role: req.role.clone(),
            create_role: false,
            step: decision.step(),
            device: Some(req.device.clone()),
            name: Some(req.name.clone()),
            secret_id: decided_secret_id(&decision),
        })
    }

    fn present(&self, req: &PresentRequest) -> Result<Outcome, ReconcileError> {
        let ensured = role::ensure(self.client, &req.role)?;
        let existing = self.locate(present_key(req))?;
        let decision = self.decide_present(req, existing)?;
        let device = decided_device(&decision);
        let step = self.apply(decision, Some(&ensured.role))?;

        let message = match (step.action, step.acknowledged) {
            (Action::SecretCreated, _) => {
                format!("Secret created for device {} and role {}", device, req.role)
            }
            (_, true) => format!("Secret for device {} has been updated", device),
            (_, false) => format!("Secret for device {} was not modified", device),
        };
        Ok(Outcome::converged(&req.role, ensured.created, step, message))
    }

    fn absent(&self, req: &AbsentRequest) -> Result<Outcome, ReconcileError> {
        let decision = self.decide_absent(req)?;
        let step = self.apply(decision, None)?;
        let message = if step.acknowledged {
            format!("Secret {} deleted from device {}", req.name, req.device)
        } else {
            format!("Secret {} on device {} was not deleted", req.name, req.device)
        };
        Ok(Outcome::converged(&req.role, false, step, message))
    }

    fn show(&self, req: &ShowRequest) -> Result<Outcome, ReconcileError> {
        let secrets = locate::locate_for_show(
            self.client,
            req.device.as_deref(),
            req.name.as_deref(),
            req.role.as_deref(),
        )?;
        if secrets.is_empty() {
            return Err(ReconcileError::not_found(
                NotFoundKind::NoMatches,
                describe_filters(req),
            ));
        }
        let records = secrets.iter().map(SecretRecord::from).collect();
        Ok(Outcome::listing(req.role.as_deref(), records))
    }

    fn locate(&self, key: SecretKey<'_>) -> Result<Option<Secret>, ReconcileError> {
        locate::locate(self.client, key, self.duplicates)
    }

    /// Update when a secret exists (payload required); otherwise create, which
    /// needs device, name and payload, and a device that exists remotely.
    fn decide_present(&self, req: &PresentRequest, existing: Option<Secret>) -> Result<Decision, ReconcileError> {
        if let Some(secret) = existing {
            let payload = req.payload.clone().ok_or(ReconcileError::MissingFields {
                intent: Intent::Present,
                fields: vec!["secret"],
            })?;
            return Ok(Decision::UpdateSecret { secret, payload });
        }

        let (Some(device), Some(name), Some(payload)) = (&req.device, &req.name, &req.payload) else {
            return Err(ReconcileError::MissingFields {
                intent: Intent::Present,
                fields: crate::core::intent::missing(&[
                    ("device", req.device.is_some()),
                    ("name", req.name.is_some()),
                    ("secret", req.payload.is_some()),
                ]),
            });
        };

        let device = self
            .client
            .get_device(device)?
            .ok_or_else(|| ReconcileError::not_found(NotFoundKind::Device, device.as_str()))?;
        Ok(Decision::CreateSecret {
            device,
            name: name.clone(),
            payload: payload.clone(),
        })
    }

    fn decide_absent(&self, req: &AbsentRequest) -> Result<Decision, ReconcileError> {
        let key = SecretKey {
            device: Some(&req.device),
            name: Some(&req.name),
            role: &req.role,
        };
        match self.locate(key)? {
            Some(secret) => Ok(Decision::DeleteSecret(secret)),
            None => Err(ReconcileError::not_found(NotFoundKind::Secret, key.to_string())),
        }
    }

    /// Perform the decided mutation. Creation needs the ensured role.
    fn apply(&self, decision: Decision, role: Option<&Role>) -> Result<SecretStep, ReconcileError> {
        match decision {
            Decision::CreateSecret {
                device,
                name,
                payload,
            } => {
                let Some(role) = role else {
                    return Err(ReconcileError::MissingFields {
                        intent: Intent::Present,
                        fields: vec!["role"],
                    });
                };
                self.client.create_secret(&NewSecret {
                    name: &name,
                    role_id: role.id,
                    device_id: device.id,
                    plaintext: &payload,
                })?;
                Ok(SecretStep {
                    action: Action::SecretCreated,
                    acknowledged: true,
                })
            }
            Decision::UpdateSecret {
                mut secret,
                payload,
            } => {
                secret.set_plaintext(&payload);
                let acknowledged = self.client.save_secret(&secret)?;
                Ok(SecretStep {
                    action: Action::SecretUpdated,
                    acknowledged,
                })
            }
            Decision::DeleteSecret(secret) => {
                let acknowledged = self.client.delete_secret(&secret)?;
                Ok(SecretStep {
                    action: Action::SecretDeleted,
                    acknowledged,
                })
            }
        }
    }
}

fn present_key(req: &PresentRequest) -> SecretKey<'_> {
    SecretKey {
        device: req.device.as_deref(),
        name: req.name.as_deref(),
        role: &req.role,
    }
}

fn decided_device(decision: &Decision) -> String {
    match decision {
        Decision::CreateSecret { device, .. } => device.name.clone(),
        Decision::UpdateSecret { secret, .. } | Decision::DeleteSecret(secret) => {
            secret.device.name.clone()
        }
    }
}

fn decided_secret_id(decision: &Decision) -> Option<u64> {
    match decision {
        Decision::CreateSecret { .. } => None,
        Decision::UpdateSecret { secret, .. } | Decision::DeleteSecret(secret) => Some(secret.id),
    }
}

fn describe_filters(req: &ShowRequest) -> String {
    let filters: Vec<String> = [
        ("device", &req.device),
        ("name", &req.name),
        ("role", &req.role),
    ]
    .iter()
    .filter_map(|(field, value)| value.as_ref().map(|v| format!("{}={}", field, v)))
    .collect();
    if filters.is_empty() {
        "no filters".to_string()
    } else {
        filters.join(" ")
    }
}
