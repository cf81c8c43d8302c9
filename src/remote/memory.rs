//! In-process directory for tests.
//!
//! Keeps roles, devices, and secrets in insertion order (which stands in for
//! the server's listing order), records every call, and can be told to
//! reject a specific operation.

use crate::models::device::DeviceRef;
use crate::models::role::{NewRole, Role};
use crate::models::secret::{NewSecret, Secret, SecretFilter};
use crate::remote::{DirectoryClient, RemoteError};
use std::cell::RefCell;

/// A call made against the directory, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetRole(String),
    CreateRole(String),
    FilterSecrets {
        device: Option<String>,
        name: Option<String>,
    },
    GetDevice(String),
    CreateSecret(String),
    SaveSecret(u64),
    DeleteSecret(u64),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::CreateRole(_) | Call::CreateSecret(_) | Call::SaveSecret(_) | Call::DeleteSecret(_)
        )
    }
}

/// Operation selector for injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateRole,
    CreateSecret,
    SaveSecret,
    DeleteSecret,
}

#[derive(Default)]
struct State {
    roles: Vec<Role>,
    devices: Vec<DeviceRef>,
    secrets: Vec<Secret>,
    next_id: u64,
    calls: Vec<Call>,
    reject: Option<(Operation, u16, String)>,
    save_ack: bool,
}

impl State {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn take_rejection(&mut self, op: Operation) -> Result<(), RemoteError> {
        match self.reject.take() {
            Some((target, status, detail)) if target == op => {
                Err(RemoteError::Rejected { status, detail })
            }
            other => {
                self.reject = other;
                Ok(())
            }
        }
    }
}

pub struct InMemoryDirectory {
    state: RefCell<State>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State {
                save_ack: true,
                ..State::default()
            }),
        }
    }

    pub fn add_device(&self, name: &str) -> DeviceRef {
        let mut state = self.state.borrow_mut();
        let device = DeviceRef {
            id: state.allocate_id(),
            name: name.to_string(),
        };
        state.devices.push(device.clone());
        device
    }

    pub fn add_role(&self, name: &str) -> Role {
        let new = NewRole::named(name);
        let mut state = self.state.borrow_mut();
        let role = Role {
            id: state.allocate_id(),
            name: new.name,
            slug: new.slug,
            users: new.users,
        };
        state.roles.push(role.clone());
        role
    }

    /// Seed a secret, creating its device and role if they do not exist yet.
    pub fn add_secret(&self, device: &str, name: &str, role: &str, plaintext: &str) -> u64 {
        let device = self.device_named(device).unwrap_or_else(|| self.add_device(device));
        let role = self.role_named(role).unwrap_or_else(|| self.add_role(role));
        let mut state = self.state.borrow_mut();
        let id = state.allocate_id();
        state.secrets.push(Secret::new(
            id,
            name.to_string(),
            role,
            device,
            Some(plaintext.to_string()),
        ));
        id
    }

    /// Make the next call to `op` fail with the given status and body.
    pub fn reject_next(&self, op: Operation, status: u16, detail: &str) {
        self.state.borrow_mut().reject = Some((op, status, detail.to_string()));
    }

    /// Value returned by `save_secret` (defaults to `true`).
    pub fn set_save_ack(&self, ack: bool) {
        self.state.borrow_mut().save_ack = ack;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn roles(&self) -> Vec<Role> {
        self.state.borrow().roles.clone()
    }

    pub fn secrets(&self) -> Vec<Secret> {
        self.state.borrow().secrets.clone()
    }

    pub fn secret(&self, id: u64) -> Option<Secret> {
        self.state.borrow().secrets.iter().find(|s| s.id == id).cloned()
    }

    fn device_named(&self, name: &str) -> Option<DeviceRef> {
        self.state.borrow().devices.iter().find(|d| d.name == name).cloned()
    }

    fn role_named(&self, name: &str) -> Option<Role> {
        self.state.borrow().roles.iter().find(|r| r.name == name).cloned()
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryClient for InMemoryDirectory {
    fn get_role(&self, name: &str) -> Result<Option<Role>, RemoteError> {
        self.record(Call::GetRole(name.to_string()));
        Ok(self.role_named(name))
    }

    fn create_role(&self, role: &NewRole) -> Result<Role, RemoteError> {
        self.record(Call::CreateRole(role.name.clone()));
        let mut state = self.state.borrow_mut();
        state.take_rejection(Operation::CreateRole)?;
        if state.roles.iter().any(|r| r.name == role.name || r.slug == role.slug) {
            return Err(RemoteError::Rejected {
                status: 400,
                detail: format!(
                    r#"{{"name":["secret role with name '{}' already exists."]}}"#,
                    role.name
                ),
            });
        }
        let created = Role {
            id: state.allocate_id(),
            name: role.name.clone(),
            slug: role.slug.clone(),
            users: role.users.clone(),
        };
        state.roles.push(created.clone());
        Ok(created)
    }

    fn filter_secrets(&self, filter: &SecretFilter<'_>) -> Result<Vec<Secret>, RemoteError> {
        self.record(Call::FilterSecrets {
            device: filter.device.map(str::to_string),
            name: filter.name.map(str::to_string),
        });
        let state = self.state.borrow();
        Ok(state
            .secrets
            .iter()
            .filter(|s| filter.device.map_or(true, |d| s.device.name == d))
            .filter(|s| filter.name.map_or(true, |n| s.name == n))
            .cloned()
            .collect())
    }

    fn get_device(&self, name: &str) -> Result<Option<DeviceRef>, RemoteError> {
        self.record(Call::GetDevice(name.to_string()));
        Ok(self.device_named(name))
    }

    fn create_secret(&self, secret: &NewSecret<'_>) -> Result<Secret, RemoteError> {
        self.record(Call::CreateSecret(secret.name.to_string()));
        let mut state = self.state.borrow_mut();
        state.take_rejection(Operation::CreateSecret)?;
        let role = state.roles.iter().find(|r| r.id == secret.role_id).cloned();
        let device = state.devices.iter().find(|d| d.id == secret.device_id).cloned();
        let (Some(role), Some(device)) = (role, device) else {
            return Err(RemoteError::Rejected {
                status: 400,
                detail: r#"{"detail":"invalid role or device"}"#.into(),
            });
        };
        let id = state.allocate_id();
        let created = Secret::new(
            id,
            secret.name.to_string(),
            role,
            device,
            Some(secret.plaintext.to_string()),
        );
        state.secrets.push(created.clone());
        Ok(created)
    }

    fn save_secret(&self, secret: &Secret) -> Result<bool, RemoteError> {
        self.record(Call::SaveSecret(secret.id));
        let mut state = self.state.borrow_mut();
        state.take_rejection(Operation::SaveSecret)?;
        if !state.save_ack {
            return Ok(false);
        }
        match state.secrets.iter_mut().find(|s| s.id == secret.id) {
            Some(stored) => {
                *stored = secret.clone();
                Ok(true)
            }
            None => Err(RemoteError::Rejected {
                status: 404,
                detail: r#"{"detail":"Not found."}"#.into(),
            }),
        }
    }

    fn delete_secret(&self, secret: &Secret) -> Result<bool, RemoteError> {
        self.record(Call::DeleteSecret(secret.id));
        let mut state = self.state.borrow_mut();
        state.take_rejection(Operation::DeleteSecret)?;
        let before = state.secrets.len();
        state.secrets.retain(|s| s.id != secret.id);
        Ok(state.secrets.len() < before)
    }
}
