//! NetBox REST adapter.
//!
//! Authenticates with an API token and, when a private key is configured,
//! exchanges it for a session key so secret plaintext can be read and written.

use crate::constants;
use crate::error::ReconcileError;
use crate::models::device::DeviceRef;
use crate::models::role::{NewRole, Role};
use crate::models::secret::{NewSecret, Secret, SecretFilter};
use crate::remote::{DirectoryClient, RemoteError};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use zeroize::Zeroizing;

/// Everything needed to build a `NetboxClient`.
pub struct ConnectOptions {
    pub url: String,
    pub token: Zeroizing<String>,
    pub private_key: Option<PathBuf>,
    pub timeout: Duration,
    pub verify_tls: bool,
}

pub struct NetboxClient {
    http: Client,
    base: String,
    token: Zeroizing<String>,
    session_key: Option<Zeroizing<String>>,
}

impl NetboxClient {
    /// Build the HTTP client and, if a private key is given, obtain a session key.
    pub fn connect(opts: &ConnectOptions) -> Result<Self, ReconcileError> {
        let connection_error = |cause: String| ReconcileError::Connection {
            url: opts.url.clone(),
            cause,
        };

        let http = Client::builder()
            .timeout(opts.timeout)
            .danger_accept_invalid_certs(!opts.verify_tls)
            .build()
            .map_err(|e| connection_error(e.to_string()))?;

        let mut client = Self {
            http,
            base: api_base(&opts.url),
            token: opts.token.clone(),
            session_key: None,
        };

        if let Some(path) = &opts.private_key {
            let pem = fs::read_to_string(path)
                .map(Zeroizing::new)
                .map_err(|e| connection_error(format!("read private key {}: {}", path.display(), e)))?;
            let key = client
                .fetch_session_key(&pem)
                .map_err(|e| connection_error(e.to_string()))?;
            client.session_key = Some(key);
        }

        tracing::debug!(
            base = %client.base,
            session_key = client.session_key.is_some(),
            "connected to NetBox"
        );
        Ok(client)
    }

    pub fn has_session_key(&self) -> bool {
        self.session_key.is_some()
    }

    /// NetBox version reported by `/api/status/`.
    pub fn status(&self) -> Result<String, RemoteError> {
        let url = self.endpoint(constants::STATUS_PATH);
        let status: StatusWire = self.fetch(self.request(Method::GET, &url), &url)?;
        Ok(status.netbox_version.unwrap_or_else(|| "unknown".to_string()))
    }

    fn fetch_session_key(&self, pem: &str) -> Result<Zeroizing<String>, RemoteError> {
        let url = self.endpoint(constants::SESSION_KEY_PATH);
        let req = self
            .request(Method::POST, &url)
            .form(&[("private_key", pem)]);
        let wire: SessionKeyWire = self.fetch(req, &url)?;
        Ok(Zeroizing::new(wire.session_key))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut req = self
            .http
            .request(method, url)
            .header(AUTHORIZATION, format!("Token {}", self.token.as_str()))
            .header(ACCEPT, "application/json");
        if let Some(key) = &self.session_key {
            req = req.header(constants::SESSION_KEY_HEADER, key.as_str());
        }
        req
    }

    fn send(&self, req: RequestBuilder, url: &str) -> Result<Response, RemoteError> {
        let resp = req.send().map_err(|source| RemoteError::Transport {
            endpoint: url.to_string(),
            source,
        })?;
        let status = resp.status();
        tracing::debug!(endpoint = url, status = status.as_u16(), "NetBox response");
        if status.is_success() {
            return Ok(resp);
        }
        let detail = resp.text().unwrap_or_default();
        Err(RemoteError::Rejected {
            status: status.as_u16(),
            detail,
        })
    }

    fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder, url: &str) -> Result<T, RemoteError> {
        self.send(req, url)?
            .json::<T>()
            .map_err(|source| RemoteError::Decode {
                endpoint: url.to_string(),
                source,
            })
    }

    /// GET a list endpoint, following `next` links until exhausted.
    fn list<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<T>, RemoteError> {
        let url = self.endpoint(path);
        let mut page: Page<T> = self.fetch(self.request(Method::GET, &url).query(query), &url)?;
        let mut items = std::mem::take(&mut page.results);
        while let Some(next) = page.next.take() {
            page = self.fetch(self.request(Method::GET, &next), &next)?;
            items.append(&mut page.results);
        }
        Ok(items)
    }
}

impl DirectoryClient for NetboxClient {
    fn get_role(&self, name: &str) -> Result<Option<Role>, RemoteError> {
        let roles: Vec<RoleWire> = self.list(constants::SECRET_ROLES_PATH, &[("name", name)])?;
        Ok(roles
            .into_iter()
            .map(Role::from)
            .find(|r| r.name == name))
    }

    fn create_role(&self, role: &NewRole) -> Result<Role, RemoteError> {
        let url = self.endpoint(constants::SECRET_ROLES_PATH);
        let body = NewRoleWire {
            name: &role.name,
            slug: &role.slug,
            users: &role.users,
        };
        let created: RoleWire = self.fetch(self.request(Method::POST, &url).json(&body), &url)?;
        tracing::info!(role = %role.name, slug = %role.slug, "created secret role");
        Ok(created.into())
    }

    fn filter_secrets(&self, filter: &SecretFilter<'_>) -> Result<Vec<Secret>, RemoteError> {
        let secrets: Vec<SecretWire> = self.list(constants::SECRETS_PATH, &filter.query_pairs())?;
        Ok(secrets.into_iter().map(Secret::from).collect())
    }

    fn get_device(&self, name: &str) -> Result<Option<DeviceRef>, RemoteError> {
        let devices: Vec<DeviceWire> = self.list(constants::DEVICES_PATH, &[("name", name)])?;
        Ok(devices
            .into_iter()
            .map(DeviceRef::from)
            .find(|d| d.name == name))
    }

    fn create_secret(&self, secret: &NewSecret<'_>) -> Result<Secret, RemoteError> {
        let url = self.endpoint(constants::SECRETS_PATH);
        let body = NewSecretWire {
            name: secret.name,
            role: secret.role_id,
            device: secret.device_id,
            plaintext: secret.plaintext,
        };
        let created: SecretWire = self.fetch(self.request(Method::POST, &url).json(&body), &url)?;
        tracing::info!(secret = secret.name, id = created.id, "created secret");
        Ok(created.into())
    }

    fn save_secret(&self, secret: &Secret) -> Result<bool, RemoteError> {
        let url = self.endpoint(&format!("{}{}/", constants::SECRETS_PATH, secret.id));
        let body = PatchSecretWire {
            plaintext: secret.plaintext().unwrap_or_default(),
        };
        let resp = self.send(self.request(Method::PATCH, &url).json(&body), &url)?;
        tracing::info!(secret = %secret.name, id = secret.id, "updated secret payload");
        Ok(resp.status().is_success())
    }

    fn delete_secret(&self, secret: &Secret) -> Result<bool, RemoteError> {
        let url = self.endpoint(&format!("{}{}/", constants::SECRETS_PATH, secret.id));
        let resp = self.send(self.request(Method::DELETE, &url), &url)?;
        tracing::info!(secret = %secret.name, id = secret.id, "deleted secret");
        Ok(resp.status().is_success())
    }
}

/// `https://host/` and `https://host/api` both map to `https://host/api`.
fn api_base(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    if trimmed.ends_with("/api") {
        trimmed.to_string()
    } else {
        format!("{}/api", trimmed)
    }
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default)]
    next: Option<String>,
    results: Vec<T>,
}

#[derive(Deserialize)]
struct SessionKeyWire {
    session_key: String,
}

#[derive(Deserialize)]
struct StatusWire {
    #[serde(rename = "netbox-version", default)]
    netbox_version: Option<String>,
}

/// Role users come back as ids or as nested user objects depending on version.
#[derive(Deserialize)]
#[serde(untagged)]
enum UserWire {
    Id(u64),
    Nested { id: u64 },
}

#[derive(Deserialize)]
struct RoleWire {
    id: u64,
    name: String,
    slug: String,
    #[serde(default)]
    users: Vec<UserWire>,
}

impl From<RoleWire> for Role {
    fn from(wire: RoleWire) -> Self {
        Role {
            id: wire.id,
            name: wire.name,
            slug: wire.slug,
            users: wire
                .users
                .into_iter()
                .map(|u| match u {
                    UserWire::Id(id) | UserWire::Nested { id } => id,
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct DeviceWire {
    id: u64,
    #[serde(default)]
    name: Option<String>,
}

impl From<DeviceWire> for DeviceRef {
    fn from(wire: DeviceWire) -> Self {
        DeviceRef {
            id: wire.id,
            name: wire.name.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct SecretWire {
    id: u64,
    #[serde(default)]
    name: String,
    role: RoleWire,
    device: DeviceWire,
    #[serde(default)]
    plaintext: Option<String>,
}

impl From<SecretWire> for Secret {
    fn from(wire: SecretWire) -> Self {
        Secret::new(
            wire.id,
            wire.name,
            wire.role.into(),
            wire.device.into(),
            wire.plaintext,
        )
    }
}

#[derive(Serialize)]
struct NewRoleWire<'a> {
    name: &'a str,
    slug: &'a str,
    users: &'a [u64],
}

#[derive(Serialize)]
struct NewSecretWire<'a> {
    name: &'a str,
    role: u64,
    device: u64,
    plaintext: &'a str,
}

#[derive(Serialize)]
struct PatchSecretWire<'a> {
    plaintext: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_normalization() {
        assert_eq!(api_base("http://netbox.example.com"), "http://netbox.example.com/api");
        assert_eq!(api_base("http://netbox.example.com/"), "http://netbox.example.com/api");
        assert_eq!(api_base("http://netbox.example.com/api/"), "http://netbox.example.com/api");
    }

    #[test]
    fn test_decode_secret_page() {
        let body = r#"{
            "count": 1,
            "next": null,
            "previous": null,
            "results": [{
                "id": 12,
                "url": "http://netbox/api/secrets/secrets/12/",
                "device": {"id": 4, "url": "http://netbox/api/dcim/devices/4/", "name": "router1", "display_name": "router1"},
                "role": {"id": 2, "url": "http://netbox/api/secrets/secret-roles/2/", "name": "ops", "slug": "ops"},
                "name": "admin-pw",
                "plaintext": "s3cr3t",
                "hash": "pbkdf2_sha256$1000$abc",
                "tags": []
            }]
        }"#;
        let page: Page<SecretWire> = serde_json::from_str(body).unwrap();
        assert!(page.next.is_none());
        let secret: Secret = page.results.into_iter().next().unwrap().into();
        assert_eq!(secret.id, 12);
        assert_eq!(secret.device.name, "router1");
        assert_eq!(secret.role.name, "ops");
        assert_eq!(secret.plaintext(), Some("s3cr3t"));
    }

    #[test]
    fn test_decode_secret_without_session_key() {
        let body = r#"{"id": 1, "device": {"id": 4, "name": null}, "role": {"id": 2, "name": "ops", "slug": "ops"}, "name": "x", "plaintext": null}"#;
        let secret: Secret = serde_json::from_str::<SecretWire>(body).unwrap().into();
        assert_eq!(secret.plaintext(), None);
        assert_eq!(secret.device.name, "");
    }

    #[test]
    fn test_decode_role_users_in_both_shapes() {
        let ids: RoleWire =
            serde_json::from_str(r#"{"id": 1, "name": "ops", "slug": "ops", "users": [3, 5]}"#).unwrap();
        let nested: RoleWire = serde_json::from_str(
            r#"{"id": 1, "name": "ops", "slug": "ops", "users": [{"id": 3, "username": "a"}]}"#,
        )
        .unwrap();
        assert_eq!(Role::from(ids).users, vec![3, 5]);
        assert_eq!(Role::from(nested).users, vec![3]);
    }

    #[test]
    fn test_new_secret_body_shape() {
        let body = NewSecretWire {
            name: "admin-pw",
            role: 2,
            device: 4,
            plaintext: "s3cr3t",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "admin-pw", "role": 2, "device": 4, "plaintext": "s3cr3t"})
        );
    }

    #[test]
    fn test_new_role_body_has_empty_users() {
        let role = NewRole::named("Core Ops");
        let body = NewRoleWire {
            name: &role.name,
            slug: &role.slug,
            users: &role.users,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "Core Ops", "slug": "core-ops", "users": []})
        );
    }

    #[test]
    fn test_status_version_key() {
        let status: StatusWire =
            serde_json::from_str(r#"{"django-version": "3.1", "netbox-version": "2.10.4"}"#).unwrap();
        assert_eq!(status.netbox_version.as_deref(), Some("2.10.4"));
    }
}
