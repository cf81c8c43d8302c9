//! Centralized constants for paths, permissions, limits, and NetBox endpoints.

/// Name used for the state directory and the journald tag.
pub const APP_NAME: &str = "netbox-secret";

/// Config file name inside the state directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Append-only audit log file name inside the state directory.
pub const AUDIT_LOG_FILE: &str = "audit.log";

/// Lock file guarding appends to the audit log.
pub const AUDIT_LOCK_FILE: &str = "audit.lock";

/// Permission mode for the state directory.
pub const STATE_DIR_MODE: u32 = 0o700;

/// Permission mode for the audit log.
pub const AUDIT_LOG_MODE: u32 = 0o640;

/// Maximum secret payload size in bytes (64 KiB).
pub const MAX_SECRET_SIZE: usize = 65_536;

/// Default HTTP request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Header carrying the session key that unlocks secret plaintext.
pub const SESSION_KEY_HEADER: &str = "X-Session-Key";

pub const SESSION_KEY_PATH: &str = "secrets/get-session-key/";
pub const SECRET_ROLES_PATH: &str = "secrets/secret-roles/";
pub const SECRETS_PATH: &str = "secrets/secrets/";
pub const DEVICES_PATH: &str = "dcim/devices/";
pub const STATUS_PATH: &str = "status/";
