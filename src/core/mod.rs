//! Reconciliation logic and the local state it keeps (config, audit trail).

pub mod audit_log;
pub mod config;
pub mod converge;
pub mod file_lock;
pub mod intent;
pub mod locate;
pub mod outcome;
pub mod paths;
pub mod role;
