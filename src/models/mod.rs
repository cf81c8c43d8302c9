//! Data structures shared by the reconciler, the NetBox adapter, and the CLI.

pub mod config;
pub mod device;
pub mod policy;
pub mod role;
pub mod secret;
