//! Reconcile NetBox device secrets to a desired state.
//!
//! Three intents: `present` creates or overwrites a secret (creating its role
//! on demand), `absent` deletes one, and `show` lists matches.
//!
//! ## Modules
//! - `cli`: Command-line handlers and output rendering
//! - `core`: Intent resolution, role/secret lookup, convergence, audit trail
//! - `remote`: `DirectoryClient` trait, NetBox HTTP adapter, in-memory directory
//! - `models`: Data structures
//! - `util`: journald forwarding

pub mod cli;
pub mod constants;
pub mod core;
pub mod error;
pub mod models;
pub mod remote;
pub mod util;
