//! System integration helpers.

pub mod journald;
