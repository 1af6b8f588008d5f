//! Utility functions module
//!
//! Subprocess execution helpers and binary-path resolution used by
//! binary-backed engine drivers.

pub mod proc;

pub use proc::{exec_timed, resolve_binary};
