//! Lumo Deploy Library
//!
//! Installs or upgrades a single binary-backed systemd service on the local
//! host, verifies that it comes up, and restores the previous binary when an
//! upgrade does not.

pub mod artifact;
pub mod config;
pub mod deploy;
pub mod error;
pub mod executor;
pub mod services;
pub mod templates;
pub mod validation;
