//! Error types for the Lumo deployer.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
