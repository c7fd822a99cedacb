//! Configuration module for the Lumo deployer.
//!
//! Handles loading and validating deployment configuration from TOML files.

mod settings;

pub use settings::*;
