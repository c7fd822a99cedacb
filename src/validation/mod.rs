//! Input validation module.
//!
//! Provides validators for unit names, service identities, paths,
//! environment assignments, unit directive values and artifact sources.

mod artifact;
mod environment;
mod identity;
mod path;
mod service_name;
mod unit_value;

pub use artifact::{validate_artifact_url, validate_sha256};
pub use environment::validate_environment;
pub use identity::validate_identity_name;
pub use path::{validate_absolute_path, validate_file_name};
pub use service_name::validate_service_name;
pub use unit_value::{validate_unit_path, validate_unit_value};
