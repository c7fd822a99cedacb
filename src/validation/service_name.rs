//! Service name validation.
//!
//! Validates systemd unit names before they are passed to systemctl or
//! written into a unit file.

use crate::error::{DeployError, ValidationErrorKind};

/// Maximum length of a unit name accepted by systemd.
const MAX_UNIT_NAME_LENGTH: usize = 255;

/// Validate a systemd unit name.
///
/// Rules:
/// - Must not be empty or exceed 255 characters
/// - Must not start with `-` (would be parsed as a systemctl option)
/// - May only contain ASCII letters, digits, and `:` `-` `_` `.` `@`
///
/// # Example
///
/// ```
/// use lumo_deploy::validation::validate_service_name;
///
/// assert!(validate_service_name("lumo-agent").is_ok());
/// assert!(validate_service_name("docker.service").is_ok());
/// assert!(validate_service_name("lumo; rm -rf /").is_err());
/// ```
pub fn validate_service_name(name: &str) -> Result<(), DeployError> {
    if name.is_empty() {
        return Err(DeployError::Validation {
            kind: ValidationErrorKind::InvalidParameter {
                param: "service".to_string(),
                message: "Service name cannot be empty".to_string(),
            },
        });
    }

    let invalid = || DeployError::Validation {
        kind: ValidationErrorKind::InvalidServiceName {
            service: name.to_string(),
        },
    };

    if name.len() > MAX_UNIT_NAME_LENGTH || name.starts_with('-') {
        return Err(invalid());
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, ':' | '-' | '_' | '.' | '@');
    if !name.chars().all(allowed) {
        return Err(invalid());
    }

    Ok(())
}
