//! Service identity validation.
//!
//! Validates the user and group names the service runs as.

use crate::error::{DeployError, ValidationErrorKind};

/// Maximum length for system user and group names (Linux standard).
const MAX_IDENTITY_LENGTH: usize = 32;

/// Validate a system user or group name.
///
/// Rules:
/// - Must not be empty
/// - Must not exceed 32 characters
/// - Must start with a lowercase letter or underscore
/// - May only contain lowercase letters, digits, underscores, and hyphens
///
/// `param` names the setting in error messages (e.g. `service.user`).
pub fn validate_identity_name<'a>(param: &str, name: &'a str) -> Result<&'a str, DeployError> {
    let invalid = |message: String| DeployError::Validation {
        kind: ValidationErrorKind::InvalidParameter {
            param: param.to_string(),
            message,
        },
    };

    let first = match name.chars().next() {
        Some(c) => c,
        None => return Err(invalid("Name cannot be empty".to_string())),
    };

    if name.len() > MAX_IDENTITY_LENGTH {
        return Err(invalid(format!(
            "Name exceeds maximum length of {} characters",
            MAX_IDENTITY_LENGTH
        )));
    }

    if !first.is_ascii_lowercase() && first != '_' {
        return Err(invalid(
            "Name must start with a lowercase letter or underscore".to_string(),
        ));
    }

    for c in name.chars() {
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '_' && c != '-' {
            return Err(invalid(format!(
                "Name contains invalid character '{}'. Only lowercase letters, digits, underscores, and hyphens are allowed",
                c
            )));
        }
    }

    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(validate_identity_name("service.user", "lumo").is_ok());
        assert!(validate_identity_name("service.user", "lumo_agent").is_ok());
        assert!(validate_identity_name("service.group", "lumo-agent").is_ok());
        assert!(validate_identity_name("service.group", "_lumo").is_ok());
        assert!(validate_identity_name("service.user", "root").is_ok());
    }

    #[test]
    fn test_empty_name() {
        assert!(validate_identity_name("service.user", "").is_err());
    }

    #[test]
    fn test_too_long_name() {
        let long_name = "a".repeat(33);
        assert!(validate_identity_name("service.user", &long_name).is_err());

        let exact_name = "a".repeat(32);
        assert!(validate_identity_name("service.user", &exact_name).is_ok());
    }

    #[test]
    fn test_invalid_characters() {
        assert!(validate_identity_name("service.user", "Lumo").is_err());
        assert!(validate_identity_name("service.user", "1lumo").is_err());
        assert!(validate_identity_name("service.user", "lumo agent").is_err());
        assert!(validate_identity_name("service.user", "lumo\nGroup=root").is_err());
    }

    #[test]
    fn test_error_names_param() {
        let err = validate_identity_name("service.group", "").unwrap_err();
        assert!(err.to_string().contains("service.group"));
    }
}
