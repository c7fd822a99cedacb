//! Unit directive value validation.
//!
//! Settings such as the description, working directory and binary path are
//! rendered verbatim into the unit file. A newline would start a new
//! directive, `%` is expanded by systemd as a specifier, and quotes or
//! backslashes change how the line is parsed.

use std::path::Path;

use crate::error::{DeployError, ValidationErrorKind};

fn invalid(param: &str, message: String) -> DeployError {
    DeployError::Validation {
        kind: ValidationErrorKind::InvalidParameter {
            param: param.to_string(),
            message,
        },
    }
}

/// Validate free text that ends up on a single unit line.
pub fn validate_unit_value(param: &str, value: &str) -> Result<(), DeployError> {
    if value.trim().is_empty() {
        return Err(invalid(param, "Value cannot be empty".to_string()));
    }

    if let Some(c) = value
        .chars()
        .find(|c| c.is_control() || matches!(c, '%' | '"' | '\'' | '\\'))
    {
        return Err(invalid(
            param,
            format!("Value contains unsupported character {:?}", c),
        ));
    }

    Ok(())
}

/// Validate a path that ends up on a single unit line. Whitespace is
/// rejected as well, since `ExecStart=` splits its value on spaces.
pub fn validate_unit_path(param: &str, path: &Path) -> Result<(), DeployError> {
    let value = path.to_str().ok_or_else(|| {
        invalid(param, format!("Path '{}' is not valid UTF-8", path.display()))
    })?;

    if value.chars().any(char::is_whitespace) {
        return Err(invalid(
            param,
            format!("Path '{}' cannot contain whitespace", value),
        ));
    }

    validate_unit_value(param, value)
}
