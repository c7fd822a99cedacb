//! Unit environment validation.
//!
//! Environment assignments are rendered verbatim into `Environment=` lines,
//! so keys must be plain identifiers and values must stay on one line.

use std::collections::BTreeMap;

use crate::error::{DeployError, ValidationErrorKind};

fn is_env_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate environment assignments and placeholder variable names.
pub fn validate_environment(
    environment: &BTreeMap<String, String>,
    placeholders: &[String],
) -> Result<(), DeployError> {
    for (key, value) in environment {
        if !is_env_key(key) {
            return Err(DeployError::Validation {
                kind: ValidationErrorKind::InvalidParameter {
                    param: "service.environment".to_string(),
                    message: format!("Invalid variable name '{}'", key),
                },
            });
        }
        if value.chars().any(|c| c == '\n' || c == '\r' || c == '"' || c == '\\') {
            return Err(DeployError::Validation {
                kind: ValidationErrorKind::InvalidParameter {
                    param: "service.environment".to_string(),
                    message: format!(
                        "Value of '{}' cannot contain newlines, quotes or backslashes",
                        key
                    ),
                },
            });
        }
    }

    for key in placeholders {
        if !is_env_key(key) {
            return Err(DeployError::Validation {
                kind: ValidationErrorKind::InvalidParameter {
                    param: "service.placeholder_environment".to_string(),
                    message: format!("Invalid variable name '{}'", key),
                },
            });
        }
        if environment.contains_key(key) {
            return Err(DeployError::Validation {
                kind: ValidationErrorKind::InvalidParameter {
                    param: "service.placeholder_environment".to_string(),
                    message: format!("'{}' is both assigned and listed as a placeholder", key),
                },
            });
        }
    }

    Ok(())
}
