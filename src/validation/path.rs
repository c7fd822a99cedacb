//! Path validation for install and unit locations.

use std::path::{Component, Path};

use crate::error::{DeployError, ValidationErrorKind};

/// Validate that a configured directory is absolute and free of `..`.
pub fn validate_absolute_path(path: impl AsRef<Path>) -> Result<(), DeployError> {
    let path = path.as_ref();

    if !path.is_absolute() {
        return Err(DeployError::Validation {
            kind: ValidationErrorKind::RelativePath {
                path: path.to_path_buf(),
            },
        });
    }

    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(DeployError::Validation {
            kind: ValidationErrorKind::PathTraversal {
                path: path.to_path_buf(),
            },
        });
    }

    Ok(())
}

/// Validate that a value is a single plain file name (no separators, not `.`/`..`).
pub fn validate_file_name(param: &str, name: &str) -> Result<(), DeployError> {
    let invalid = |message: &str| DeployError::Validation {
        kind: ValidationErrorKind::InvalidParameter {
            param: param.to_string(),
            message: message.to_string(),
        },
    };

    if name.is_empty() {
        return Err(invalid("File name cannot be empty"));
    }
    if name == "." || name == ".." {
        return Err(invalid("File name cannot be '.' or '..'"));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(invalid("File name cannot contain path separators"));
    }
    if name.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(invalid("File name cannot contain whitespace or control characters"));
    }

    Ok(())
}
