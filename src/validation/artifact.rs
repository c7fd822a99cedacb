//! Artifact source validation.

use reqwest::Url;

use crate::error::{DeployError, ValidationErrorKind};

/// Validate that the artifact URL parses and uses HTTP or HTTPS.
pub fn validate_artifact_url(url: &str) -> Result<Url, DeployError> {
    let parsed = Url::parse(url).map_err(|e| DeployError::Validation {
        kind: ValidationErrorKind::InvalidParameter {
            param: "artifact.url".to_string(),
            message: format!("Invalid URL '{}': {}", url, e),
        },
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(DeployError::Validation {
            kind: ValidationErrorKind::InvalidParameter {
                param: "artifact.url".to_string(),
                message: format!("Unsupported scheme '{}'; expected http or https", scheme),
            },
        }),
    }
}

/// Validate a hex-encoded SHA-256 digest.
pub fn validate_sha256(digest: &str) -> Result<(), DeployError> {
    if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DeployError::Validation {
            kind: ValidationErrorKind::InvalidParameter {
                param: "artifact.sha256".to_string(),
                message: "Expected 64 hexadecimal characters".to_string(),
            },
        });
    }
    Ok(())
}
