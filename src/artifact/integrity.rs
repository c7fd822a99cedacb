//! Artifact integrity verifiers.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use ring::digest::{Context, SHA256};
use tracing::{debug, warn};

use crate::error::{DeployError, DeployResult};

use super::traits::ArtifactVerifier;

/// Accepts every artifact. Used when no digest is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVerification;

impl ArtifactVerifier for NoVerification {
    fn verify(&self, _url: &str, path: &Path) -> DeployResult<()> {
        debug!(path = %path.display(), "No integrity check configured");
        Ok(())
    }
}

/// Compares the artifact's SHA-256 digest against a pinned value.
#[derive(Debug, Clone)]
pub struct Sha256Digest {
    expected: String,
}

impl Sha256Digest {
    /// `expected` is the hex digest; case is ignored.
    pub fn new(expected: &str) -> Self {
        Self {
            expected: expected.to_ascii_lowercase(),
        }
    }
}

/// Hex SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut context = Context::new(&SHA256);
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        context.update(&buffer[..n]);
    }

    Ok(hex::encode(context.finish().as_ref()))
}

impl ArtifactVerifier for Sha256Digest {
    fn verify(&self, url: &str, path: &Path) -> DeployResult<()> {
        let actual = sha256_file(path).map_err(|e| DeployError::ArtifactFetch {
            url: url.to_string(),
            message: format!("Failed to hash downloaded artifact: {}", e),
        })?;

        if actual != self.expected {
            warn!(
                expected = %self.expected,
                actual = %actual,
                "Artifact digest mismatch"
            );
            return Err(DeployError::ArtifactFetch {
                url: url.to_string(),
                message: format!(
                    "SHA-256 mismatch: expected {}, got {}",
                    self.expected, actual
                ),
            });
        }

        debug!(digest = %actual, "Artifact digest verified");
        Ok(())
    }
}
