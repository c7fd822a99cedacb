//! Artifact source and verification traits.

use std::path::Path;

use crate::error::DeployResult;

/// Fetches a binary payload into a target path.
pub trait ArtifactSource {
    /// Fetch `url` into `dest`, creating or truncating it.
    ///
    /// Returns the number of bytes written. Unreachable sources, non-success
    /// responses and short reads are `ArtifactFetch` errors.
    fn fetch(&self, url: &str, dest: &Path) -> DeployResult<u64>;

    /// Check that the source can be used for `url`.
    ///
    /// Called before any host mutation; failure is a precondition error.
    fn ensure_available(&self, url: &str) -> DeployResult<()>;
}

/// Integrity check run on a fetched artifact before it replaces the
/// installed binary. Failure must be reported as `ArtifactFetch`.
pub trait ArtifactVerifier {
    fn verify(&self, url: &str, path: &Path) -> DeployResult<()>;
}
