//! Deployment state detection.

use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;

use crate::error::DeployResult;

use super::DeploymentKind;

/// Classify the run from the state of the canonical binary path.
///
/// Anything present at the path (including a dangling symlink) makes this
/// an upgrade. Classification happens once per run; downstream steps take
/// the result as input instead of looking again.
pub fn detect(binary_path: &Path) -> DeployResult<DeploymentKind> {
    let kind = match std::fs::symlink_metadata(binary_path) {
        Ok(_) => DeploymentKind::Upgrade,
        Err(e) if e.kind() == ErrorKind::NotFound => DeploymentKind::FreshInstall,
        Err(e) => return Err(e.into()),
    };

    debug!(path = %binary_path.display(), kind = %kind, "Classified deployment");
    Ok(kind)
}
