//! Binary swap management.
//!
//! Replaces the installed binary. New bytes are downloaded by the invoker
//! into a private download directory and verified there. They are then
//! installed with their final mode and owner next to the target and
//! renamed into place through the elevation prefix, so the canonical path
//! never holds a partially written binary.

use std::fs;
use std::path::{Path, PathBuf};

use nix::unistd::{Group, User};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::artifact::{ArtifactSource, ArtifactVerifier};
use crate::error::{DeployError, DeployResult};
use crate::executor::{Ownership, PrivilegedFs};
use crate::services::ServiceControl;

/// Mode of the installed binary.
pub const BINARY_MODE: u32 = 0o755;

/// User and group that own the binary and run the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    pub user: String,
    pub group: String,
}

impl ServiceIdentity {
    pub fn new(user: &str, group: &str) -> Self {
        Self {
            user: user.to_string(),
            group: group.to_string(),
        }
    }

    fn ownership(&self) -> Ownership<'_> {
        Ownership {
            user: &self.user,
            group: &self.group,
        }
    }

    /// Fail with a permission error for `path` when the user or group does
    /// not exist, since ownership could not be applied.
    fn check_exists(&self, path: &Path) -> DeployResult<()> {
        let permission_error = |message: String| DeployError::Permission {
            path: path.to_path_buf(),
            message,
        };

        User::from_name(&self.user)
            .map_err(|e| permission_error(format!("Failed to look up user '{}': {}", self.user, e)))?
            .ok_or_else(|| permission_error(format!("User '{}' does not exist", self.user)))?;

        Group::from_name(&self.group)
            .map_err(|e| {
                permission_error(format!("Failed to look up group '{}': {}", self.group, e))
            })?
            .ok_or_else(|| permission_error(format!("Group '{}' does not exist", self.group)))?;

        Ok(())
    }
}

/// Path of the backup kept next to `binary_path` during an upgrade.
pub fn backup_path_for(binary_path: &Path) -> PathBuf {
    let mut name = binary_path.file_name().unwrap_or_default().to_os_string();
    name.push(".backup");
    binary_path.with_file_name(name)
}

/// Unique hidden staging path in the same directory as `target`, so the
/// final rename never crosses filesystems.
fn staging_path(target: &Path, suffix: &str) -> PathBuf {
    let name = format!(
        ".{}.{}.{}",
        target.file_name().unwrap_or_default().to_string_lossy(),
        Uuid::new_v4().simple(),
        suffix
    );
    target.with_file_name(name)
}

/// Install `src` next to `dest` with the binary mode and owner, then
/// rename it over `dest`. The staged copy is removed on failure.
fn install_and_commit(
    files: &PrivilegedFs,
    src: &Path,
    dest: &Path,
    identity: &ServiceIdentity,
    suffix: &str,
) -> DeployResult<()> {
    let staged = staging_path(dest, suffix);
    let permission_error = |path: &Path, e: DeployError| DeployError::Permission {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let result = files
        .install(src, &staged, BINARY_MODE, Some(identity.ownership()))
        .map_err(|e| permission_error(&staged, e))
        .and_then(|_| {
            debug!(
                path = %staged.display(),
                user = %identity.user,
                group = %identity.group,
                "Ownership applied"
            );
            files.rename(&staged, dest).map_err(|e| permission_error(dest, e))
        });

    if result.is_err() {
        if let Err(e) = files.remove_file(&staged) {
            warn!(path = %staged.display(), error = %e, "Failed to remove staged file");
        }
    }
    result
}

/// Copy the backup over the installed binary.
///
/// The copy goes through a staged file and a rename, which also works
/// while a crash-looping process still has the old inode open.
pub fn restore_backup(
    files: &PrivilegedFs,
    backup: &Path,
    dest: &Path,
    identity: &ServiceIdentity,
) -> DeployResult<()> {
    if !backup.exists() {
        return Err(DeployError::Backup {
            path: backup.to_path_buf(),
            message: "Backup does not exist".to_string(),
        });
    }
    identity.check_exists(dest)?;
    install_and_commit(files, backup, dest, identity, "restore")
}

/// Performs the backup-download-replace sequence for an upgrade and the
/// create-download sequence for a fresh install.
pub struct BinarySwapManager<'a> {
    control: &'a dyn ServiceControl,
    source: &'a dyn ArtifactSource,
    verifier: &'a dyn ArtifactVerifier,
    files: &'a PrivilegedFs,
    service: &'a str,
    identity: &'a ServiceIdentity,
    download_dir: PathBuf,
}

impl<'a> BinarySwapManager<'a> {
    pub fn new(
        control: &'a dyn ServiceControl,
        source: &'a dyn ArtifactSource,
        verifier: &'a dyn ArtifactVerifier,
        files: &'a PrivilegedFs,
        service: &'a str,
        identity: &'a ServiceIdentity,
    ) -> Self {
        Self {
            control,
            source,
            verifier,
            files,
            service,
            identity,
            download_dir: std::env::temp_dir(),
        }
    }

    /// Directory the invoker downloads into before anything is installed.
    pub fn download_dir(mut self, dir: &Path) -> Self {
        self.download_dir = dir.to_path_buf();
        self
    }

    /// Install the binary on a host that has none.
    pub fn install_fresh(&self, url: &str, dest: &Path) -> DeployResult<()> {
        self.identity.check_exists(dest)?;

        if let Some(parent) = dest.parent() {
            self.files
                .create_dir_all(parent)
                .map_err(|e| DeployError::Permission {
                    path: parent.to_path_buf(),
                    message: format!("Failed to create install directory: {}", e),
                })?;
        }

        self.fetch_and_install(url, dest)?;

        info!(path = %dest.display(), "Binary installed");
        Ok(())
    }

    /// Replace an existing binary, keeping a backup of the current one.
    ///
    /// Returns the backup path. Nothing is fetched unless the backup was
    /// taken; on any later failure the backup stays in place.
    pub fn upgrade(&self, url: &str, dest: &Path) -> DeployResult<PathBuf> {
        self.identity.check_exists(dest)?;
        self.stop_best_effort();

        let backup = backup_path_for(dest);
        self.files
            .copy(dest, &backup)
            .map_err(|e| DeployError::Backup {
                path: dest.to_path_buf(),
                message: format!("Failed to copy to {}: {}", backup.display(), e),
            })?;
        info!(backup = %backup.display(), "Current binary backed up");

        self.fetch_and_install(url, dest)?;

        info!(path = %dest.display(), "Binary replaced");
        Ok(backup)
    }

    /// Stop the service if it is running. Failures are logged, not returned:
    /// the following start attempt surfaces any real problem.
    fn stop_best_effort(&self) {
        let active = match self.control.is_active(self.service) {
            Ok(active) => active,
            Err(e) => {
                warn!(service = %self.service, error = %e, "Could not query service state, stopping anyway");
                true
            }
        };

        if !active {
            debug!(service = %self.service, "Service not running, nothing to stop");
            return;
        }

        match self.control.stop(self.service) {
            Ok(()) => info!(service = %self.service, "Service stopped for upgrade"),
            Err(e) => warn!(
                service = %self.service,
                error = %e,
                "Failed to stop service, continuing with upgrade"
            ),
        }
    }

    fn fetch_and_install(&self, url: &str, dest: &Path) -> DeployResult<()> {
        let download = self.download_dir.join(format!(
            "lumo-deploy.{}.{}.download",
            dest.file_name().unwrap_or_default().to_string_lossy(),
            Uuid::new_v4().simple()
        ));

        let result = self
            .download(url, &download)
            .and_then(|_| install_and_commit(self.files, &download, dest, self.identity, "tmp"));

        if let Err(e) = fs::remove_file(&download) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %download.display(), error = %e, "Failed to remove download");
            }
        }
        result
    }

    fn download(&self, url: &str, download: &Path) -> DeployResult<()> {
        info!(url = %url, "Downloading artifact");
        let bytes = self.source.fetch(url, download)?;
        if bytes == 0 {
            return Err(DeployError::ArtifactFetch {
                url: url.to_string(),
                message: "Downloaded artifact is empty".to_string(),
            });
        }

        self.verifier.verify(url, download)
    }
}
